//! TCP transport for a TN3270 session
//!
//! A blocking `TcpStream` with a dedicated reader thread that forwards every
//! chunk it reads over an mpsc channel. The session drains the channel on its
//! own thread and writes through a cloned handle, so no lock is shared with
//! the reader.

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};

use crate::error::{NetworkError, NetworkResult};

const READ_BUFFER_SIZE: usize = 8192;

/// Connection to a TN3270 server
pub struct Connection {
    host: String,
    port: u16,
    stream: Option<TcpStream>,
    receiver: Option<Receiver<Vec<u8>>>,
    reader: Option<JoinHandle<()>>,
    connected: bool,
}

impl Connection {
    pub fn new(host: String, port: u16) -> Self {
        Self {
            host,
            port,
            stream: None,
            receiver: None,
            reader: None,
            connected: false,
        }
    }

    /// Resolve the host and connect, waiting at most `timeout`
    pub fn connect_with_timeout(&mut self, timeout: Duration) -> NetworkResult<()> {
        let address = format!("{}:{}", self.host, self.port);
        let addr: SocketAddr = address
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| NetworkError::DnsResolution {
                host: self.host.clone(),
            })?;

        let stream = TcpStream::connect_timeout(&addr, timeout).map_err(|e| self.connect_error(e, timeout))?;
        stream
            .set_nodelay(true)
            .map_err(|e| NetworkError::ConnectionLost { reason: e.to_string() })?;
        let reader_stream = stream
            .try_clone()
            .map_err(|e| NetworkError::ConnectionLost { reason: e.to_string() })?;

        info!("connected to {address}");
        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || read_loop(reader_stream, tx));

        self.stream = Some(stream);
        self.receiver = Some(rx);
        self.reader = Some(handle);
        self.connected = true;
        Ok(())
    }

    fn connect_error(&self, err: std::io::Error, timeout: Duration) -> NetworkError {
        match err.kind() {
            ErrorKind::ConnectionRefused => NetworkError::ConnectionRefused {
                host: self.host.clone(),
                port: self.port,
            },
            ErrorKind::TimedOut | ErrorKind::WouldBlock => NetworkError::Timeout {
                host: self.host.clone(),
                port: self.port,
                timeout_seconds: timeout.as_secs(),
            },
            _ => NetworkError::ConnectionLost { reason: err.to_string() },
        }
    }

    /// Write already-framed bytes to the host
    pub fn send_data(&mut self, data: &[u8]) -> NetworkResult<()> {
        let stream = self.stream.as_mut().ok_or(NetworkError::NotConnected)?;
        let result = stream.write_all(data).and_then(|_| stream.flush());
        if let Err(e) = result {
            self.connected = false;
            return Err(NetworkError::ConnectionLost { reason: e.to_string() });
        }
        debug!("sent {} bytes", data.len());
        Ok(())
    }

    /// Next chunk from the reader thread, if one is waiting
    ///
    /// Returns `ConnectionLost` once the host has closed the connection and
    /// every buffered chunk has been drained.
    pub fn receive_data_channel(&mut self) -> NetworkResult<Option<Vec<u8>>> {
        let receiver = self.receiver.as_ref().ok_or(NetworkError::NotConnected)?;
        match receiver.try_recv() {
            Ok(data) => Ok(Some(data)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(self.lost()),
        }
    }

    /// Wait up to `timeout` for the next chunk
    pub fn receive_timeout(&mut self, timeout: Duration) -> NetworkResult<Option<Vec<u8>>> {
        let receiver = self.receiver.as_ref().ok_or(NetworkError::NotConnected)?;
        match receiver.recv_timeout(timeout) {
            Ok(data) => Ok(Some(data)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(self.lost()),
        }
    }

    fn lost(&mut self) -> NetworkError {
        self.connected = false;
        NetworkError::ConnectionLost {
            reason: "connection closed by host".to_string(),
        }
    }

    pub fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            // Unblocks the reader thread
            let _ = stream.shutdown(Shutdown::Both);
        }
        if let Some(handle) = self.reader.take() {
            if handle.join().is_err() {
                warn!("reader thread panicked");
            }
        }
        self.receiver = None;
        if self.connected {
            info!("disconnected from {}:{}", self.host, self.port);
        }
        self.connected = false;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn get_host(&self) -> &str {
        &self.host
    }

    pub fn get_port(&self) -> u16 {
        self.port
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn read_loop(mut stream: TcpStream, sender: mpsc::Sender<Vec<u8>>) {
    let mut buffer = [0u8; READ_BUFFER_SIZE];
    loop {
        match stream.read(&mut buffer) {
            Ok(0) => {
                debug!("host closed the connection");
                break;
            }
            Ok(n) => {
                if sender.send(buffer[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("read failed: {e}");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_connection_creation() {
        let conn = Connection::new("localhost".to_string(), 23);
        assert_eq!(conn.get_host(), "localhost");
        assert_eq!(conn.get_port(), 23);
        assert!(!conn.is_connected());
    }

    #[test]
    fn test_send_without_connect() {
        let mut conn = Connection::new("localhost".to_string(), 23);
        assert!(matches!(conn.send_data(&[0x7D]), Err(NetworkError::NotConnected)));
        assert!(matches!(conn.receive_data_channel(), Err(NetworkError::NotConnected)));
    }

    #[test]
    fn test_round_trip_with_local_server() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            socket.write_all(&[0xFF, 0xFD, 0x28]).unwrap();
            let mut buf = [0u8; 3];
            socket.read_exact(&mut buf).unwrap();
            buf
        });

        let mut conn = Connection::new("127.0.0.1".to_string(), port);
        conn.connect_with_timeout(Duration::from_secs(5)).unwrap();
        let data = conn.receive_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(data, Some(vec![0xFF, 0xFD, 0x28]));
        conn.send_data(&[0xFF, 0xFB, 0x28]).unwrap();
        assert_eq!(server.join().unwrap(), [0xFF, 0xFB, 0x28]);

        // Server socket is gone; the channel reports the loss
        let mut lost = false;
        for _ in 0..50 {
            match conn.receive_timeout(Duration::from_millis(100)) {
                Err(NetworkError::ConnectionLost { .. }) => {
                    lost = true;
                    break;
                }
                _ => continue,
            }
        }
        assert!(lost);
        assert!(!conn.is_connected());
    }
}

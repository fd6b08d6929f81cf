//! Line-mode TN3270 client
//!
//! Connects to a host, prints the screen whenever the host changes it and
//! reads operator input from stdin. Plain lines are typed at the cursor and
//! sent with Enter; lines starting with `:` are commands.

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info};

use tn3270r::config::{self, EngineConfig};
use tn3270r::lib3270::codes::AidKey;
use tn3270r::lib3270::ind_file::{HostSystem, IndFileCommand};
use tn3270r::lib3270::transfer::TransferDirection;
use tn3270r::network::Connection;
use tn3270r::{Session, SessionCallback};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Default)]
struct CliArgs {
    server: Option<String>,
    port: Option<u16>,
    model: Option<u8>,
    lu_name: Option<String>,
    no_tn3270e: bool,
    dump: bool,
}

fn print_usage() {
    println!("Usage: tn3270r --server <host> [options]");
    println!();
    println!("Options:");
    println!("  -s, --server <host>   Host to connect to");
    println!("  -p, --port <port>     Port (default 23)");
    println!("  -m, --model <2-5>     3278 model (default 2)");
    println!("      --lu <name>       LU name to request under TN3270E");
    println!("      --no-tn3270e      Negotiate classic TN3270 only");
    println!("      --dump            Print the first formatted screen and exit");
    println!("  -h, --help            Show this help");
    println!();
    println!("Commands: :pfN :paN :clear :tab :quit");
    println!("          :get <host file> <local file>   IND$FILE GET (TSO)");
    println!("          :put <local file> <host file>   IND$FILE PUT (TSO)");
}

fn parse_args(args: &[String]) -> Result<Option<CliArgs>> {
    let mut parsed = CliArgs::default();
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        let mut value = |name: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| anyhow!("{name} requires a value"))
        };
        match arg.as_str() {
            "--server" | "-s" => parsed.server = Some(value("--server")?),
            "--port" | "-p" => {
                parsed.port = Some(value("--port")?.parse().context("--port requires a number")?)
            }
            "--model" | "-m" => {
                parsed.model = Some(value("--model")?.parse().context("--model requires a number")?)
            }
            "--lu" => parsed.lu_name = Some(value("--lu")?),
            "--no-tn3270e" => parsed.no_tn3270e = true,
            "--dump" => parsed.dump = true,
            "--help" | "-h" => return Ok(None),
            other => bail!("unknown argument: {other}"),
        }
    }
    Ok(Some(parsed))
}

/// Merge command line overrides into the stored configuration
fn engine_config(args: &CliArgs) -> Result<EngineConfig> {
    let shared = config::load_shared_config("default".to_string());
    let mut session_config = shared.lock().map_err(|_| anyhow!("configuration lock poisoned"))?;
    if let Some(server) = &args.server {
        session_config.set_property(config::KEY_HOST, server.as_str());
    }
    if let Some(port) = args.port {
        session_config.set_property(config::KEY_PORT, port as i64);
    }
    if let Some(model) = args.model {
        session_config.set_property(config::KEY_MODEL, model as i64);
    }
    if let Some(lu) = &args.lu_name {
        session_config.set_property(config::KEY_LU_NAME, lu.as_str());
    }
    if args.no_tn3270e {
        session_config.set_property(config::KEY_TN3270E, false);
    }
    Ok(EngineConfig::from_session_config(&session_config)?)
}

/// Prints session events and remembers whether the screen needs redrawing
struct ConsoleCallback {
    dirty: Arc<AtomicBool>,
}

impl SessionCallback for ConsoleCallback {
    fn screen_changed(&mut self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    fn status_message(&mut self, message: &str) {
        eprintln!("[status] {message}");
    }

    fn alarm(&mut self) {
        eprint!("\x07");
    }

    fn transfer_started(&mut self, direction: TransferDirection, path: &Path) {
        eprintln!("[transfer] {direction:?} {} started", path.display());
    }

    fn transfer_progress(&mut self, bytes: u64, blocks: u32) {
        debug!("transfer progress: {bytes} bytes in {blocks} blocks");
    }

    fn transfer_complete(&mut self, message: &str) {
        eprintln!("[transfer] complete: {message}");
    }

    fn transfer_error(&mut self, message: &str) {
        eprintln!("[transfer] failed: {message}");
    }
}

enum Command {
    Send(Vec<u8>),
    Quit,
    Nothing,
}

fn aid_number(text: &str, max: u8) -> Option<u8> {
    text.parse::<u8>().ok().filter(|n| (1..=max).contains(n))
}

/// Type an IND$FILE command into the current field and send it
fn start_transfer(session: &mut Session, command: IndFileCommand, local: &str) -> Result<Vec<u8>> {
    session.prepare_transfer(command.request_for(PathBuf::from(local)));
    session
        .type_string(&command.to_string())
        .map_err(|e| anyhow!("cannot type IND$FILE command: {e}"))?;
    Ok(session.send_aid(AidKey::Enter))
}

fn handle_line(session: &mut Session, line: &str) -> Result<Command> {
    let Some(command) = line.strip_prefix(':') else {
        if let Err(e) = session.type_string(line) {
            eprintln!("[input] {e}");
            return Ok(Command::Nothing);
        }
        return Ok(Command::Send(session.send_aid(AidKey::Enter)));
    };

    let words: Vec<&str> = command.split_whitespace().collect();
    let aid = match words.as_slice() {
        ["quit"] => return Ok(Command::Quit),
        ["tab"] => {
            session.tab();
            return Ok(Command::Nothing);
        }
        ["clear"] => AidKey::Clear,
        ["enter"] => AidKey::Enter,
        [pf] if pf.starts_with("pf") => AidKey::PF(aid_number(&pf[2..], 24).ok_or_else(|| anyhow!("bad key {pf}"))?),
        [pa] if pa.starts_with("pa") => AidKey::PA(aid_number(&pa[2..], 3).ok_or_else(|| anyhow!("bad key {pa}"))?),
        ["get", host, local] => {
            let cmd = IndFileCommand::new(TransferDirection::Download, *host, HostSystem::Tso);
            return start_transfer(session, cmd, local).map(Command::Send);
        }
        ["put", local, host] => {
            let cmd = IndFileCommand::new(TransferDirection::Upload, *host, HostSystem::Tso);
            return start_transfer(session, cmd, local).map(Command::Send);
        }
        _ => bail!("unknown command :{command}"),
    };
    Ok(Command::Send(session.send_aid(aid)))
}

fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn print_screen(session: &Session) {
    let (row, col) = session.display().cursor_position();
    println!("{}", session.screen_text());
    println!(
        "--- cursor {row},{col}{} ---",
        if session.display().is_keyboard_locked() { " X SYSTEM" } else { "" }
    );
}

fn run(args: CliArgs) -> Result<()> {
    let config = engine_config(&args)?;
    let host = config.require_host()?.to_string();

    let mut connection = Connection::new(host.clone(), config.port);
    connection
        .connect_with_timeout(config.connect_timeout)
        .with_context(|| format!("connecting to {host}:{}", config.port))?;
    info!("connected to {host}:{}", config.port);

    let dirty = Arc::new(AtomicBool::new(false));
    let mut session = Session::new(&config);
    session.set_callback(Box::new(ConsoleCallback { dirty: dirty.clone() }));

    let input = if args.dump { None } else { Some(spawn_stdin_reader()) };

    loop {
        if let Some(data) = connection.receive_timeout(POLL_INTERVAL)? {
            let reply = session.process_incoming(&data);
            if !reply.is_empty() {
                connection.send_data(&reply)?;
            }
        }

        if dirty.swap(false, Ordering::SeqCst) {
            if args.dump {
                if session.display().is_formatted() && !session.display().is_keyboard_locked() {
                    print_screen(&session);
                    break;
                }
            } else {
                print_screen(&session);
            }
        }

        if let Some(input) = &input {
            while let Ok(line) = input.try_recv() {
                match handle_line(&mut session, &line) {
                    Ok(Command::Send(bytes)) => connection.send_data(&bytes)?,
                    Ok(Command::Quit) => {
                        connection.disconnect();
                        return Ok(());
                    }
                    Ok(Command::Nothing) => {}
                    Err(e) => eprintln!("[input] {e}"),
                }
            }
        }
    }

    connection.disconnect();
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    match parse_args(&args)? {
        Some(cli) => run(cli),
        None => {
            print_usage();
            Ok(())
        }
    }
}

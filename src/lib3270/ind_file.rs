//! IND$FILE command construction
//!
//! The operator starts a transfer by typing an IND$FILE command at the host's
//! ready prompt. TSO and CMS spell the options differently: TSO puts each
//! value in parentheses, CMS puts one parenthesis before the whole option
//! list.

use std::fmt;
use std::path::PathBuf;

use super::transfer::{TransferDirection, TransferMode, TransferRequest};

/// Host operating environment the command is typed into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSystem {
    Tso,
    Cms,
}

/// Record format of the host data set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    Fixed,
    Variable,
    Undefined,
}

impl RecordFormat {
    fn letter(self) -> char {
        match self {
            RecordFormat::Fixed => 'F',
            RecordFormat::Variable => 'V',
            RecordFormat::Undefined => 'U',
        }
    }
}

/// An IND$FILE invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndFileCommand {
    pub direction: TransferDirection,
    /// Data set name (TSO) or "fn ft fm" (CMS)
    pub host_file: String,
    pub host_system: HostSystem,
    pub mode: TransferMode,
    pub append: bool,
    pub recfm: Option<RecordFormat>,
    pub lrecl: Option<u32>,
    /// TSO only
    pub blksize: Option<u32>,
    /// Primary and secondary allocation, TSO only
    pub space: Option<(u32, u32)>,
}

impl IndFileCommand {
    pub fn new(direction: TransferDirection, host_file: impl Into<String>, host_system: HostSystem) -> Self {
        Self {
            direction,
            host_file: host_file.into(),
            host_system,
            mode: TransferMode::Ascii { crlf: true },
            append: false,
            recfm: None,
            lrecl: None,
            blksize: None,
            space: None,
        }
    }

    pub fn mode(mut self, mode: TransferMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    pub fn recfm(mut self, recfm: RecordFormat) -> Self {
        self.recfm = Some(recfm);
        self
    }

    pub fn lrecl(mut self, lrecl: u32) -> Self {
        self.lrecl = Some(lrecl);
        self
    }

    pub fn blksize(mut self, blksize: u32) -> Self {
        self.blksize = Some(blksize);
        self
    }

    pub fn space(mut self, primary: u32, secondary: u32) -> Self {
        self.space = Some((primary, secondary));
        self
    }

    /// The local half of this transfer
    pub fn request_for(&self, local_path: impl Into<PathBuf>) -> TransferRequest {
        TransferRequest {
            local_path: local_path.into(),
            direction: self.direction,
            mode: self.mode,
            append: self.append,
        }
    }

    fn verb(&self) -> &'static str {
        match self.direction {
            TransferDirection::Download => "GET",
            TransferDirection::Upload => "PUT",
        }
    }

    /// Option keywords without host-specific punctuation
    fn keywords(&self) -> Vec<String> {
        let mut words = Vec::new();
        if let TransferMode::Ascii { crlf } = self.mode {
            words.push("ASCII".to_string());
            if crlf {
                words.push("CRLF".to_string());
            }
        }
        if self.append {
            words.push("APPEND".to_string());
        }
        words
    }
}

impl fmt::Display for IndFileCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IND$FILE {} {}", self.verb(), self.host_file)?;
        let mut options = self.keywords();
        match self.host_system {
            HostSystem::Tso => {
                if let Some(recfm) = self.recfm {
                    options.push(format!("RECFM({})", recfm.letter()));
                }
                if let Some(lrecl) = self.lrecl {
                    options.push(format!("LRECL({lrecl})"));
                }
                if let Some(blksize) = self.blksize {
                    options.push(format!("BLKSIZE({blksize})"));
                }
                if let Some((primary, secondary)) = self.space {
                    options.push(format!("SPACE({primary},{secondary})"));
                }
                for option in options {
                    write!(f, " {option}")?;
                }
            }
            HostSystem::Cms => {
                if let Some(recfm) = self.recfm {
                    options.push(format!("RECFM {}", recfm.letter()));
                }
                if let Some(lrecl) = self.lrecl {
                    options.push(format!("LRECL {lrecl}"));
                }
                if !options.is_empty() {
                    write!(f, " ({})", options.join(" "))?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tso_get_text() {
        let cmd = IndFileCommand::new(TransferDirection::Download, "'USER.DATA'", HostSystem::Tso);
        assert_eq!(cmd.to_string(), "IND$FILE GET 'USER.DATA' ASCII CRLF");
    }

    #[test]
    fn test_tso_put_with_allocation() {
        let cmd = IndFileCommand::new(TransferDirection::Upload, "REPORT.TEXT", HostSystem::Tso)
            .recfm(RecordFormat::Variable)
            .lrecl(255)
            .blksize(6160)
            .space(10, 5);
        assert_eq!(
            cmd.to_string(),
            "IND$FILE PUT REPORT.TEXT ASCII CRLF RECFM(V) LRECL(255) BLKSIZE(6160) SPACE(10,5)"
        );
    }

    #[test]
    fn test_tso_binary_append() {
        let cmd = IndFileCommand::new(TransferDirection::Upload, "LOAD.BIN", HostSystem::Tso)
            .mode(TransferMode::Binary)
            .append(true);
        assert_eq!(cmd.to_string(), "IND$FILE PUT LOAD.BIN APPEND");
    }

    #[test]
    fn test_cms_put() {
        let cmd = IndFileCommand::new(TransferDirection::Upload, "PROFILE EXEC A", HostSystem::Cms)
            .recfm(RecordFormat::Fixed)
            .lrecl(80);
        assert_eq!(cmd.to_string(), "IND$FILE PUT PROFILE EXEC A (ASCII CRLF RECFM F LRECL 80)");
    }

    #[test]
    fn test_cms_binary_has_no_options() {
        let cmd = IndFileCommand::new(TransferDirection::Download, "DATA BIN A", HostSystem::Cms)
            .mode(TransferMode::Binary)
            .blksize(800);
        assert_eq!(cmd.to_string(), "IND$FILE GET DATA BIN A");
    }

    #[test]
    fn test_request_mirrors_command() {
        let cmd = IndFileCommand::new(TransferDirection::Download, "X", HostSystem::Tso).append(true);
        let request = cmd.request_for("/tmp/x.txt");
        assert_eq!(request.direction, TransferDirection::Download);
        assert!(request.append);
        assert_eq!(request.mode, TransferMode::Ascii { crlf: true });
    }
}

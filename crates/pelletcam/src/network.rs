//! Device reachability check run before a session starts.

use std::process::{Command, Stdio};

#[derive(thiserror::Error, Debug)]
pub enum NetworkError {
    #[error("device {host} is unreachable")]
    UnreachableDevice { host: String },
    #[error("could not probe {host}: {source}")]
    Probe {
        host: String,
        #[source]
        source: std::io::Error,
    },
}

pub trait Reachability {
    fn probe(&self, host: &str) -> Result<(), NetworkError>;
}

/// Sends a single ICMP echo through a `ping`-compatible program.
///
/// The program is invoked as `<program> -c 1 <host>` (`-n` on Windows) and
/// its exit status decides reachability.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PingProbe {
    program: String,
}

impl Default for PingProbe {
    fn default() -> Self {
        Self::with_program("ping")
    }
}

impl PingProbe {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Reachability for PingProbe {
    fn probe(&self, host: &str) -> Result<(), NetworkError> {
        let count_flag = if cfg!(windows) { "-n" } else { "-c" };
        let status = Command::new(&self.program)
            .args([count_flag, "1", host])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|source| NetworkError::Probe {
                host: host.to_string(),
                source,
            })?;

        if status.success() {
            log::debug!("{host} answered {}", self.program);
            Ok(())
        } else {
            Err(NetworkError::UnreachableDevice {
                host: host.to_string(),
            })
        }
    }
}

use std::fs;
use std::io;
use std::net::IpAddr;
use std::process::Command;

use get_if_addrs::get_if_addrs;
use log::debug;

use crate::devices::Interface;
use crate::error::{Result, ShareError};

/// Captured result of an external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    pub(crate) fn from_output(output: std::process::Output) -> Self {
        CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            // Killed by a signal
            code: output.status.code().unwrap_or(-1),
        }
    }
}

/// Everything the tool reads from or changes on the local machine.
pub trait Host {
    /// Runs a privileged command (sysctl, iptables).
    fn run(&self, program: &str, args: &[&str]) -> io::Result<CommandOutput>;

    fn read_file(&self, path: &str) -> io::Result<String>;

    /// Interfaces in address-table order, one entry per name.
    fn interfaces(&self) -> io::Result<Vec<Interface>>;

    fn has_program(&self, name: &str) -> bool;
}

/// The real machine. Commands go through `sudo` unless we already run as root.
pub struct SystemHost {
    use_sudo: bool,
}

impl SystemHost {
    pub fn new() -> Self {
        // SAFETY: geteuid has no preconditions and cannot fail.
        let euid = unsafe { libc::geteuid() };
        SystemHost { use_sudo: euid != 0 }
    }
}

impl Default for SystemHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for SystemHost {
    fn run(&self, program: &str, args: &[&str]) -> io::Result<CommandOutput> {
        let mut cmd = if self.use_sudo {
            let mut cmd = Command::new("sudo");
            cmd.arg(program);
            cmd
        } else {
            Command::new(program)
        };
        cmd.args(args);
        debug!("running {:?}", cmd);

        let output = cmd.output().map_err(|e| {
            io::Error::new(e.kind(), format!("failed to execute {}: {}", program, e))
        })?;
        Ok(CommandOutput::from_output(output))
    }

    fn read_file(&self, path: &str) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn interfaces(&self) -> io::Result<Vec<Interface>> {
        let mut devices: Vec<Interface> = Vec::new();

        for iface in get_if_addrs()? {
            let ipv4 = match iface.ip() {
                IpAddr::V4(ip) => Some(ip),
                IpAddr::V6(_) => None,
            };
            match devices.iter_mut().find(|d| d.name == iface.name) {
                Some(existing) => {
                    if existing.ipv4.is_none() {
                        existing.ipv4 = ipv4;
                    }
                }
                None => devices.push(Interface {
                    name: iface.name.clone(),
                    ipv4,
                }),
            }
        }

        Ok(devices)
    }

    fn has_program(&self, name: &str) -> bool {
        which::which(name).is_ok()
    }
}

/// Runs a privileged command and turns a non-zero exit into an error.
pub fn run_checked(host: &dyn Host, program: &str, args: &[&str]) -> Result<CommandOutput> {
    let output = host.run(program, args)?;
    if output.success() {
        Ok(output)
    } else {
        Err(ShareError::Command {
            command: format!("{} {}", program, args.join(" ")),
            stderr: output.stderr,
        })
    }
}

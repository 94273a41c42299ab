use std::io::{self, Write};
use std::net::Ipv4Addr;
use std::process::{Command, Output, Stdio};

use log::debug;

use crate::credentials::{Auth, Credentials, Secret};
use crate::error::{Result, ShareError};
use crate::host::CommandOutput;

/// Seconds ssh waits for the TCP connection to the device.
pub const CONNECT_TIMEOUT: u32 = 5;

/// Runs shell commands on the device.
pub trait RemoteSession {
    fn run(&self, command: &str) -> Result<CommandOutput>;

    /// Like [`RemoteSession::run`], with `input` written to the command's stdin.
    fn run_with_input(&self, command: &str, input: &str) -> Result<CommandOutput>;
}

/// Remote execution through the system `ssh` client (wrapped in `sshpass -e` for passwords).
pub struct SshSession {
    destination: String,
    port: u16,
    auth: Auth,
}

impl SshSession {
    pub fn new(ip: Ipv4Addr, port: u16, credentials: &Credentials) -> Self {
        SshSession {
            destination: format!("{}@{}", credentials.user, ip),
            port,
            auth: credentials.auth.clone(),
        }
    }

    fn command(&self, remote_command: &str) -> Command {
        let mut cmd = match &self.auth {
            Auth::Password(password) => {
                let mut cmd = Command::new("sshpass");
                // -e reads SSHPASS, keeping the password out of the process list
                cmd.arg("-e").arg("ssh").env("SSHPASS", password.expose());
                cmd
            }
            Auth::Key(_) => Command::new("ssh"),
        };

        cmd.args([
            "-o",
            "StrictHostKeyChecking=no",
            "-o",
            "UserKnownHostsFile=/dev/null",
            "-o",
            "LogLevel=ERROR",
            "-o",
            &format!("ConnectTimeout={}", CONNECT_TIMEOUT),
            "-o",
            "ServerAliveInterval=5",
            "-o",
            "ServerAliveCountMax=3",
        ]);
        if let Auth::Key(identity) = &self.auth {
            cmd.arg("-o").arg("BatchMode=yes").arg("-i").arg(identity);
        }
        cmd.arg("-p").arg(self.port.to_string());
        cmd.arg(&self.destination).arg(remote_command);
        cmd
    }
}

impl RemoteSession for SshSession {
    fn run(&self, command: &str) -> Result<CommandOutput> {
        debug!("ssh {} {}", self.destination, command);
        let output = self.command(command).stdin(Stdio::null()).output()?;
        Ok(CommandOutput::from_output(output))
    }

    fn run_with_input(&self, command: &str, input: &str) -> Result<CommandOutput> {
        debug!("ssh {} {} (with stdin)", self.destination, command);
        let output = communicate(self.command(command), input)?;
        Ok(CommandOutput::from_output(output))
    }
}

/// Spawns `cmd`, feeds it `input` and always reaps it.
///
/// A child that exits without reading its stdin (ssh failing to connect)
/// surfaces as a broken pipe on the write; its exit status and stderr are
/// still collected.
fn communicate(mut cmd: Command, input: &str) -> io::Result<Output> {
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        match stdin.write_all(input.as_bytes()) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                debug!("child closed stdin before reading all input");
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
        }
    }
    child.wait_with_output()
}

/// Runs a trivial command to make sure the device answers before anything is changed.
pub fn probe(session: &dyn RemoteSession, user: &str, ip: Ipv4Addr) -> Result<()> {
    let connectivity = |reason: String| ShareError::Connectivity {
        user: user.to_string(),
        ip,
        reason,
    };

    let output = session.run("true").map_err(|e| connectivity(e.to_string()))?;
    if output.success() {
        return Ok(());
    }

    let reason = match output.code {
        // sshpass: invalid password
        5 => "authentication failed".to_string(),
        _ if output.stderr.is_empty() => format!("ssh exited with {}", output.code),
        _ => output.stderr,
    };
    Err(connectivity(reason))
}

/// Privileged commands on the device. The password only ever travels on sudo's stdin.
pub struct Sudo<'a> {
    session: &'a dyn RemoteSession,
    password: Option<&'a Secret>,
}

impl<'a> Sudo<'a> {
    pub fn new(session: &'a dyn RemoteSession, password: Option<&'a Secret>) -> Self {
        Sudo { session, password }
    }

    pub fn run(&self, command: &str) -> Result<CommandOutput> {
        match self.password {
            // -k forces sudo to read the password even with a cached timestamp
            Some(password) => self.session.run_with_input(
                &format!("sudo -k -S -p '' {}", command),
                &format!("{}\n", password.expose()),
            ),
            None => self.session.run(&format!("sudo -n {}", command)),
        }
    }

}

/// Quotes `value` for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

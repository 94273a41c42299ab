use std::io;
use std::net::Ipv4Addr;

use thiserror::Error;

/// Fatal conditions. Any of these stops the run with exit code 1.
#[derive(Debug, Error)]
pub enum ShareError {
    #[error("required tool `{tool}` is not installed (try: sudo apt install {package})")]
    ToolMissing { tool: String, package: String },

    #[error("cannot reach {user}@{ip} over SSH: {reason}")]
    Connectivity {
        user: String,
        ip: Ipv4Addr,
        reason: String,
    },

    #[error("no default route found on this host")]
    InterfaceNotFound { available: Vec<String> },

    #[error("interface {0} has no IPv4 address")]
    AddressNotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("`{command}` failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("prompt failed: {0}")]
    Prompt(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ShareError>;

/// Soft conditions that are reported but never abort the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// No host address shares the device's /24, the uplink address is used instead.
    GatewayFallback { device: Ipv4Addr, gateway: Ipv4Addr },
    /// A configuration command on the device exited non-zero.
    DeviceCommand {
        command: String,
        code: i32,
        stderr: String,
    },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::GatewayFallback { device, gateway } => write!(
                f,
                "no host address on the same /24 as {}, falling back to uplink address {} (the device may not reach it)",
                device, gateway
            ),
            Warning::DeviceCommand {
                command,
                code,
                stderr,
            } => write!(f, "`{}` failed on the device (exit {}): {}", command, code, stderr),
        }
    }
}

use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::Parser;
use dialoguer::{console::Style, theme::ColorfulTheme, Password};

use crate::error::{Result, ShareError};

pub const DEFAULT_ORIN_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 55, 1);
pub const DEFAULT_ORIN_USER: &str = "nvidia";

/// Share this host's internet connection with an Orin board over SSH.
///
/// Enables IP forwarding and NAT on the host, then points the board's
/// default route and DNS at the host. `orin-share STOP` reverts the host side.
#[derive(Parser, Debug, Clone)]
#[command(name = "orin-share", version, about)]
pub struct Args {
    /// Orin IP address, or STOP to disable sharing
    #[arg(value_name = "ORIN_IP")]
    pub orin_ip: Option<String>,

    /// User on the Orin board
    #[arg(value_name = "ORIN_USER", allow_hyphen_values = true)]
    pub orin_user: Option<String>,

    /// SSH and sudo password (prompted for when omitted)
    #[arg(value_name = "PASSWORD", allow_hyphen_values = true)]
    pub password: Option<String>,

    /// Host interface with internet access (default: the default-route interface)
    #[arg(value_name = "HOST_INTERFACE")]
    pub host_interface: Option<String>,

    /// SSH identity file; enables key-based authentication
    #[arg(short, long)]
    pub identity: Option<PathBuf>,

    /// SSH port on the Orin board
    #[arg(short, long, default_value_t = 22)]
    pub port: u16,

    /// Append log output to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupArgs {
    pub device: Ipv4Addr,
    pub user: String,
    pub password: Option<String>,
    pub interface: Option<String>,
    pub identity: Option<PathBuf>,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Stop,
    Setup(SetupArgs),
}

impl Args {
    pub fn mode(&self) -> Result<Mode> {
        let device = match self.orin_ip.as_deref() {
            Some(first) if first.eq_ignore_ascii_case("stop") => return Ok(Mode::Stop),
            Some(ip) => ip
                .parse()
                .map_err(|_| {
                    ShareError::InvalidArgument(format!(
                        "`{}` is not an IPv4 address (the host gateway is picked by matching the device's /24)",
                        ip
                    ))
                })?,
            None => DEFAULT_ORIN_IP,
        };

        Ok(Mode::Setup(SetupArgs {
            device,
            user: self
                .orin_user
                .clone()
                .unwrap_or_else(|| DEFAULT_ORIN_USER.to_string()),
            password: self.password.clone(),
            interface: self.host_interface.clone(),
            identity: self.identity.clone(),
            port: self.port,
        }))
    }
}

/// Reads a password from the terminal without echo.
pub fn prompt_password(prompt: &str) -> Result<String> {
    let theme = ColorfulTheme {
        prompt_style: Style::new().bold(),
        ..ColorfulTheme::default()
    };

    Password::with_theme(&theme)
        .with_prompt(prompt)
        .allow_empty_password(true)
        .interact()
        .map_err(|e| ShareError::Prompt(e.to_string()))
}

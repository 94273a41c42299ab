//! Temporary internet sharing from a Linux host to an Orin board over SSH.

pub mod cli;
pub mod credentials;
pub mod device_config;
pub mod devices;
pub mod diagnostics;
pub mod error;
pub mod host;
pub mod ip_forward;
pub mod logging;
pub mod nat;
pub mod preflight;
pub mod remote;
pub mod share;

pub use error::{Result, ShareError, Warning};

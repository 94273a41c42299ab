use log::info;

use crate::error::Result;
use crate::host::{run_checked, Host};

const IP_FORWARD: &str = "/proc/sys/net/ipv4/ip_forward";

/// Current kernel IPv4 forwarding state.
pub fn is_enabled(host: &dyn Host) -> Result<bool> {
    Ok(host.read_file(IP_FORWARD)?.trim() == "1")
}

/// Sets IPv4 forwarding through sysctl, skipping the write when already in place.
/// Returns whether the flag changed.
pub fn set(host: &dyn Host, enabled: bool) -> Result<bool> {
    if is_enabled(host)? == enabled {
        info!("IP forwarding already {}", if enabled { "enabled" } else { "disabled" });
        return Ok(false);
    }

    let value = format!("net.ipv4.ip_forward={}", u8::from(enabled));
    run_checked(host, "sysctl", &["-w", &value])?;
    info!("IP forwarding {}", if enabled { "enabled" } else { "disabled" });
    Ok(true)
}

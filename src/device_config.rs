use std::net::Ipv4Addr;

use log::{info, warn};

use crate::credentials::Secret;
use crate::error::{Result, Warning};
use crate::remote::{shell_quote, RemoteSession, Sudo};

pub const RESOLV_CONF: &str = "/etc/resolv.conf";

/// Written to the device in this priority order.
pub const NAMESERVERS: [Ipv4Addr; 3] = [
    Ipv4Addr::new(8, 8, 8, 8),
    Ipv4Addr::new(8, 8, 4, 4),
    Ipv4Addr::new(1, 1, 1, 1),
];

/// What the device reports after reconfiguration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceState {
    pub routes: String,
    pub resolv_conf: String,
    /// Configuration commands that exited non-zero. The run carries on.
    pub failures: Vec<Warning>,
}

pub fn resolv_conf() -> String {
    NAMESERVERS
        .iter()
        .map(|ns| format!("nameserver {}\n", ns))
        .collect()
}

/// Points the device's default route at `gateway` and replaces its resolver config.
pub fn configure(
    session: &dyn RemoteSession,
    sudo_password: Option<&Secret>,
    gateway: Ipv4Addr,
) -> Result<DeviceState> {
    let sudo = Sudo::new(session, sudo_password);
    let mut failures = Vec::new();

    let deleted = sudo.run("ip route del default")?;
    if !deleted.success() {
        // No default route yet
        warn!("could not delete default route on device: {}", deleted.stderr);
    }

    let add_route = format!("ip route add default via {}", gateway);
    let added = sudo.run(&add_route)?;
    if added.success() {
        info!("device default route set to {}", gateway);
    } else {
        failures.push(failure(add_route, added.code, &added.stderr));
    }

    let script = format!("printf %s {} > {}", shell_quote(&resolv_conf()), RESOLV_CONF);
    let written = sudo.run(&format!("sh -c {}", shell_quote(&script)))?;
    if written.success() {
        info!("device resolver config written");
    } else {
        failures.push(failure(format!("write {}", RESOLV_CONF), written.code, &written.stderr));
    }

    let routes = session.run("ip route")?.stdout;
    let resolv_conf = session.run(&format!("cat {}", RESOLV_CONF))?.stdout;
    Ok(DeviceState {
        routes,
        resolv_conf,
        failures,
    })
}

fn failure(command: String, code: i32, stderr: &str) -> Warning {
    let warning = Warning::DeviceCommand {
        command,
        code,
        stderr: stderr.trim().to_string(),
    };
    warn!("{}", warning);
    warning
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolver_order() {
        assert_eq!(
            resolv_conf(),
            "nameserver 8.8.8.8\nnameserver 8.8.4.4\nnameserver 1.1.1.1\n"
        );
    }
}

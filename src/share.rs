use std::net::Ipv4Addr;

use log::info;

use crate::credentials::Credentials;
use crate::device_config::{self, DeviceState};
use crate::devices::{self, Gateway, Uplink};
use crate::diagnostics::{self, DiagnosticReport};
use crate::error::{Result, Warning};
use crate::host::Host;
use crate::ip_forward;
use crate::nat::{self, Reconciled};
use crate::remote::{self, RemoteSession};

#[derive(Debug, Clone)]
pub struct SetupReport {
    pub uplink: Uplink,
    pub gateway: Gateway,
    pub forwarding_changed: bool,
    pub rules: Reconciled,
    pub device: DeviceState,
    pub diagnostics: DiagnosticReport,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopReport {
    pub forwarding_changed: bool,
    pub rules_removed: usize,
}

/// Shares the host's uplink with `device`.
///
/// The SSH probe runs before any host state is touched; an unreachable
/// device leaves forwarding and iptables exactly as they were. Failures of
/// the device-side commands are reported as warnings and the diagnostics
/// still run.
pub fn setup(
    host: &dyn Host,
    session: &dyn RemoteSession,
    credentials: &Credentials,
    device: Ipv4Addr,
    interface: Option<&str>,
) -> Result<SetupReport> {
    let mut warnings = Vec::new();

    println!("[*] Checking SSH connection to {}@{}...", credentials.user, device);
    remote::probe(session, &credentials.user, device)?;
    println!("[+] Device reachable");

    let uplink = devices::detect_uplink(host, interface)?;
    println!("[*] Uplink interface: {} ({})", uplink.name, uplink.address);

    let forwarding_changed = ip_forward::set(host, true)?;
    println!("[+] IP forwarding enabled");

    let rules = nat::reconcile(host, device, &uplink.name)?;
    println!(
        "[+] NAT rules in place ({} added, {} removed)",
        rules.added.len(),
        rules.removed
    );

    let interfaces = host.interfaces()?;
    let (gateway, warning) = devices::resolve_gateway(&interfaces, device, &uplink);
    if let Some(warning) = warning {
        println!("[!] {}", warning);
        warnings.push(warning);
    }

    println!("[*] Configuring device to use {} as gateway...", gateway.address);
    let state = device_config::configure(session, credentials.sudo_password.as_ref(), gateway.address)?;
    for failure in &state.failures {
        println!("[!] {}", failure);
    }
    warnings.extend(state.failures.iter().cloned());
    println!("    |- Routes:");
    for line in state.routes.lines() {
        println!("    |    {}", line);
    }
    println!("    |- {}:", device_config::RESOLV_CONF);
    for line in state.resolv_conf.lines() {
        println!("    |    {}", line);
    }

    println!("[*] Testing connectivity from the device...");
    let report = diagnostics::run(session);
    for check in &report.checks {
        println!("{}", check);
    }
    if let Some(trace) = &report.traceroute {
        for line in trace.lines() {
            println!("    {}", line);
        }
    }
    info!(
        "setup finished for {} via {} ({})",
        device,
        uplink.name,
        if report.all_passed() { "all checks passed" } else { "some checks failed" }
    );

    Ok(SetupReport {
        uplink,
        gateway,
        forwarding_changed,
        rules,
        device: state,
        diagnostics: report,
        warnings,
    })
}

/// Disables forwarding and removes the NAT rules. Missing rules are fine.
pub fn stop(host: &dyn Host) -> Result<StopReport> {
    println!("[*] Disabling IP forwarding...");
    let forwarding_changed = ip_forward::set(host, false)?;

    println!("[*] Removing NAT rules...");
    let rules_removed = nat::teardown(host);
    println!("[+] Internet sharing stopped ({} rules removed)", rules_removed);

    Ok(StopReport {
        forwarding_changed,
        rules_removed,
    })
}

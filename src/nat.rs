//! Host NAT and forwarding rules for one device.
//!
//! Rules are reconciled, not blindly inserted: the current chains are listed
//! with `iptables -S`, duplicates and stale copies owned by this tool are
//! deleted, and only missing rules are appended. Every rule carries the
//! `orin-share` comment so teardown can find exactly what setup installed.

use std::net::Ipv4Addr;

use log::{debug, info, warn};

use crate::error::Result;
use crate::host::{run_checked, Host};

pub const RULE_TAG: &str = "orin-share";

const CHAINS: [(&str, &str); 2] = [("nat", "POSTROUTING"), ("filter", "FORWARD")];

/// One iptables rule, with `spec` in the token order `iptables -S` prints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NatRule {
    pub table: &'static str,
    pub chain: &'static str,
    pub spec: Vec<String>,
}

impl NatRule {
    fn new(table: &'static str, chain: &'static str, spec: &[&str]) -> Self {
        NatRule {
            table,
            chain,
            spec: spec.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn masquerade(device: Ipv4Addr, uplink: &str) -> Self {
        let source = format!("{}/32", device);
        Self::new(
            "nat",
            "POSTROUTING",
            &["-s", &source, "-o", uplink, "-m", "comment", "--comment", RULE_TAG, "-j", "MASQUERADE"],
        )
    }

    pub fn forward_from(device: Ipv4Addr) -> Self {
        let source = format!("{}/32", device);
        Self::new(
            "filter",
            "FORWARD",
            &["-s", &source, "-m", "comment", "--comment", RULE_TAG, "-j", "ACCEPT"],
        )
    }

    pub fn forward_to(device: Ipv4Addr) -> Self {
        let destination = format!("{}/32", device);
        Self::new(
            "filter",
            "FORWARD",
            &["-d", &destination, "-m", "comment", "--comment", RULE_TAG, "-j", "ACCEPT"],
        )
    }

    /// Full iptables argument list for `action` (`-A`, `-D`, ...).
    pub fn args(&self, action: &str) -> Vec<String> {
        let mut args = vec![
            "-t".to_string(),
            self.table.to_string(),
            action.to_string(),
            self.chain.to_string(),
        ];
        args.extend(self.spec.iter().cloned());
        args
    }

    /// The same rule without the ownership comment, as older runs installed it.
    fn untagged(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.spec.len());
        let mut i = 0;
        while i < self.spec.len() {
            if self.spec[i] == "-m" && self.spec.get(i + 1).map(String::as_str) == Some("comment") {
                // "-m comment --comment <tag>"
                i += 4;
                continue;
            }
            out.push(self.spec[i].clone());
            i += 1;
        }
        out
    }
}

impl std::fmt::Display for NatRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "-t {} -A {} {}", self.table, self.chain, self.spec.join(" "))
    }
}

/// MASQUERADE out of the uplink plus forward-accept in both directions.
pub fn desired_rules(device: Ipv4Addr, uplink: &str) -> Vec<NatRule> {
    vec![
        NatRule::masquerade(device, uplink),
        NatRule::forward_from(device),
        NatRule::forward_to(device),
    ]
}

/// Parses `iptables -S <chain>` output into the rule specs appended to `chain`.
pub fn parse_rules(listing: &str, chain: &str) -> Vec<Vec<String>> {
    listing
        .lines()
        .filter_map(|line| {
            let mut tokens = line.split_whitespace();
            if tokens.next() != Some("-A") || tokens.next() != Some(chain) {
                return None;
            }
            Some(tokens.map(|t| t.trim_matches('"').to_string()).collect())
        })
        .collect()
}

fn is_tagged(spec: &[String]) -> bool {
    spec.windows(2)
        .any(|w| w[0] == "--comment" && w[1] == RULE_TAG)
}

fn mentions_device(spec: &[String], device: Ipv4Addr) -> bool {
    let address = format!("{}/32", device);
    spec.windows(2)
        .any(|w| (w[0] == "-s" || w[0] == "-d") && w[1] == address)
}

fn list_chain(host: &dyn Host, table: &str, chain: &str) -> Result<Vec<Vec<String>>> {
    let output = run_checked(host, "iptables", &["-t", table, "-S", chain])?;
    Ok(parse_rules(&output.stdout, chain))
}

fn delete_spec(host: &dyn Host, table: &str, chain: &str, spec: &[String]) -> Result<()> {
    let mut args = vec!["-t", table, "-D", chain];
    args.extend(spec.iter().map(String::as_str));
    run_checked(host, "iptables", &args)?;
    Ok(())
}

fn run_rule(host: &dyn Host, rule: &NatRule, action: &str) -> Result<()> {
    let args = rule.args(action);
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    run_checked(host, "iptables", &args)?;
    Ok(())
}

/// What a reconciliation pass changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub added: Vec<NatRule>,
    pub removed: usize,
}

/// Brings the host rules for `device` in line with [`desired_rules`].
///
/// If appending a rule fails, rules appended earlier in the same call are
/// deleted again before the error is returned.
pub fn reconcile(host: &dyn Host, device: Ipv4Addr, uplink: &str) -> Result<Reconciled> {
    let desired = desired_rules(device, uplink);
    let mut result = Reconciled::default();
    let mut present = vec![false; desired.len()];

    for (table, chain) in CHAINS {
        for spec in list_chain(host, table, chain)? {
            let exact = desired
                .iter()
                .position(|r| r.table == table && r.chain == chain && r.spec == spec);

            let keep = match exact {
                Some(i) if !present[i] => {
                    present[i] = true;
                    true
                }
                // duplicate copy
                Some(_) => false,
                None => {
                    let legacy = desired
                        .iter()
                        .any(|r| r.table == table && r.chain == chain && r.untagged() == spec);
                    let stale = is_tagged(&spec) && mentions_device(&spec, device);
                    !(legacy || stale)
                }
            };

            if !keep {
                debug!("removing -t {} -A {} {}", table, chain, spec.join(" "));
                delete_spec(host, table, chain, &spec)?;
                result.removed += 1;
            }
        }
    }

    for (rule, _) in desired.iter().zip(present).filter(|(_, present)| !present) {
        if let Err(e) = run_rule(host, rule, "-A") {
            rollback(host, &result.added);
            return Err(e);
        }
        info!("added {}", rule);
        result.added.push(rule.clone());
    }

    Ok(result)
}

fn rollback(host: &dyn Host, added: &[NatRule]) {
    for rule in added.iter().rev() {
        match run_rule(host, rule, "-D") {
            Ok(()) => warn!("rolled back {}", rule),
            Err(e) => warn!("could not roll back {}: {}", rule, e),
        }
    }
}

/// Removes every rule tagged by this tool plus the generic unscoped rules.
/// Absent rules are not an error. Returns the number of rules removed.
pub fn teardown(host: &dyn Host) -> usize {
    let mut removed = 0;

    for (table, chain) in CHAINS {
        let rules = match list_chain(host, table, chain) {
            Ok(rules) => rules,
            Err(e) => {
                warn!("cannot list {} {}: {}", table, chain, e);
                continue;
            }
        };
        for spec in rules.iter().filter(|spec| is_tagged(spec)) {
            match delete_spec(host, table, chain, spec) {
                Ok(()) => removed += 1,
                Err(e) => warn!("{}", e),
            }
        }
    }

    let unscoped: [&[&str]; 2] = [
        &["-t", "nat", "-D", "POSTROUTING", "-j", "MASQUERADE"],
        &["-t", "filter", "-D", "FORWARD", "-j", "ACCEPT"],
    ];
    for args in unscoped {
        match host.run("iptables", args) {
            Ok(output) if output.success() => removed += 1,
            Ok(_) => debug!("no rule matching iptables {}", args.join(" ")),
            Err(e) => warn!("iptables {}: {}", args.join(" "), e),
        }
    }

    removed
}

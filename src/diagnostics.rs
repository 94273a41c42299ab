use std::fmt;

use regex::Regex;

use crate::remote::RemoteSession;

const PING_IP: &str = "8.8.8.8";
const PING_HOST: &str = "google.com";
const HTTP_URL: &str = "http://www.google.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Check {
    pub name: &'static str,
    pub outcome: Outcome,
    pub detail: String,
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self.outcome {
            Outcome::Pass => "+",
            Outcome::Fail => "!",
            Outcome::Skipped => "-",
        };
        write!(f, "[{}] {:<28} {}", symbol, self.name, self.detail)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiagnosticReport {
    pub checks: Vec<Check>,
    /// Raw traceroute output, if the tool exists on the device.
    pub traceroute: Option<String>,
}

impl DiagnosticReport {
    pub fn all_passed(&self) -> bool {
        self.checks
            .iter()
            .all(|c| c.outcome != Outcome::Fail)
    }
}

/// Average round trip from the `rtt min/avg/max/mdev` summary line of ping.
pub fn average_rtt(ping_output: &str) -> Option<f64> {
    let re = Regex::new(r"= [\d.]+/([\d.]+)/[\d.]+").ok()?;
    re.captures(ping_output)?.get(1)?.as_str().parse().ok()
}

fn ping(session: &dyn RemoteSession, name: &'static str, target: &str) -> Check {
    match session.run(&format!("ping -c 3 -W 2 {}", target)) {
        Ok(output) if output.success() => Check {
            name,
            outcome: Outcome::Pass,
            detail: match average_rtt(&output.stdout) {
                Some(rtt) => format!("{} reachable, avg {:.1} ms", target, rtt),
                None => format!("{} reachable", target),
            },
        },
        Ok(output) => Check {
            name,
            outcome: Outcome::Fail,
            detail: if output.stderr.is_empty() {
                format!("{} unreachable", target)
            } else {
                output.stderr
            },
        },
        Err(e) => Check {
            name,
            outcome: Outcome::Fail,
            detail: e.to_string(),
        },
    }
}

fn http(session: &dyn RemoteSession) -> Check {
    let name = "HTTP fetch";
    let command = format!(
        "curl -sS -o /dev/null -w '%{{http_code}}' --connect-timeout 5 {}",
        HTTP_URL
    );
    match session.run(&command) {
        Ok(output) if output.success() => Check {
            name,
            outcome: Outcome::Pass,
            detail: format!("{} answered HTTP {}", HTTP_URL, output.stdout.trim()),
        },
        Ok(output) => Check {
            name,
            outcome: Outcome::Fail,
            detail: format!("curl exited with {}: {}", output.code, output.stderr),
        },
        Err(e) => Check {
            name,
            outcome: Outcome::Fail,
            detail: e.to_string(),
        },
    }
}

fn traceroute(session: &dyn RemoteSession) -> (Check, Option<String>) {
    let name = "traceroute (3 hops)";
    let installed = session
        .run("command -v traceroute")
        .map(|o| o.success())
        .unwrap_or(false);
    if !installed {
        return (
            Check {
                name,
                outcome: Outcome::Skipped,
                detail: "traceroute not installed on device".to_string(),
            },
            None,
        );
    }

    match session.run(&format!("traceroute -m 3 {}", PING_IP)) {
        Ok(output) => {
            let outcome = if output.success() {
                Outcome::Pass
            } else {
                Outcome::Skipped
            };
            (
                Check {
                    name,
                    outcome,
                    detail: format!("exit {}", output.code),
                },
                Some(output.stdout),
            )
        }
        Err(e) => (
            Check {
                name,
                outcome: Outcome::Skipped,
                detail: e.to_string(),
            },
            None,
        ),
    }
}

/// Runs every check on the device. Failures are recorded, never returned.
pub fn run(session: &dyn RemoteSession) -> DiagnosticReport {
    let mut checks = vec![
        ping(session, "ping IP", PING_IP),
        ping(session, "ping hostname (DNS)", PING_HOST),
        http(session),
    ];
    let (trace, output) = traceroute(session);
    checks.push(trace);

    DiagnosticReport {
        checks,
        traceroute: output,
    }
}

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io;
use std::net::Ipv4Addr;

use orin_share::devices::{Interface, ROUTE_TABLE};
use orin_share::host::{CommandOutput, Host};
use orin_share::remote::RemoteSession;
use orin_share::Result;

pub const DEFAULT_ROUTE: &str = "\
Iface\tDestination\tGateway \tFlags\tRefCnt\tUse\tMetric\tMask\t\tMTU\tWindow\tIRTT
eth0\t00000000\t0100000A\t0003\t0\t0\t100\t00000000\t0\t0\t0
eth0\t0000000A\t00000000\t0001\t0\t0\t100\t00FFFFFF\t0\t0\t0
";

pub const NO_DEFAULT_ROUTE: &str = "\
Iface\tDestination\tGateway \tFlags\tRefCnt\tUse\tMetric\tMask\t\tMTU\tWindow\tIRTT
usb0\t0037A8C0\t00000000\t0001\t0\t0\t100\t00FFFFFF\t0\t0\t0
";

/// Kernel state the fake host exposes, comparable before and after a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostState {
    pub ip_forward: String,
    pub chains: BTreeMap<(String, String), Vec<String>>,
}

/// In-memory host: sysctl flag, iptables chains, routing table, interfaces.
pub struct FakeHost {
    pub state: RefCell<HostState>,
    pub route_table: String,
    pub interfaces: Vec<Interface>,
    pub programs: Vec<&'static str>,
    /// `-A` of a rule whose spec contains this text fails.
    pub fail_append: Option<String>,
    pub commands: RefCell<Vec<String>>,
}

impl FakeHost {
    /// Uplink `eth0` at 10.0.0.5 with a default route, forwarding off.
    pub fn new() -> Self {
        let mut chains = BTreeMap::new();
        chains.insert(("nat".to_string(), "POSTROUTING".to_string()), Vec::new());
        chains.insert(("filter".to_string(), "FORWARD".to_string()), Vec::new());
        FakeHost {
            state: RefCell::new(HostState {
                ip_forward: "0".to_string(),
                chains,
            }),
            route_table: DEFAULT_ROUTE.to_string(),
            interfaces: vec![
                iface("lo", Some(Ipv4Addr::new(127, 0, 0, 1))),
                iface("eth0", Some(Ipv4Addr::new(10, 0, 0, 5))),
            ],
            programs: vec!["ssh", "sshpass", "iptables", "sysctl"],
            fail_append: None,
            commands: RefCell::new(Vec::new()),
        }
    }

    pub fn with_usb_link(mut self) -> Self {
        self.interfaces
            .push(iface("usb0", Some(Ipv4Addr::new(192, 168, 55, 100))));
        self
    }

    pub fn snapshot(&self) -> HostState {
        self.state.borrow().clone()
    }

    pub fn rules(&self, table: &str, chain: &str) -> Vec<String> {
        self.state.borrow().chains[&(table.to_string(), chain.to_string())].clone()
    }

    pub fn push_rule(&self, table: &str, chain: &str, spec: &str) {
        self.state
            .borrow_mut()
            .chains
            .get_mut(&(table.to_string(), chain.to_string()))
            .unwrap()
            .push(spec.to_string());
    }

    pub fn count(&self, table: &str, chain: &str, spec: &str) -> usize {
        self.rules(table, chain).iter().filter(|r| *r == spec).count()
    }

    fn iptables(&self, args: &[&str]) -> CommandOutput {
        let (table, action, chain, spec) = match args {
            ["-t", table, action, chain, rest @ ..] => (*table, *action, *chain, rest.join(" ")),
            _ => return fail(2, "bad arguments"),
        };
        let key = (table.to_string(), chain.to_string());
        let mut state = self.state.borrow_mut();
        let rules = match state.chains.get_mut(&key) {
            Some(rules) => rules,
            None => return fail(1, "No chain/target/match by that name."),
        };

        match action {
            "-S" => {
                let mut out = format!("-P {} ACCEPT\n", chain);
                for rule in rules.iter() {
                    out.push_str(&format!("-A {} {}\n", chain, rule));
                }
                ok(&out)
            }
            "-A" => {
                if let Some(needle) = &self.fail_append {
                    if spec.contains(needle.as_str()) {
                        return fail(4, "iptables: Resource temporarily unavailable.");
                    }
                }
                rules.push(spec);
                ok("")
            }
            "-D" => match rules.iter().position(|r| *r == spec) {
                Some(i) => {
                    rules.remove(i);
                    ok("")
                }
                None => fail(
                    1,
                    "iptables: Bad rule (does a matching rule exist in that chain?).",
                ),
            },
            _ => fail(2, "unsupported action"),
        }
    }
}

impl Host for FakeHost {
    fn run(&self, program: &str, args: &[&str]) -> io::Result<CommandOutput> {
        self.commands
            .borrow_mut()
            .push(format!("{} {}", program, args.join(" ")));

        Ok(match (program, args) {
            ("sysctl", ["-w", setting]) => match setting.strip_prefix("net.ipv4.ip_forward=") {
                Some(value) => {
                    self.state.borrow_mut().ip_forward = value.to_string();
                    ok(value)
                }
                None => fail(255, "unknown key"),
            },
            ("iptables", args) => self.iptables(args),
            _ => fail(127, "command not found"),
        })
    }

    fn read_file(&self, path: &str) -> io::Result<String> {
        match path {
            "/proc/sys/net/ipv4/ip_forward" => Ok(format!("{}\n", self.state.borrow().ip_forward)),
            p if p == ROUTE_TABLE => Ok(self.route_table.clone()),
            _ => Err(io::Error::new(io::ErrorKind::NotFound, path.to_string())),
        }
    }

    fn interfaces(&self) -> io::Result<Vec<Interface>> {
        Ok(self.interfaces.clone())
    }

    fn has_program(&self, name: &str) -> bool {
        self.programs.contains(&name)
    }
}

/// Scripted device reached over SSH.
pub struct FakeDevice {
    pub reachable: bool,
    pub internet: bool,
    pub traceroute: bool,
    /// Every sudo invocation is refused.
    pub sudo_denied: bool,
    pub commands: RefCell<Vec<String>>,
    pub inputs: RefCell<Vec<String>>,
    pub gateway: RefCell<Option<String>>,
    pub resolv_conf: RefCell<String>,
}

impl FakeDevice {
    pub fn new() -> Self {
        FakeDevice {
            reachable: true,
            internet: true,
            traceroute: false,
            sudo_denied: false,
            commands: RefCell::new(Vec::new()),
            inputs: RefCell::new(Vec::new()),
            gateway: RefCell::new(Some("192.168.55.100".to_string())),
            resolv_conf: RefCell::new("nameserver 127.0.0.53\n".to_string()),
        }
    }

    pub fn unreachable() -> Self {
        FakeDevice {
            reachable: false,
            ..FakeDevice::new()
        }
    }

    fn execute(&self, command: &str) -> CommandOutput {
        self.commands.borrow_mut().push(command.to_string());
        if !self.reachable {
            return fail(255, "ssh: connect to host 192.168.55.69 port 22: Connection timed out");
        }

        let privileged = command
            .strip_prefix("sudo -k -S -p '' ")
            .or_else(|| command.strip_prefix("sudo -n "));
        if let Some(inner) = privileged {
            return self.privileged(inner);
        }

        match command {
            "true" => ok(""),
            "ip route" => match self.gateway.borrow().as_deref() {
                Some(gw) => ok(&format!("default via {} dev eth0\n192.168.55.0/24 dev l4tbr0\n", gw)),
                None => ok("192.168.55.0/24 dev l4tbr0\n"),
            },
            "cat /etc/resolv.conf" => ok(&self.resolv_conf.borrow()),
            "command -v traceroute" if self.traceroute => ok("/usr/sbin/traceroute\n"),
            "command -v traceroute" => fail(1, ""),
            c if c.starts_with("traceroute") => ok(" 1  192.168.55.100  0.4 ms\n"),
            c if c.starts_with("ping") && self.internet => ok(
                "3 packets transmitted, 3 received, 0% packet loss\nrtt min/avg/max/mdev = 9.1/10.4/12.0/1.1 ms\n",
            ),
            c if c.starts_with("ping") => fail(1, "connect: Network is unreachable"),
            c if c.starts_with("curl") && self.internet => ok("200"),
            c if c.starts_with("curl") => fail(28, "curl: (28) Connection timed out"),
            _ => fail(127, "command not found"),
        }
    }

    fn privileged(&self, command: &str) -> CommandOutput {
        if self.sudo_denied {
            return fail(1, "sudo: 1 incorrect password attempt");
        }
        if command == "ip route del default" {
            return match self.gateway.borrow_mut().take() {
                Some(_) => ok(""),
                None => fail(2, "RTNETLINK answers: No such process"),
            };
        }
        if let Some(gw) = command.strip_prefix("ip route add default via ") {
            *self.gateway.borrow_mut() = Some(gw.to_string());
            return ok("");
        }
        if command.starts_with("sh -c ") && command.contains("/etc/resolv.conf") {
            let content: String = command
                .lines()
                .filter(|l| l.contains("nameserver"))
                .map(|l| {
                    let start = l.find("nameserver").unwrap_or(0);
                    format!("{}\n", &l[start..])
                })
                .collect();
            *self.resolv_conf.borrow_mut() = content;
            return ok("");
        }
        fail(1, "sudo: command not allowed")
    }
}

impl RemoteSession for FakeDevice {
    fn run(&self, command: &str) -> Result<CommandOutput> {
        Ok(self.execute(command))
    }

    fn run_with_input(&self, command: &str, input: &str) -> Result<CommandOutput> {
        self.inputs.borrow_mut().push(input.to_string());
        Ok(self.execute(command))
    }
}

pub fn iface(name: &str, ipv4: Option<Ipv4Addr>) -> Interface {
    Interface {
        name: name.to_string(),
        ipv4,
    }
}

fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        stdout: stdout.to_string(),
        stderr: String::new(),
        code: 0,
    }
}

fn fail(code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        stdout: String::new(),
        stderr: stderr.to_string(),
        code,
    }
}

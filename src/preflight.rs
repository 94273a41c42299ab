use log::debug;

use crate::error::{Result, ShareError};
use crate::host::Host;

/// (binary, Debian package providing it)
const REQUIRED: [(&str, &str); 3] = [
    ("ssh", "openssh-client"),
    ("iptables", "iptables"),
    ("sysctl", "procps"),
];

const SSHPASS: (&str, &str) = ("sshpass", "sshpass");

/// Fails on the first missing host tool. `sshpass` is only needed for password auth.
pub fn check_tools(host: &dyn Host, password_auth: bool) -> Result<()> {
    let extra = if password_auth { Some(SSHPASS) } else { None };

    for (tool, package) in REQUIRED.into_iter().chain(extra) {
        if !host.has_program(tool) {
            return Err(ShareError::ToolMissing {
                tool: tool.to_string(),
                package: package.to_string(),
            });
        }
        debug!("found {}", tool);
    }
    Ok(())
}

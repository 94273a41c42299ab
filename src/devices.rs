use std::net::Ipv4Addr;

use log::{info, warn};

use crate::error::{Result, ShareError, Warning};
use crate::host::Host;

pub const ROUTE_TABLE: &str = "/proc/net/route";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub name: String,
    pub ipv4: Option<Ipv4Addr>,
}

/// The host interface carrying its own internet connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uplink {
    pub name: String,
    pub address: Ipv4Addr,
}

/// Address handed to the device as its default gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gateway {
    pub address: Ipv4Addr,
    pub fallback: bool,
}

// Name of the interface holding the default route, first match wins
pub fn default_route_interface(route_table: &str) -> Option<String> {
    for line in route_table.lines().skip(1) {
        // Iface Destination Gateway Flags ...
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 || fields[1] != "00000000" {
            continue;
        }
        let flags = u32::from_str_radix(fields[3], 16).unwrap_or(0);
        // RTF_UP = 0x1 (from Linux route.h)
        if flags & 0x1 != 0 {
            return Some(fields[0].to_string());
        }
    }
    None
}

/// Picks the uplink, either the operator's override or the default-route interface.
pub fn detect_uplink(host: &dyn Host, override_name: Option<&str>) -> Result<Uplink> {
    let interfaces = host.interfaces()?;

    let name = match override_name {
        Some(name) => name.to_string(),
        None => {
            let table = host.read_file(ROUTE_TABLE).unwrap_or_default();
            match default_route_interface(&table) {
                Some(name) => name,
                None => {
                    return Err(ShareError::InterfaceNotFound {
                        available: interfaces.into_iter().map(|i| i.name).collect(),
                    })
                }
            }
        }
    };

    let address = interfaces
        .iter()
        .find(|i| i.name == name)
        .and_then(|i| i.ipv4)
        .ok_or_else(|| ShareError::AddressNotFound(name.clone()))?;

    info!("uplink interface {} ({})", name, address);
    Ok(Uplink { name, address })
}

/// Finds the host address on the device's /24. Falls back to the uplink address.
pub fn resolve_gateway(
    interfaces: &[Interface],
    device: Ipv4Addr,
    uplink: &Uplink,
) -> (Gateway, Option<Warning>) {
    let prefix = &device.octets()[..3];

    let local = interfaces
        .iter()
        .filter_map(|i| i.ipv4)
        .find(|ip| &ip.octets()[..3] == prefix && *ip != device);

    match local {
        Some(address) => (
            Gateway {
                address,
                fallback: false,
            },
            None,
        ),
        None => {
            let warning = Warning::GatewayFallback {
                device,
                gateway: uplink.address,
            };
            warn!("{}", warning);
            (
                Gateway {
                    address: uplink.address,
                    fallback: true,
                },
                Some(warning),
            )
        }
    }
}

//! VIP data types: hardware addresses, interfaces and the binding triple.

use common::{Error, Result};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Ethernet hardware address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// ff:ff:ff:ff:ff:ff
    pub const BROADCAST: MacAddr = MacAddr([0xff; 6]);

    /// 00:00:00:00:00:00
    pub const ZERO: MacAddr = MacAddr([0; 6]);

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Group bit set (includes broadcast)
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::interface(format!("invalid hardware address: {s:?}"));

        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(MacAddr(octets))
    }
}

/// Host network interface the VIP is bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    /// Interface name (e.g., "eth0")
    pub name: String,

    /// Kernel interface index
    pub index: u32,

    /// Hardware address announced in gratuitous ARP
    pub hardware_addr: MacAddr,
}

impl Interface {
    pub fn new(name: impl Into<String>, index: u32, hardware_addr: MacAddr) -> Self {
        Self {
            name: name.into(),
            index,
            hardware_addr,
        }
    }

    /// Resolve an interface by name from the running kernel.
    ///
    /// The index comes from `if_nametoindex(3)` and the hardware address
    /// from `/sys/class/net/<name>/address`.
    pub fn from_name(name: &str) -> Result<Self> {
        let index = nix::net::if_::if_nametoindex(name)
            .map_err(|e| Error::interface(format!("interface {name} not found: {e}")))?;

        let path = format!("/sys/class/net/{name}/address");
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            Error::interface(format!("cannot read hardware address of {name}: {e}"))
        })?;
        let hardware_addr = raw.trim().parse()?;

        Ok(Self::new(name, index, hardware_addr))
    }
}

/// Address/prefix-length pair, rendered as `192.168.0.12/24`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cidr {
    pub address: Ipv4Addr,
    pub prefix_length: u8,
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_length)
    }
}

/// The (interface, virtual address, prefix length) triple managed by one
/// configurator. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VipConfig {
    interface: Interface,
    virtual_address: Ipv4Addr,
    prefix_length: u8,
}

impl VipConfig {
    pub fn new(interface: Interface, virtual_address: Ipv4Addr, prefix_length: u8) -> Result<Self> {
        if interface.name.is_empty() {
            return Err(Error::config("interface name is required"));
        }

        if prefix_length > 32 {
            return Err(Error::config(format!(
                "prefix length {prefix_length} is out of range (0-32)"
            )));
        }

        Ok(Self {
            interface,
            virtual_address,
            prefix_length,
        })
    }

    pub fn interface(&self) -> &Interface {
        &self.interface
    }

    pub fn virtual_address(&self) -> Ipv4Addr {
        self.virtual_address
    }

    pub fn prefix_length(&self) -> u8 {
        self.prefix_length
    }

    pub fn cidr(&self) -> Cidr {
        Cidr {
            address: self.virtual_address,
            prefix_length: self.prefix_length,
        }
    }
}

/// Convert a dotted netmask to its prefix length.
///
/// Only contiguous masks are accepted.
pub fn prefix_from_netmask(netmask: Ipv4Addr) -> Result<u8> {
    let bits = u32::from(netmask);
    let ones = bits.leading_ones();

    if bits.checked_shl(ones).unwrap_or(0) != 0 {
        return Err(Error::config(format!("netmask {netmask} is not contiguous")));
    }

    Ok(ones as u8)
}

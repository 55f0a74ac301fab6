//! Virtual IP (VIP) interface configuration for failover.
//!
//! Binds a single IPv4 VIP to a host interface when this node takes over,
//! announces it with a gratuitous ARP reply so peers refresh their caches,
//! and removes it when the node steps down. Deciding *when* to do either
//! is left to the owning controller (e.g. a VRRP state machine).
//!
//! # Features
//!
//! - Idempotent add/remove through iproute2 (`ip addr`)
//! - Best-effort state probe of the live interface listing
//! - Gratuitous ARP over a raw `AF_PACKET` socket
//! - YAML settings with validation
//!
//! # Example
//!
//! ```no_run
//! use vip::{VipConfigurator, VipSettings};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = VipSettings::from_yaml_str(
//!     "interface: eth0\nvirtual_address: 192.168.0.12\nprefix_length: 24\n",
//! )?;
//!
//! // Requires CAP_NET_ADMIN and CAP_NET_RAW
//! let mut vip = VipConfigurator::new(settings.resolve()?)?
//!     .with_ip_command(settings.ip_command());
//!
//! if !vip.query_address()? {
//!     vip.configure_address();
//! }
//!
//! vip.deconfigure_address();
//! vip.cleanup_arp();
//! # Ok(())
//! # }
//! ```

pub mod arp;
pub mod command;
mod configurator;
pub mod settings;
mod socket;
mod types;

pub use arp::{ARP_OP_REPLY, ARP_OP_REQUEST, ArpPacket};
pub use command::{
    AddressAction, CommandOutcome, CommandOutput, CommandRunner, IpCommand, SystemCommandRunner,
};
pub use configurator::VipConfigurator;
pub use settings::{SettingsError, VipSettings};
pub use socket::{ArpSocket, ArpTransport};
pub use types::{Cidr, Interface, MacAddr, VipConfig, prefix_from_netmask};

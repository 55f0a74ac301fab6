//! Bind a VIP, hold it for a while, then release it
//!
//! Usage:
//!   sudo target/release/examples/vip_toggle [settings.yaml] [hold_seconds]
//!
//! Or with capabilities:
//!   sudo setcap cap_net_admin,cap_net_raw+ep target/release/examples/vip_toggle
//!   target/release/examples/vip_toggle ./vip.yaml 10
//!
//! Without a settings path the default search paths are used
//! (/etc/seesaw/vip.yaml, ./vip.yaml).

use std::env;
use std::thread::sleep;
use std::time::Duration;
use tracing::{info, warn};
use vip::{VipConfigurator, VipSettings};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    common::logging::init_with_level("vip=info");

    let args: Vec<String> = env::args().collect();
    let settings = match args.get(1) {
        Some(path) => VipSettings::load_from_file(path)?,
        None => VipSettings::load()?,
    };
    let hold = Duration::from_secs(args.get(2).and_then(|s| s.parse().ok()).unwrap_or(10));

    let config = settings.resolve()?;
    info!(
        interface = %config.interface().name,
        hardware_addr = %config.interface().hardware_addr,
        cidr = %config.cidr(),
        "Resolved VIP settings"
    );

    let mut vip = VipConfigurator::new(config)?.with_ip_command(settings.ip_command());

    if vip.query_address()? {
        info!(cidr = %vip.cidr(), "Address already bound");
    }

    if !vip.configure_address() {
        warn!(cidr = %vip.cidr(), "Could not bind address");
        vip.cleanup_arp();
        return Err("address configuration failed".into());
    }
    info!(cidr = %vip.cidr(), bound = vip.query_address()?, "Holding address for {:?}", hold);

    sleep(hold);

    if !vip.deconfigure_address() {
        warn!(cidr = %vip.cidr(), "Could not remove address");
    }
    info!(cidr = %vip.cidr(), bound = vip.query_address()?, "Released address");

    vip.cleanup_arp();
    Ok(())
}

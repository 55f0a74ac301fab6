//! VIP interface configurator.
//!
//! Binds and unbinds a single virtual IPv4 address on an interface and
//! announces new bindings with a gratuitous ARP reply. All operations
//! block; callers sharing an instance across threads must serialize access.

use crate::arp::ArpPacket;
use crate::command::{AddressAction, CommandOutcome, CommandRunner, IpCommand, SystemCommandRunner};
use crate::socket::{ArpSocket, ArpTransport};
use crate::types::{Cidr, MacAddr, VipConfig};
use common::{Error, Result};
use tracing::{debug, error, info, warn};

/// Manages one (interface, address, prefix) binding
pub struct VipConfigurator<R = SystemCommandRunner, T = ArpSocket>
where
    R: CommandRunner,
    T: ArpTransport,
{
    config: VipConfig,
    ip: IpCommand,
    runner: R,
    transport: T,
}

impl VipConfigurator {
    /// Create a configurator that shells out to `ip` and announces over a
    /// raw socket on the configured interface.
    ///
    /// # Errors
    ///
    /// Fails if the ARP socket cannot be bound (interface missing,
    /// insufficient privilege). No partially built instance is returned.
    pub fn new(config: VipConfig) -> Result<Self> {
        let transport = ArpSocket::bind(config.interface()).map_err(|e| {
            warn!(
                interface = %config.interface().name,
                error = %e,
                "Cannot create ARP socket"
            );
            Error::interface(format!(
                "cannot bind ARP socket on {}: {}",
                config.interface().name,
                e
            ))
        })?;

        Ok(Self::with_parts(config, SystemCommandRunner, transport))
    }
}

impl<R, T> VipConfigurator<R, T>
where
    R: CommandRunner,
    T: ArpTransport,
{
    /// Assemble a configurator from an explicit command runner and transport.
    pub fn with_parts(config: VipConfig, runner: R, transport: T) -> Self {
        Self {
            config,
            ip: IpCommand::default(),
            runner,
            transport,
        }
    }

    /// Use a different `ip` binary.
    pub fn with_ip_command(mut self, ip: IpCommand) -> Self {
        self.ip = ip;
        self
    }

    pub fn config(&self) -> &VipConfig {
        &self.config
    }

    pub fn cidr(&self) -> Cidr {
        self.config.cidr()
    }

    /// Report whether the VIP is currently bound to the interface.
    ///
    /// This is a best-effort probe of the `ip addr show` listing: a
    /// non-zero exit from the inspection command reads as "not bound".
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandLaunch`] if the inspection command cannot
    /// be started.
    pub fn query_address(&self) -> Result<bool> {
        let cidr = self.cidr().to_string();
        let interface = &self.config.interface().name;
        let args = self.ip.show_args(interface);

        let output = self
            .runner
            .run(self.ip.binary(), &args)
            .map_err(|e| Error::command_launch(self.ip.binary(), e))?;

        if !output.success() {
            debug!(
                interface = %interface,
                code = ?output.code,
                stderr = output.stderr.trim(),
                "Interface inspection exited unsuccessfully"
            );
        }

        let found = output
            .stdout
            .lines()
            .any(|line| line.split_whitespace().any(|token| token == cidr));

        debug!(cidr = %cidr, interface = %interface, found, "Queried address");
        Ok(found)
    }

    /// Bind the VIP and announce it.
    ///
    /// Returns `true` if the address is bound afterwards. A failed
    /// announcement is logged and does not change the result.
    pub fn configure_address(&mut self) -> bool {
        info!(
            cidr = %self.cidr(),
            interface = %self.config.interface().name,
            "Configuring address"
        );

        let configured = self.run_address_configuration(AddressAction::Add);

        if configured && self.send_gratuitous_arp().is_err() {
            // Peers still learn the mapping through regular ARP resolution.
            debug!(cidr = %self.cidr(), "Continuing without gratuitous ARP");
        }

        configured
    }

    /// Unbind the VIP. Returns `true` if the address is absent afterwards.
    pub fn deconfigure_address(&mut self) -> bool {
        info!(
            cidr = %self.cidr(),
            interface = %self.config.interface().name,
            "Removing address"
        );

        self.run_address_configuration(AddressAction::Delete)
    }

    /// Broadcast an unsolicited ARP reply claiming the VIP for this
    /// interface's hardware address.
    pub fn send_gratuitous_arp(&mut self) -> Result<()> {
        let interface = self.config.interface();

        let packet =
            ArpPacket::gratuitous(interface.hardware_addr, self.config.virtual_address())
                .inspect_err(|e| {
                    warn!(
                        interface = %interface.name,
                        error = %e,
                        "Gratuitous ARP packet is malformed"
                    );
                })?;

        let frame = packet.ethernet_frame(MacAddr::BROADCAST);
        self.transport.send(&frame, MacAddr::BROADCAST).map_err(|e| {
            warn!(interface = %interface.name, error = %e, "Cannot send gratuitous ARP");
            Error::arp(format!("cannot send gratuitous ARP on {}: {e}", interface.name))
        })?;

        debug!(
            address = %self.config.virtual_address(),
            hardware_addr = %interface.hardware_addr,
            interface = %interface.name,
            "Sent gratuitous ARP"
        );
        Ok(())
    }

    /// Release the ARP socket. Consumes the configurator.
    pub fn cleanup_arp(mut self) {
        match self.transport.close() {
            Ok(()) => debug!(interface = %self.config.interface().name, "Released ARP socket"),
            Err(e) => warn!(
                interface = %self.config.interface().name,
                error = %e,
                "Error closing ARP socket"
            ),
        }
    }

    fn run_address_configuration(&self, action: AddressAction) -> bool {
        let cidr = self.cidr().to_string();
        let interface = &self.config.interface().name;
        let args = self.ip.address_args(action, &cidr, interface);

        let outcome = CommandOutcome::classify(self.runner.run(self.ip.binary(), &args));
        match &outcome {
            CommandOutcome::Success => {
                debug!(%action, cidr = %cidr, interface = %interface, "Address updated");
            }
            CommandOutcome::AlreadyInDesiredState => {
                debug!(
                    %action,
                    cidr = %cidr,
                    interface = %interface,
                    "Address already in desired state"
                );
            }
            CommandOutcome::Failed(cause) => {
                error!(
                    %action,
                    cidr = %cidr,
                    interface = %interface,
                    cause = %cause,
                    "Error running ip address command"
                );
            }
        }

        outcome.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandOutput, MockCommandRunner};
    use crate::socket::MockArpTransport;
    use crate::types::Interface;
    use mockall::predicate::eq;
    use std::io;

    fn eth0_config() -> VipConfig {
        let iface = Interface::new("eth0", 2, MacAddr([0x52, 0x54, 0x00, 0x12, 0x34, 0x56]));
        VipConfig::new(iface, "192.168.0.12".parse().unwrap(), 24).unwrap()
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_configure_issues_add_and_announces() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|program, a| {
                program == "ip" && a == args(&["addr", "add", "192.168.0.12/24", "dev", "eth0"])
            })
            .times(1)
            .returning(|_, _| Ok(CommandOutput::with_code(0)));

        let mut transport = MockArpTransport::new();
        transport
            .expect_send()
            .withf(|frame, dst| {
                let packet = ArpPacket::parse_frame(frame).unwrap();
                *dst == MacAddr::BROADCAST
                    && packet.operation == crate::arp::ARP_OP_REPLY
                    && packet.sender_protocol_addr == std::net::Ipv4Addr::new(192, 168, 0, 12)
            })
            .times(1)
            .returning(|frame, _| Ok(frame.len()));

        let mut vip = VipConfigurator::with_parts(eth0_config(), runner, transport);
        assert!(vip.configure_address());
    }

    #[test]
    fn test_configure_already_exists_is_success() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .returning(|_, _| Ok(CommandOutput::with_code(2)));

        let mut transport = MockArpTransport::new();
        transport.expect_send().times(1).returning(|frame, _| Ok(frame.len()));

        let mut vip = VipConfigurator::with_parts(eth0_config(), runner, transport);
        assert!(vip.configure_address());
    }

    #[test]
    fn test_configure_failure_skips_announcement() {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(|_, _| {
            Ok(CommandOutput {
                code: Some(1),
                stdout: String::new(),
                stderr: "RTNETLINK answers: Operation not permitted\n".to_string(),
            })
        });

        let mut transport = MockArpTransport::new();
        transport.expect_send().never();

        let mut vip = VipConfigurator::with_parts(eth0_config(), runner, transport);
        assert!(!vip.configure_address());
    }

    #[test]
    fn test_configure_launch_failure() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .returning(|_, _| {
                Err(io::Error::new(io::ErrorKind::NotFound, "No such file or directory"))
            });

        let mut transport = MockArpTransport::new();
        transport.expect_send().never();

        let mut vip = VipConfigurator::with_parts(eth0_config(), runner, transport);
        assert!(!vip.configure_address());
    }

    #[test]
    fn test_announcement_failure_keeps_binding() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .returning(|_, _| Ok(CommandOutput::with_code(0)));

        let mut transport = MockArpTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_, _| {
                Err(io::Error::new(io::ErrorKind::NotConnected, "ARP socket is closed"))
            });

        let mut vip = VipConfigurator::with_parts(eth0_config(), runner, transport);
        assert!(vip.configure_address());
    }

    #[test]
    fn test_deconfigure_does_not_announce() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|_, a| a == args(&["addr", "delete", "192.168.0.12/24", "dev", "eth0"]))
            .times(2)
            .returning({
                let mut codes = vec![2, 0];
                move |_, _| Ok(CommandOutput::with_code(codes.pop().unwrap()))
            });

        let mut transport = MockArpTransport::new();
        transport.expect_send().never();

        let mut vip = VipConfigurator::with_parts(eth0_config(), runner, transport);
        assert!(vip.deconfigure_address());
        assert!(vip.deconfigure_address());
    }

    #[test]
    fn test_query_address() {
        let listing = "\
2: eth0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc fq_codel state UP group default qlen 1000
    inet 192.168.0.5/24 brd 192.168.0.255 scope global eth0
       valid_lft forever preferred_lft forever
    inet 192.168.0.12/24 scope global secondary eth0
       valid_lft forever preferred_lft forever
";
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .with(eq("ip"), eq(args(&["-4", "addr", "show", "dev", "eth0"])))
            .returning(move |_, _| {
                Ok(CommandOutput {
                    code: Some(0),
                    stdout: listing.to_string(),
                    stderr: String::new(),
                })
            });

        let vip = VipConfigurator::with_parts(eth0_config(), runner, MockArpTransport::new());
        assert!(vip.query_address().unwrap());
    }

    #[test]
    fn test_query_requires_exact_token() {
        let listing = "    inet 192.168.0.120/24 scope global eth0\n\
                       \x20   inet 192.168.0.12/25 scope global eth0\n";
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(move |_, _| {
            Ok(CommandOutput {
                code: Some(0),
                stdout: listing.to_string(),
                stderr: String::new(),
            })
        });

        let vip = VipConfigurator::with_parts(eth0_config(), runner, MockArpTransport::new());
        assert!(!vip.query_address().unwrap());
    }

    #[test]
    fn test_query_nonzero_exit_is_absent() {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(|_, _| {
            Ok(CommandOutput {
                code: Some(1),
                stdout: String::new(),
                stderr: "Device \"eth0\" does not exist.\n".to_string(),
            })
        });

        let vip = VipConfigurator::with_parts(eth0_config(), runner, MockArpTransport::new());
        assert!(!vip.query_address().unwrap());
    }

    #[test]
    fn test_query_launch_failure_is_error() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .returning(|_, _| {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "Permission denied"))
            });

        let vip = VipConfigurator::with_parts(eth0_config(), runner, MockArpTransport::new());
        let err = vip.query_address().unwrap_err();
        assert!(matches!(err, Error::CommandLaunch { ref program, .. } if program == "ip"));
    }

    #[test]
    fn test_custom_ip_binary() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|program, _| program == "/sbin/ip")
            .times(1)
            .returning(|_, _| Ok(CommandOutput::with_code(0)));

        let vip = VipConfigurator::with_parts(eth0_config(), runner, MockArpTransport::new())
            .with_ip_command(IpCommand::new("/sbin/ip"));
        assert!(!vip.query_address().unwrap());
    }

    #[test]
    fn test_gratuitous_arp_rejects_unset_hardware_address() {
        let iface = Interface::new("lo", 1, MacAddr::ZERO);
        let config = VipConfig::new(iface, "127.0.10.1".parse().unwrap(), 32).unwrap();

        let mut transport = MockArpTransport::new();
        transport.expect_send().never();

        let mut vip = VipConfigurator::with_parts(config, MockCommandRunner::new(), transport);
        assert!(matches!(vip.send_gratuitous_arp(), Err(Error::Arp(_))));
    }

    #[test]
    fn test_cleanup_closes_transport_once() {
        let mut transport = MockArpTransport::new();
        transport.expect_close().times(1).returning(|| Ok(()));

        let vip = VipConfigurator::with_parts(eth0_config(), MockCommandRunner::new(), transport);
        vip.cleanup_arp();
    }
}

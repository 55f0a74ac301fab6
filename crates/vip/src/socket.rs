//! Raw link-layer socket for sending ARP frames.
//!
//! An `AF_PACKET`/`SOCK_RAW` socket bound to a single interface. Frames
//! handed to [`ArpTransport::send`] must carry their own Ethernet header.
//! Requires CAP_NET_RAW.

use crate::types::{Interface, MacAddr};
use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, ErrorKind};
use std::os::fd::{AsRawFd, IntoRawFd};
use tracing::debug;

/// Send side of an interface-scoped ARP binding
#[cfg_attr(test, mockall::automock)]
pub trait ArpTransport {
    /// Transmit a complete Ethernet frame to the link-layer address `dst`.
    fn send(&mut self, frame: &[u8], dst: MacAddr) -> io::Result<usize>;

    /// Release the underlying handle. Sends after close fail.
    fn close(&mut self) -> io::Result<()>;
}

/// ARP socket bound to one interface
pub struct ArpSocket {
    socket: Option<Socket>,
    interface: String,
    ifindex: u32,
}

impl ArpSocket {
    /// Open a packet socket for ARP and bind it to `interface`.
    pub fn bind(interface: &Interface) -> io::Result<Self> {
        if interface.index == 0 {
            return Err(io::Error::new(
                ErrorKind::NotFound,
                format!("Interface {} not found", interface.name),
            ));
        }

        let socket = Socket::new(
            Domain::PACKET,
            Type::RAW,
            Some(Protocol::from(i32::from(eth_p_arp()))),
        )?;

        let addr = link_addr(interface.index, MacAddr::ZERO);
        let rc = unsafe {
            libc::bind(
                socket.as_raw_fd(),
                &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
                std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        debug!(
            interface = %interface.name,
            ifindex = interface.index,
            "Bound ARP socket"
        );

        Ok(Self {
            socket: Some(socket),
            interface: interface.name.clone(),
            ifindex: interface.index,
        })
    }
}

impl ArpTransport for ArpSocket {
    fn send(&mut self, frame: &[u8], dst: MacAddr) -> io::Result<usize> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| io::Error::new(ErrorKind::NotConnected, "ARP socket is closed"))?;

        let addr = link_addr(self.ifindex, dst);
        let sent = unsafe {
            libc::sendto(
                socket.as_raw_fd(),
                frame.as_ptr() as *const libc::c_void,
                frame.len(),
                0,
                &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
                std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };

        if sent < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(sent as usize)
        }
    }

    fn close(&mut self) -> io::Result<()> {
        let Some(socket) = self.socket.take() else {
            return Ok(());
        };

        let fd = socket.into_raw_fd();
        if unsafe { libc::close(fd) } < 0 {
            return Err(io::Error::last_os_error());
        }

        debug!(interface = %self.interface, "Closed ARP socket");
        Ok(())
    }
}

/// ETH_P_ARP in network byte order, as packet sockets expect
fn eth_p_arp() -> u16 {
    (libc::ETH_P_ARP as u16).to_be()
}

fn link_addr(ifindex: u32, dst: MacAddr) -> libc::sockaddr_ll {
    let mut addr: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
    addr.sll_family = libc::AF_PACKET as libc::c_ushort;
    addr.sll_protocol = eth_p_arp();
    addr.sll_ifindex = ifindex as libc::c_int;
    addr.sll_halen = 6;
    addr.sll_addr[..6].copy_from_slice(&dst.octets());
    addr
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_addr() {
        let addr = link_addr(3, MacAddr::BROADCAST);
        assert_eq!(addr.sll_family, libc::AF_PACKET as libc::c_ushort);
        assert_eq!(addr.sll_protocol, 0x0806u16.to_be());
        assert_eq!(addr.sll_ifindex, 3);
        assert_eq!(addr.sll_halen, 6);
        assert_eq!(&addr.sll_addr[..6], &[0xff; 6]);
        assert_eq!(&addr.sll_addr[6..], &[0, 0]);
    }

    #[test]
    fn test_bind_unknown_interface() {
        let iface = Interface::new("nonexistent99", 0, MacAddr::ZERO);
        let err = ArpSocket::bind(&iface).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_send_after_close() {
        let mut socket = ArpSocket {
            socket: None,
            interface: "lo".to_string(),
            ifindex: 1,
        };

        let err = socket.send(&[0u8; 60], MacAddr::BROADCAST).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotConnected);
        assert!(socket.close().is_ok());
    }

    #[test]
    fn test_bind_loopback() {
        // May fail if not running as root, so just check it doesn't panic
        let iface = Interface::new("lo", 1, MacAddr::ZERO);
        if let Ok(mut socket) = ArpSocket::bind(&iface) {
            assert_eq!(socket.interface, "lo");
            assert!(socket.close().is_ok());
            assert!(socket.socket.is_none());
        }
    }
}

//! ARP packet format for gratuitous announcements.
//!
//! RFC 826 packet layout for Ethernet/IPv4:
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |         Hardware Type         |         Protocol Type         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |  HW Addr Len  | Proto Addr Len|           Operation           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                 Sender Hardware Address (6)                   |
//! +                               +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                               | Sender Protocol Address (4)   |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+                               +
//! |                               |                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+                               +
//! |                 Target Hardware Address (6)                   |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                 Target Protocol Address (4)                   |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use crate::types::MacAddr;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use common::{Error, Result};
use std::net::Ipv4Addr;

/// ARP request operation code
pub const ARP_OP_REQUEST: u16 = 1;

/// ARP reply operation code. Gratuitous announcements are sent as replies.
pub const ARP_OP_REPLY: u16 = 2;

/// Hardware type for Ethernet
pub const ARP_HTYPE_ETHERNET: u16 = 1;

/// EtherType for IPv4
pub const ETHERTYPE_IPV4: u16 = 0x0800;

/// EtherType for ARP
pub const ETHERTYPE_ARP: u16 = 0x0806;

/// Size of an Ethernet/IPv4 ARP packet
pub const ARP_PACKET_LEN: usize = 28;

const ETHERNET_HEADER_LEN: usize = 14;

/// Minimum Ethernet frame length without FCS
const ETHERNET_MIN_FRAME_LEN: usize = 60;

/// Ethernet/IPv4 ARP packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpPacket {
    pub hardware_type: u16,
    pub protocol_type: u16,
    pub hardware_len: u8,
    pub protocol_len: u8,
    pub operation: u16,
    pub sender_hardware_addr: MacAddr,
    pub sender_protocol_addr: Ipv4Addr,
    pub target_hardware_addr: MacAddr,
    pub target_protocol_addr: Ipv4Addr,
}

impl ArpPacket {
    /// Build a packet, rejecting inputs no ARP stack would accept.
    ///
    /// The sender hardware address must be a usable unicast address.
    pub fn new(
        operation: u16,
        sender_hardware_addr: MacAddr,
        sender_protocol_addr: Ipv4Addr,
        target_hardware_addr: MacAddr,
        target_protocol_addr: Ipv4Addr,
    ) -> Result<Self> {
        if operation != ARP_OP_REQUEST && operation != ARP_OP_REPLY {
            return Err(Error::arp(format!("invalid operation code {operation}")));
        }

        if sender_hardware_addr.is_zero() {
            return Err(Error::arp("sender hardware address is unset"));
        }

        if sender_hardware_addr.is_multicast() {
            return Err(Error::arp(format!(
                "sender hardware address {sender_hardware_addr} is not unicast"
            )));
        }

        Ok(Self {
            hardware_type: ARP_HTYPE_ETHERNET,
            protocol_type: ETHERTYPE_IPV4,
            hardware_len: 6,
            protocol_len: 4,
            operation,
            sender_hardware_addr,
            sender_protocol_addr,
            target_hardware_addr,
            target_protocol_addr,
        })
    }

    /// Unsolicited reply claiming `address` for `hardware_addr`, aimed at
    /// every host on the segment.
    pub fn gratuitous(hardware_addr: MacAddr, address: Ipv4Addr) -> Result<Self> {
        Self::new(
            ARP_OP_REPLY,
            hardware_addr,
            address,
            MacAddr::BROADCAST,
            Ipv4Addr::BROADCAST,
        )
    }

    /// Parse an ARP packet (without Ethernet header)
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < ARP_PACKET_LEN {
            return Err(Error::arp(format!(
                "packet too short: {} bytes, need {ARP_PACKET_LEN}",
                data.len()
            )));
        }

        let mut buf = data;
        let hardware_type = buf.get_u16();
        let protocol_type = buf.get_u16();
        let hardware_len = buf.get_u8();
        let protocol_len = buf.get_u8();

        if hardware_type != ARP_HTYPE_ETHERNET || hardware_len != 6 {
            return Err(Error::arp("not an Ethernet ARP packet"));
        }

        if protocol_type != ETHERTYPE_IPV4 || protocol_len != 4 {
            return Err(Error::arp("not an IPv4 ARP packet"));
        }

        let operation = buf.get_u16();
        let sender_hardware_addr = read_mac(&mut buf);
        let sender_protocol_addr = Ipv4Addr::from(buf.get_u32());
        let target_hardware_addr = read_mac(&mut buf);
        let target_protocol_addr = Ipv4Addr::from(buf.get_u32());

        Ok(Self {
            hardware_type,
            protocol_type,
            hardware_len,
            protocol_len,
            operation,
            sender_hardware_addr,
            sender_protocol_addr,
            target_hardware_addr,
            target_protocol_addr,
        })
    }

    /// Parse an Ethernet II frame carrying ARP
    pub fn parse_frame(frame: &[u8]) -> Result<Self> {
        if frame.len() < ETHERNET_HEADER_LEN + ARP_PACKET_LEN {
            return Err(Error::arp(format!("frame too short: {} bytes", frame.len())));
        }

        let ethertype = u16::from_be_bytes([frame[12], frame[13]]);
        if ethertype != ETHERTYPE_ARP {
            return Err(Error::arp(format!("unexpected ethertype {ethertype:#06x}")));
        }

        Self::parse(&frame[ETHERNET_HEADER_LEN..])
    }

    /// Serialize the ARP payload
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(ARP_PACKET_LEN);
        self.write_to(&mut buf);
        buf.freeze()
    }

    /// Serialize as an Ethernet II frame from the sender hardware address
    /// to `dst`, padded to the minimum frame size.
    pub fn ethernet_frame(&self, dst: MacAddr) -> Bytes {
        let mut buf = BytesMut::with_capacity(ETHERNET_MIN_FRAME_LEN);

        buf.put_slice(&dst.octets());
        buf.put_slice(&self.sender_hardware_addr.octets());
        buf.put_u16(ETHERTYPE_ARP);
        self.write_to(&mut buf);

        if buf.len() < ETHERNET_MIN_FRAME_LEN {
            buf.put_bytes(0, ETHERNET_MIN_FRAME_LEN - buf.len());
        }

        buf.freeze()
    }

    fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u16(self.hardware_type);
        buf.put_u16(self.protocol_type);
        buf.put_u8(self.hardware_len);
        buf.put_u8(self.protocol_len);
        buf.put_u16(self.operation);
        buf.put_slice(&self.sender_hardware_addr.octets());
        buf.put_slice(&self.sender_protocol_addr.octets());
        buf.put_slice(&self.target_hardware_addr.octets());
        buf.put_slice(&self.target_protocol_addr.octets());
    }
}

fn read_mac(buf: &mut &[u8]) -> MacAddr {
    let mut octets = [0u8; 6];
    buf.copy_to_slice(&mut octets);
    MacAddr(octets)
}

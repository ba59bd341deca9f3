use std::fmt::{self, Display, Formatter};
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("unknown protocol `{0}` (expected tcp, udp, sctp, icmp or an IP protocol number)")]
    UnknownProtocol(String),
}

/// Transport protocol of a simulated packet or a VIP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Tcp,
    Udp,
    Sctp,
    Icmp,
    /// Any other IP protocol by number.
    Ip(u8),
}

impl Protocol {
    pub fn number(self) -> u8 {
        match self {
            Protocol::Icmp => 1,
            Protocol::Tcp => 6,
            Protocol::Udp => 17,
            Protocol::Sctp => 132,
            Protocol::Ip(n) => n,
        }
    }

    pub fn from_number(n: u8) -> Self {
        match n {
            1 => Protocol::Icmp,
            6 => Protocol::Tcp,
            17 => Protocol::Udp,
            132 => Protocol::Sctp,
            other => Protocol::Ip(other),
        }
    }

    /// Protocols whose `port` field is a real port number.
    pub fn has_ports(self) -> bool {
        matches!(self, Protocol::Tcp | Protocol::Udp | Protocol::Sctp)
    }
}

impl FromStr for Protocol {
    type Err = PacketError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            "sctp" => Ok(Protocol::Sctp),
            "icmp" => Ok(Protocol::Icmp),
            other => other
                .parse::<u8>()
                .map(Protocol::from_number)
                .map_err(|_| PacketError::UnknownProtocol(raw.to_string())),
        }
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => f.write_str("tcp"),
            Protocol::Udp => f.write_str("udp"),
            Protocol::Sctp => f.write_str("sctp"),
            Protocol::Icmp => f.write_str("icmp"),
            Protocol::Ip(n) => write!(f, "ip/{n}"),
        }
    }
}

/// A synthetic packet to push through the configuration.
///
/// For ICMP, `port` carries the ICMP type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PacketDescriptor {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub port: Option<u16>,
    pub protocol: Protocol,
    pub ingress: Option<String>,
}

impl PacketDescriptor {
    pub fn new(src: Ipv4Addr, dst: Ipv4Addr, protocol: Protocol) -> Self {
        Self {
            src,
            dst,
            port: None,
            protocol,
            ingress: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_ingress(mut self, ingress: impl Into<String>) -> Self {
        self.ingress = Some(ingress.into());
        self
    }
}

impl Display for PacketDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> {}", self.protocol, self.src, self.dst)?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        if let Some(ingress) = &self.ingress {
            write!(f, " via {ingress}")?;
        }
        Ok(())
    }
}

use std::fmt::{self, Display, Formatter};
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnetwork::Ipv4Network;
use serde::Serialize;

/// Parse the value tokens of a `subnet`/`ip`/`dst` setting.
///
/// Accepts `<ip> <mask>` as two tokens, a single `<ip>/<prefix>` token, or a
/// single host address.
pub fn parse_subnet(values: &[String]) -> Result<Ipv4Network, String> {
    match values {
        [ip, mask] => {
            let ip = parse_addr(ip)?;
            let mask = parse_addr(mask)?;
            Ipv4Network::with_netmask(ip, mask).map_err(|e| e.to_string())
        }
        [single] => Ipv4Network::from_str(single).map_err(|e| e.to_string()),
        [] => Err("missing address".to_string()),
        _ => Err(format!("expected `<ip> <mask>`, got {} tokens", values.len())),
    }
}

pub fn parse_addr(raw: &str) -> Result<Ipv4Addr, String> {
    raw.parse::<Ipv4Addr>()
        .map_err(|_| format!("`{raw}` is not an IPv4 address"))
}

/// First and last address of a network as integers.
pub fn network_bounds(net: &Ipv4Network) -> (u32, u32) {
    (u32::from(net.network()), u32::from(net.broadcast()))
}

/// The unspecified `0.0.0.0/0` network.
pub fn default_network() -> Ipv4Network {
    // Prefix 0 is always in range.
    Ipv4Network::new(Ipv4Addr::UNSPECIFIED, 0)
        .unwrap_or_else(|_| Ipv4Network::from(Ipv4Addr::UNSPECIFIED))
}

pub fn is_unspecified(net: &Ipv4Network) -> bool {
    net.prefix() == 0
}

/// Inclusive address range such as an `iprange` address, a VIP `extip` or an IP pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ipv4Range {
    pub start: Ipv4Addr,
    pub end: Ipv4Addr,
}

impl Ipv4Range {
    pub fn single(addr: Ipv4Addr) -> Self {
        Self {
            start: addr,
            end: addr,
        }
    }

    pub fn new(start: Ipv4Addr, end: Ipv4Addr) -> Result<Self, String> {
        if u32::from(start) > u32::from(end) {
            return Err(format!("range start {start} is above range end {end}"));
        }
        Ok(Self { start, end })
    }

    /// Parse `a.b.c.d` or `a.b.c.d-e.f.g.h`.
    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.split_once('-') {
            Some((start, end)) => Self::new(parse_addr(start.trim())?, parse_addr(end.trim())?),
            None => parse_addr(raw).map(Self::single),
        }
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let value = u32::from(addr);
        u32::from(self.start) <= value && value <= u32::from(self.end)
    }

    pub fn bounds(&self) -> (u32, u32) {
        (u32::from(self.start), u32::from(self.end))
    }

    /// Map `addr` (inside `self`) to the address at the same offset in `target`.
    ///
    /// Offsets past the end of `target` clamp to its last address.
    pub fn translate(&self, addr: Ipv4Addr, target: &Ipv4Range) -> Ipv4Addr {
        let offset = u32::from(addr).saturating_sub(u32::from(self.start));
        let (lo, hi) = target.bounds();
        Ipv4Addr::from(lo.saturating_add(offset).min(hi))
    }
}

impl Display for Ipv4Range {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Inclusive destination port range. Source-port qualifiers (`80:1024-65535`) are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct PortRange {
    pub low: u16,
    pub high: u16,
}

impl PortRange {
    pub fn single(port: u16) -> Self {
        Self {
            low: port,
            high: port,
        }
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        let dst = raw.split(':').next().unwrap_or(raw);
        let parse_port = |p: &str| {
            p.trim()
                .parse::<u16>()
                .map_err(|_| format!("`{raw}` is not a port range"))
        };
        let (low, high) = match dst.split_once('-') {
            Some((low, high)) => (parse_port(low)?, parse_port(high)?),
            None => {
                let port = parse_port(dst)?;
                (port, port)
            }
        };
        if low > high {
            return Err(format!("`{raw}` has its low port above its high port"));
        }
        Ok(Self { low, high })
    }

    pub fn contains(&self, port: u16) -> bool {
        self.low <= port && port <= self.high
    }

    /// Map `port` (inside `self`) to the same offset in `target`.
    pub fn translate(&self, port: u16, target: &PortRange) -> u16 {
        let offset = port.saturating_sub(self.low);
        target.low.saturating_add(offset).min(target.high)
    }
}

impl Display for PortRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.low == self.high {
            write!(f, "{}", self.low)
        } else {
            write!(f, "{}-{}", self.low, self.high)
        }
    }
}

/// Parse every token of a `tcp-portrange`-style setting.
pub fn parse_port_ranges(values: &[String]) -> Result<Vec<PortRange>, String> {
    values.iter().map(|v| PortRange::parse(v)).collect()
}

/// Sorted, merged list of inclusive `u32` intervals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntervalSet {
    ranges: Vec<(u32, u32)>,
}

impl IntervalSet {
    pub fn insert(&mut self, low: u32, high: u32) {
        self.ranges.push((low, high));
        self.ranges.sort_unstable();
        let mut merged: Vec<(u32, u32)> = Vec::with_capacity(self.ranges.len());
        for &(lo, hi) in &self.ranges {
            match merged.last_mut() {
                Some(last) if lo <= last.1.saturating_add(1) => last.1 = last.1.max(hi),
                _ => merged.push((lo, hi)),
            }
        }
        self.ranges = merged;
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// True when every interval of `other` lies inside this set.
    pub fn covers(&self, other: &IntervalSet) -> bool {
        other.ranges.iter().all(|&(lo, hi)| {
            self.ranges
                .iter()
                .any(|&(slo, shi)| slo <= lo && hi <= shi)
        })
    }
}

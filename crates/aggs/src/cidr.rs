//! IPv4 CIDR masks for ip_range aggregations

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::AggError;

/// An IPv4 network in CIDR notation (`10.0.0.0/8`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CidrMask {
    network: Ipv4Addr,
    prefix: u8,
}

impl CidrMask {
    /// Parse `a.b.c.d/n`; host bits are cleared
    pub fn parse(s: &str) -> Result<Self, AggError> {
        let invalid = || AggError::InvalidCidr(s.to_string());
        let (address, prefix) = s.trim().split_once('/').ok_or_else(invalid)?;
        let address: Ipv4Addr = address.parse().map_err(|_| invalid())?;
        let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
        if prefix > 32 {
            return Err(invalid());
        }

        let network = Ipv4Addr::from(u32::from(address) & Self::netmask(prefix));
        Ok(Self { network, prefix })
    }

    fn netmask(prefix: u8) -> u32 {
        if prefix == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(prefix))
        }
    }

    /// Prefix length
    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// First address of the network
    pub fn first(&self) -> Ipv4Addr {
        self.network
    }

    /// Last address of the network
    pub fn last(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.network) | !Self::netmask(self.prefix))
    }

    /// Range as `from` (inclusive) and `to` (exclusive)
    ///
    /// `to` is `None` when the network ends at 255.255.255.255.
    pub fn range(&self) -> (Ipv4Addr, Option<Ipv4Addr>) {
        let to = u32::from(self.last()).checked_add(1).map(Ipv4Addr::from);
        (self.first(), to)
    }

    /// Whether `address` is inside the network
    pub fn contains(&self, address: Ipv4Addr) -> bool {
        u32::from(address) & Self::netmask(self.prefix) == u32::from(self.network)
    }
}

impl FromStr for CidrMask {
    type Err = AggError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CidrMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

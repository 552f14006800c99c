//! CIDR ranges for the pre-authentication network check.
//!
//! Host bits in the configured range are ignored (`10.1.2.3/8` == `10.0.0.0/8`).
//! A bare address is a single-host range.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::error::{QuotaGateError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpRange {
    network: IpAddr,
    prefix: u8,
}

impl IpRange {
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.network, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = mask_u32(self.prefix);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = mask_u128(self.prefix);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            // v4-mapped v6 clients are matched against v4 ranges
            (IpAddr::V4(_), IpAddr::V6(ip)) => match ip.to_ipv4_mapped() {
                Some(v4) => self.contains(IpAddr::V4(v4)),
                None => false,
            },
            (IpAddr::V6(_), IpAddr::V4(_)) => false,
        }
    }
}

impl FromStr for IpRange {
    type Err = QuotaGateError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || QuotaGateError::InvalidInput(format!("invalid ip range: {s}"));

        let (addr_s, prefix_s) = match s.split_once('/') {
            Some((a, p)) => (a, Some(p)),
            None => (s, None),
        };
        let network: IpAddr = addr_s.parse().map_err(|_| invalid())?;
        let max = if network.is_ipv4() { 32 } else { 128 };
        let prefix = match prefix_s {
            Some(p) => p.parse::<u8>().map_err(|_| invalid())?,
            None => max,
        };
        if prefix > max {
            return Err(invalid());
        }
        Ok(Self { network, prefix })
    }
}

impl fmt::Display for IpRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

/// Parse every range, failing on the first invalid one.
pub fn compile_ranges(raw: &[String]) -> Result<Vec<IpRange>> {
    raw.iter().map(|s| s.parse()).collect()
}

pub fn find_match(ranges: &[IpRange], ip: IpAddr) -> Option<&IpRange> {
    ranges.iter().find(|r| r.contains(ip))
}

fn mask_u32(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

fn mask_u128(prefix: u8) -> u128 {
    if prefix == 0 {
        0
    } else {
        u128::MAX << (128 - u32::from(prefix))
    }
}

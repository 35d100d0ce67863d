// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Types shared by the local RIB and the components that feed it.
//!
//! Everything in here describes routing information that has already been
//! decoded and validated by the BGP codec: prefixes, the AFI/SAFI pair that
//! partitions routing state, NLRI with their optional Add-Path identifier,
//! and decoded path attribute sets. Nothing in this crate touches wire bytes.

mod attrs;

#[cfg(test)]
mod proptest;

pub use attrs::*;

use num_enum::TryFromPrimitive;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Formatter};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("unsupported address family: AFI={0} SAFI={1}")]
    UnsupportedFamily(u16, u8),
}

fn mask4(length: u8) -> u32 {
    match length {
        0 => 0,
        l => (!0u32) << (32 - u32::from(l.min(32))),
    }
}

fn mask6(length: u8) -> u128 {
    match length {
        0 => 0,
        l => (!0u128) << (128 - u32::from(l.min(128))),
    }
}

fn parse_prefix<A: FromStr>(s: &str) -> Result<(A, u8), String> {
    let (value, length) =
        s.split_once('/').ok_or("malformed prefix".to_string())?;
    Ok((
        value.parse().map_err(|_| "malformed ip addr".to_string())?,
        length.parse().map_err(|_| "malformed length".to_string())?,
    ))
}

#[derive(
    Debug,
    Copy,
    Clone,
    Serialize,
    Deserialize,
    Hash,
    Eq,
    PartialEq,
    PartialOrd,
    Ord,
    JsonSchema,
)]
pub struct Prefix4 {
    pub value: Ipv4Addr,
    pub length: u8,
}

impl Prefix4 {
    /// Create a new `Prefix4` with its host bits zeroed.
    /// ```
    /// use rib_types::Prefix4;
    /// use std::net::Ipv4Addr;
    /// let p4 = Prefix4::new(Ipv4Addr::new(10, 0, 0, 10), 24);
    /// assert_eq!(p4.value, Ipv4Addr::new(10, 0, 0, 0));
    /// ```
    pub fn new(ip: Ipv4Addr, length: u8) -> Self {
        Self {
            value: Ipv4Addr::from(u32::from(ip) & mask4(length)),
            length,
        }
    }

    pub fn host_bits_are_unset(&self) -> bool {
        let bits = u32::from(self.value);
        bits & mask4(self.length) == bits
    }

    /// True if this prefix is equal to or more specific than `other`.
    pub fn within(&self, other: &Prefix4) -> bool {
        if self.length < other.length {
            return false;
        }
        let mask = mask4(other.length);
        u32::from(self.value) & mask == u32::from(other.value) & mask
    }

    pub fn db_key(&self) -> Vec<u8> {
        let mut buf: Vec<u8> = self.value.octets().into();
        buf.push(self.length);
        buf
    }
}

impl fmt::Display for Prefix4 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.value, self.length)
    }
}

impl FromStr for Prefix4 {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (value, length) = parse_prefix(s)?;
        if length > 32 {
            return Err(format!("prefix length {length} exceeds 32"));
        }
        Ok(Self { value, length })
    }
}

#[derive(
    Debug,
    Copy,
    Clone,
    Serialize,
    Deserialize,
    Hash,
    Eq,
    PartialEq,
    PartialOrd,
    Ord,
    JsonSchema,
)]
pub struct Prefix6 {
    pub value: Ipv6Addr,
    pub length: u8,
}

impl Prefix6 {
    /// Create a new `Prefix6` with its host bits zeroed.
    pub fn new(ip: Ipv6Addr, length: u8) -> Self {
        Self {
            value: Ipv6Addr::from(u128::from(ip) & mask6(length)),
            length,
        }
    }

    pub fn host_bits_are_unset(&self) -> bool {
        let bits = u128::from(self.value);
        bits & mask6(self.length) == bits
    }

    /// True if this prefix is equal to or more specific than `other`.
    pub fn within(&self, other: &Prefix6) -> bool {
        if self.length < other.length {
            return false;
        }
        let mask = mask6(other.length);
        u128::from(self.value) & mask == u128::from(other.value) & mask
    }

    pub fn db_key(&self) -> Vec<u8> {
        let mut buf: Vec<u8> = self.value.octets().into();
        buf.push(self.length);
        buf
    }
}

impl fmt::Display for Prefix6 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.value, self.length)
    }
}

impl FromStr for Prefix6 {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (value, length) = parse_prefix(s)?;
        if length > 128 {
            return Err(format!("prefix length {length} exceeds 128"));
        }
        Ok(Self { value, length })
    }
}

#[derive(
    Debug,
    Copy,
    Clone,
    Serialize,
    Deserialize,
    Eq,
    Hash,
    PartialEq,
    JsonSchema,
    PartialOrd,
    Ord,
)]
pub enum Prefix {
    V4(Prefix4),
    V6(Prefix6),
}

impl Prefix {
    pub fn new(ip: IpAddr, length: u8) -> Self {
        match ip {
            IpAddr::V4(ip4) => Self::V4(Prefix4::new(ip4, length)),
            IpAddr::V6(ip6) => Self::V6(Prefix6::new(ip6, length)),
        }
    }

    pub fn length(&self) -> u8 {
        match self {
            Self::V4(p) => p.length,
            Self::V6(p) => p.length,
        }
    }

    pub fn addr(&self) -> IpAddr {
        match self {
            Self::V4(p) => p.value.into(),
            Self::V6(p) => p.value.into(),
        }
    }

    /// True if this prefix is equal to or more specific than `other`.
    /// Prefixes of different address families never contain each other.
    pub fn within(&self, other: &Prefix) -> bool {
        match (self, other) {
            (Prefix::V4(a), Prefix::V4(b)) => a.within(b),
            (Prefix::V6(a), Prefix::V6(b)) => a.within(b),
            _ => false,
        }
    }

    pub fn afi(&self) -> Afi {
        match self {
            Self::V4(_) => Afi::Ipv4,
            Self::V6(_) => Afi::Ipv6,
        }
    }

    pub fn db_key(&self) -> Vec<u8> {
        match self {
            Self::V4(p) => p.db_key(),
            Self::V6(p) => p.db_key(),
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Prefix::V4(p) => p.fmt(f),
            Prefix::V6(p) => p.fmt(f),
        }
    }
}

impl From<Prefix4> for Prefix {
    fn from(value: Prefix4) -> Self {
        Self::V4(value)
    }
}

impl From<Prefix6> for Prefix {
    fn from(value: Prefix6) -> Self {
        Self::V6(value)
    }
}

impl FromStr for Prefix {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(prefix4) = s.parse::<Prefix4>() {
            Ok(Self::V4(prefix4))
        } else if let Ok(prefix6) = s.parse::<Prefix6>() {
            Ok(Self::V6(prefix6))
        } else {
            Err("malformed prefix".to_string())
        }
    }
}

/// Address family identifier (RFC 4760).
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    TryFromPrimitive,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[repr(u16)]
pub enum Afi {
    Ipv4 = 1,
    Ipv6 = 2,
}

/// Subsequent address family identifier (RFC 4760).
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    TryFromPrimitive,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[repr(u8)]
pub enum Safi {
    Unicast = 1,
    Multicast = 2,
}

/// The AFI/SAFI pair that partitions every table in the local RIB.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    JsonSchema,
)]
pub struct ProtocolFamily {
    pub afi: Afi,
    pub safi: Safi,
}

impl ProtocolFamily {
    pub const IPV4_UNICAST: Self = Self {
        afi: Afi::Ipv4,
        safi: Safi::Unicast,
    };

    pub const IPV6_UNICAST: Self = Self {
        afi: Afi::Ipv6,
        safi: Safi::Unicast,
    };

    pub fn new(afi: Afi, safi: Safi) -> Self {
        Self { afi, safi }
    }

    /// Build a family from the raw AFI and SAFI codes carried in
    /// capabilities and multiprotocol attributes.
    pub fn from_codes(afi: u16, safi: u8) -> Result<Self, Error> {
        match (Afi::try_from(afi), Safi::try_from(safi)) {
            (Ok(afi), Ok(safi)) => Ok(Self { afi, safi }),
            _ => Err(Error::UnsupportedFamily(afi, safi)),
        }
    }

    /// The unicast family a prefix belongs to.
    pub fn unicast_for(prefix: &Prefix) -> Self {
        Self::new(prefix.afi(), Safi::Unicast)
    }

    /// Packed `AFI << 8 | SAFI` form.
    pub fn code(&self) -> u32 {
        (u32::from(self.afi as u16) << 8) | u32::from(self.safi as u8)
    }

    pub fn carries(&self, prefix: &Prefix) -> bool {
        self.afi == prefix.afi()
    }

    pub fn carries_addr(&self, addr: &IpAddr) -> bool {
        matches!(
            (self.afi, addr),
            (Afi::Ipv4, IpAddr::V4(_)) | (Afi::Ipv6, IpAddr::V6(_))
        )
    }
}

impl fmt::Display for ProtocolFamily {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let afi = match self.afi {
            Afi::Ipv4 => "ipv4",
            Afi::Ipv6 => "ipv6",
        };
        let safi = match self.safi {
            Safi::Unicast => "unicast",
            Safi::Multicast => "multicast",
        };
        write!(f, "{afi}-{safi}")
    }
}

/// A prefix as advertised or withdrawn in an update, along with its Add-Path
/// identifier (zero when Add-Path was not negotiated).
#[derive(
    Debug,
    Copy,
    Clone,
    Serialize,
    Deserialize,
    Eq,
    Hash,
    PartialEq,
    PartialOrd,
    Ord,
    JsonSchema,
)]
pub struct Nlri {
    pub prefix: Prefix,
    pub path_id: u32,
}

impl Nlri {
    pub fn new(prefix: Prefix) -> Self {
        Self { prefix, path_id: 0 }
    }

    pub fn with_path_id(prefix: Prefix, path_id: u32) -> Self {
        Self { prefix, path_id }
    }
}

impl From<Prefix> for Nlri {
    fn from(prefix: Prefix) -> Self {
        Self::new(prefix)
    }
}

impl fmt::Display for Nlri {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.path_id {
            0 => write!(f, "{}", self.prefix),
            id => write!(f, "{} path-id {}", self.prefix, id),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn family_codes() {
        assert_eq!(
            ProtocolFamily::from_codes(1, 1),
            Ok(ProtocolFamily::IPV4_UNICAST)
        );
        assert_eq!(
            ProtocolFamily::from_codes(2, 1),
            Ok(ProtocolFamily::IPV6_UNICAST)
        );
        assert_eq!(
            ProtocolFamily::from_codes(25, 70),
            Err(Error::UnsupportedFamily(25, 70))
        );
        assert_eq!(ProtocolFamily::IPV4_UNICAST.code(), 0x0101);
        assert_eq!(ProtocolFamily::IPV6_UNICAST.to_string(), "ipv6-unicast");
    }

    #[test]
    fn prefix_parse_and_contain() {
        let agg: Prefix = "10.0.0.0/16".parse().unwrap();
        let p: Prefix = "10.0.3.0/24".parse().unwrap();
        let other: Prefix = "10.1.0.0/24".parse().unwrap();
        let v6: Prefix = "2001:db8::/32".parse().unwrap();

        assert!(p.within(&agg));
        assert!(!agg.within(&p));
        assert!(!other.within(&agg));
        assert!(!v6.within(&agg));
        assert_eq!(v6.afi(), Afi::Ipv6);
        assert!("10.0.0.0/33".parse::<Prefix4>().is_err());
        assert_eq!(
            ProtocolFamily::unicast_for(&p),
            ProtocolFamily::IPV4_UNICAST
        );
    }

    #[test]
    fn nlri_display() {
        let p: Prefix = "10.0.0.0/24".parse().unwrap();
        assert_eq!(Nlri::new(p).to_string(), "10.0.0.0/24");
        assert_eq!(
            Nlri::with_path_id(p, 7).to_string(),
            "10.0.0.0/24 path-id 7"
        );
    }
}

//! Source address admission control.
//!
//! # Responsibilities
//! - Parse allow-list entries (literal IPv4/IPv6 addresses and CIDR ranges)
//! - Decide allow/deny for a caller's source address
//! - Emit one audit line per decision
//!
//! # Design Decisions
//! - The allow-list is parsed once and never mutated; no locking on lookup
//! - IPv4-mapped IPv6 sources are compared as IPv4
//! - Empty or unparsable source addresses are denied

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::observability::metrics;

/// Outcome of an admission check. Denial is a normal outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    Allow,
    Deny,
}

impl AdmissionDecision {
    pub fn is_allowed(self) -> bool {
        matches!(self, AdmissionDecision::Allow)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AdmissionDecision::Allow => "allow",
            AdmissionDecision::Deny => "deny",
        }
    }
}

/// Error returned for an allow-list entry that is neither an address nor a CIDR range.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid allow-list entry '{0}'")]
pub struct InvalidAllowEntry(pub String);

/// A single allow-list entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowEntry {
    /// Exact address match.
    Addr(IpAddr),
    /// Network range; `network` is stored with host bits cleared.
    Cidr { network: IpAddr, prefix: u8 },
}

impl AllowEntry {
    /// Returns true if `addr` is covered by this entry.
    pub fn contains(&self, addr: IpAddr) -> bool {
        match *self {
            AllowEntry::Addr(expected) => expected == addr,
            AllowEntry::Cidr { network, prefix } => match (network, addr) {
                (IpAddr::V4(net), IpAddr::V4(ip)) => {
                    let mask = v4_mask(prefix);
                    u32::from(ip) & mask == u32::from(net)
                }
                (IpAddr::V6(net), IpAddr::V6(ip)) => {
                    let mask = v6_mask(prefix);
                    u128::from(ip) & mask == u128::from(net)
                }
                _ => false,
            },
        }
    }
}

impl FromStr for AllowEntry {
    type Err = InvalidAllowEntry;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidAllowEntry(s.to_string());
        let s_trimmed = s.trim();

        let Some((addr, prefix)) = s_trimmed.split_once('/') else {
            let addr: IpAddr = s_trimmed.parse().map_err(|_| invalid())?;
            return Ok(AllowEntry::Addr(addr.to_canonical()));
        };

        let addr: IpAddr = addr.parse().map_err(|_| invalid())?;
        let prefix: u8 = prefix.parse().map_err(|_| invalid())?;

        let network = match addr.to_canonical() {
            IpAddr::V4(ip) if prefix <= 32 => IpAddr::V4((u32::from(ip) & v4_mask(prefix)).into()),
            IpAddr::V6(ip) if prefix <= 128 => IpAddr::V6((u128::from(ip) & v6_mask(prefix)).into()),
            _ => return Err(invalid()),
        };

        Ok(AllowEntry::Cidr { network, prefix })
    }
}

impl fmt::Display for AllowEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllowEntry::Addr(addr) => write!(f, "{}", addr),
            AllowEntry::Cidr { network, prefix } => write!(f, "{}/{}", network, prefix),
        }
    }
}

fn v4_mask(prefix: u8) -> u32 {
    u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0)
}

fn v6_mask(prefix: u8) -> u128 {
    u128::MAX.checked_shl(128 - u32::from(prefix)).unwrap_or(0)
}

/// Evaluates caller source addresses against a fixed allow-list.
#[derive(Debug, Clone, Default)]
pub struct AdmissionGuard {
    entries: Vec<AllowEntry>,
}

impl AdmissionGuard {
    pub fn new(entries: Vec<AllowEntry>) -> Self {
        Self { entries }
    }

    /// Parse every entry; fails on the first invalid one.
    pub fn from_config<S: AsRef<str>>(allow_list: &[S]) -> Result<Self, InvalidAllowEntry> {
        let entries = allow_list
            .iter()
            .map(|entry| entry.as_ref().parse())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(entries))
    }

    /// Decide on a source address as reported by the transport.
    pub fn admit(&self, source: &str) -> AdmissionDecision {
        let decision = match source.trim().parse::<IpAddr>() {
            Ok(addr) => self.decide(addr),
            Err(_) => AdmissionDecision::Deny,
        };
        audit(source, decision);
        decision
    }

    fn decide(&self, addr: IpAddr) -> AdmissionDecision {
        let addr = addr.to_canonical();
        if self.entries.iter().any(|entry| entry.contains(addr)) {
            AdmissionDecision::Allow
        } else {
            AdmissionDecision::Deny
        }
    }
}

fn audit(source: &str, decision: AdmissionDecision) {
    match decision {
        AdmissionDecision::Allow => tracing::debug!(source = %source, decision = "allow", "Admission decision"),
        AdmissionDecision::Deny => tracing::warn!(source = %source, decision = "deny", "Source not on allow-list"),
    }
    metrics::record_admission(decision.as_str());
}

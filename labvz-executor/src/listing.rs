//! Parsing of the live VM listing.
//!
//! Expects the `ctid status ip hostname` column layout requested by
//! [`crate::vzctl::LISTING_ARGS`]. A VM with several addresses prints them all
//! in the ip column, so every token between the status and the last column is
//! treated as an address.

use std::collections::HashSet;
use std::fmt;
use std::net::Ipv4Addr;

use labvz_core::VmId;
use serde::Serialize;

/// Status word reported by the listing tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub enum VmStatus {
    Running,
    Stopped,
    Mounted,
    Suspended,
    /// Any status word not listed above, kept verbatim.
    Other(String),
}

impl VmStatus {
    fn parse(word: &str) -> Self {
        match word {
            "running" => Self::Running,
            "stopped" => Self::Stopped,
            "mounted" => Self::Mounted,
            "suspended" => Self::Suspended,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for VmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => f.write_str("running"),
            Self::Stopped => f.write_str("stopped"),
            Self::Mounted => f.write_str("mounted"),
            Self::Suspended => f.write_str("suspended"),
            Self::Other(word) => f.write_str(word),
        }
    }
}

/// One row of the listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct ListingEntry {
    /// Raw container id. Ids at or below 100 can exist on a host even though
    /// this crate never creates them, and their addresses still count as used.
    pub ctid: u32,
    pub status: VmStatus,
    pub addresses: Vec<Ipv4Addr>,
    pub hostname: Option<String>,
}

impl ListingEntry {
    /// First assigned address, if any.
    #[must_use]
    pub fn address(&self) -> Option<Ipv4Addr> {
        self.addresses.first().copied()
    }

    /// Whether the listing reports the VM as running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status == VmStatus::Running
    }

    fn parse(line: &str) -> Option<Self> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let (ctid, status, rest) = match tokens.as_slice() {
            [ctid, status, rest @ ..] if !rest.is_empty() => (*ctid, *status, rest),
            _ => return None,
        };
        // Header lines and named containers have a non-numeric first column.
        let ctid: u32 = ctid.parse().ok()?;

        let (address_columns, hostname) = match rest {
            [only] => (std::slice::from_ref(only), None),
            [addresses @ .., hostname] => (addresses, Some(*hostname)),
            [] => return None,
        };

        Some(Self {
            ctid,
            status: VmStatus::parse(status),
            addresses: address_columns.iter().filter_map(|a| a.parse().ok()).collect(),
            hostname: hostname.filter(|h| *h != "-").map(str::to_owned),
        })
    }
}

/// Point-in-time snapshot of every VM on the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Listing {
    entries: Vec<ListingEntry>,
}

impl Listing {
    /// Parse the listing tool's output, skipping lines that are not VM rows.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| {
                let entry = ListingEntry::parse(line);
                if entry.is_none() {
                    tracing::debug!(line, "skipping unparseable listing row");
                }
                entry
            })
            .collect();
        Self { entries }
    }

    /// All rows, in listing order.
    #[must_use]
    pub fn entries(&self) -> &[ListingEntry] {
        &self.entries
    }

    /// Row for the given VM.
    #[must_use]
    pub fn find(&self, id: VmId) -> Option<&ListingEntry> {
        self.entries.iter().find(|entry| entry.ctid == id.get())
    }

    /// Whether the VM exists on the host.
    #[must_use]
    pub fn contains(&self, id: VmId) -> bool {
        self.find(id).is_some()
    }

    /// Every address held by any listed VM.
    #[must_use]
    pub fn used_addresses(&self) -> HashSet<Ipv4Addr> {
        self.entries
            .iter()
            .flat_map(|entry| entry.addresses.iter().copied())
            .collect()
    }
}

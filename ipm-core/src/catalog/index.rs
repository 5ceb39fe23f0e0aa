//! Remote catalog parsing and lookup
//!
//! The catalog (Verified_IPs.json) maps each category to the IPs published
//! under it, each with its full release history.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::lock::check_ip_name;
use super::types::{Category, Dimension, Technology};
use super::version::newest_index;
use crate::error::{IpmError, IpmResult};

/// One published release of an IP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReleaseEntry {
    /// Version string
    pub version: String,

    /// Release timestamp (ISO-8601)
    pub date: String,
}

/// A catalog entry for one IP on one technology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IpDescriptor {
    /// IP name, unique within a technology
    pub name: String,

    /// Source repository (e.g. "github.com/efabless/EF_UART")
    pub repo: String,

    pub author: String,

    pub email: String,

    /// IP type (hard, soft, ...)
    #[serde(rename = "type")]
    pub ip_type: String,

    pub category: Category,

    pub status: String,

    pub width: Dimension,

    pub height: Dimension,

    pub technology: Technology,

    /// Releases in publication order, oldest first
    pub release: Vec<ReleaseEntry>,
}

impl IpDescriptor {
    /// The newest release by version ordering
    ///
    /// Does not assume `release` is sorted.
    pub fn latest_release(&self) -> IpmResult<&ReleaseEntry> {
        let idx = newest_index(self.release.iter().map(|r| r.version.as_str()))?;
        idx.map(|i| &self.release[i])
            .ok_or_else(|| IpmError::UnknownVersion {
                name: self.name.clone(),
                version: "latest".to_string(),
            })
    }

    /// Look up a release by its exact version string
    pub fn release(&self, version: &str) -> Option<&ReleaseEntry> {
        self.release.iter().find(|r| r.version == version)
    }

    /// Version strings in publication order
    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.release.iter().map(|r| r.version.as_str())
    }
}

/// Snapshot of the remote catalog
///
/// Built whole from one fetch and never patched afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogStore {
    entries: IndexMap<Category, Vec<IpDescriptor>>,
}

impl CatalogStore {
    /// Parse and validate a catalog document
    ///
    /// `source` names where the bytes came from and is only used in errors.
    pub fn from_json(source: &str, bytes: &[u8]) -> IpmResult<Self> {
        let malformed = |reason: String| IpmError::CatalogMalformed {
            url: source.to_string(),
            reason,
        };

        let store: CatalogStore =
            serde_json::from_slice(bytes).map_err(|e| malformed(e.to_string()))?;

        for descriptor in store.iter() {
            check_ip_name(&descriptor.name).map_err(malformed)?;
            if descriptor.release.is_empty() {
                return Err(malformed(format!(
                    "IP '{}' ({}) has no releases",
                    descriptor.name, descriptor.technology
                )));
            }
        }

        Ok(store)
    }

    /// First descriptor matching both name and technology
    ///
    /// Categories are scanned in document order; if the same IP appears
    /// under more than one category the first one wins.
    pub fn find_descriptor(&self, name: &str, technology: Technology) -> Option<&IpDescriptor> {
        self.iter()
            .find(|d| d.name == name && d.technology == technology)
    }

    /// Every descriptor with the given name, across technologies
    pub fn find_by_name<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a IpDescriptor> {
        self.iter().filter(move |d| d.name == name)
    }

    /// All descriptors in document order
    pub fn iter(&self) -> impl Iterator<Item = &IpDescriptor> {
        self.entries.values().flatten()
    }

    /// Descriptors grouped by category, with optional filters
    pub fn list(
        &self,
        category: Option<Category>,
        technology: Option<Technology>,
    ) -> Vec<(Category, &IpDescriptor)> {
        self.entries
            .iter()
            .filter(|(cat, _)| category.map_or(true, |c| c == **cat))
            .flat_map(|(cat, ips)| ips.iter().map(move |ip| (*cat, ip)))
            .filter(|(_, ip)| technology.map_or(true, |t| t == ip.technology))
            .collect()
    }

    /// Total number of catalog entries
    pub fn ip_count(&self) -> usize {
        self.entries.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ip_count() == 0
    }
}


#[cfg(test)]
pub(crate) use index_tests::sample_catalog_json;

//! Installed IP records (Installed_IPs.json)
//!
//! Tracks which IPs are installed, at which version and under which root.
//! The registry is the only source of truth for what is installed.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

use super::index::{IpDescriptor, ReleaseEntry};
use super::types::{Category, Dimension, Technology};
use crate::error::{IpmError, IpmResult};

/// Timestamp format used in registry records
pub const ISO8601_FMT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Format a timestamp the way registry records store it
pub fn date_to_iso8601(date: DateTime<Utc>) -> String {
    date.format(ISO8601_FMT).to_string()
}

/// An IP installed at one version under one root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstalledIpRecord {
    pub name: String,

    pub repo: String,

    pub author: String,

    pub email: String,

    #[serde(rename = "type")]
    pub ip_type: String,

    pub category: Category,

    pub status: String,

    pub width: Dimension,

    pub height: Dimension,

    pub technology: Technology,

    /// Pinned version
    pub version: String,

    /// When the IP was installed
    pub date: String,

    /// Directory the IP was installed under
    pub ip_root: PathBuf,
}

impl InstalledIpRecord {
    /// Build the record that installing `release` of `descriptor` produces
    pub fn from_descriptor(
        descriptor: &IpDescriptor,
        release: &ReleaseEntry,
        ip_root: &Path,
        installed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: descriptor.name.clone(),
            repo: descriptor.repo.clone(),
            author: descriptor.author.clone(),
            email: descriptor.email.clone(),
            ip_type: descriptor.ip_type.clone(),
            category: descriptor.category,
            status: descriptor.status.clone(),
            width: descriptor.width.clone(),
            height: descriptor.height.clone(),
            technology: descriptor.technology,
            version: release.version.clone(),
            date: date_to_iso8601(installed_at),
            ip_root: ip_root.to_path_buf(),
        }
    }

    /// Whether this record sits at the given coordinates
    pub fn matches(&self, name: &str, technology: Technology, ip_root: &Path) -> bool {
        self.name == name && self.technology == technology && self.ip_root == ip_root
    }

    /// Directory holding this IP's files
    pub fn install_path(&self) -> PathBuf {
        install_path(&self.ip_root, self.technology, &self.name)
    }
}

/// Directory an IP is placed in: `<ip_root>/<technology>/<name>`
pub fn install_path(ip_root: &Path, technology: Technology, name: &str) -> PathBuf {
    ip_root.join(technology.as_str()).join(name)
}

/// Check that an IP name is usable as a single directory name
///
/// Names land in [`install_path`], so anything that could step outside
/// `<ip_root>/<technology>` is rejected.
pub fn check_ip_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("an IP entry has an empty name".to_string());
    }
    let mut components = Path::new(name).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(c)), None) if c == name
    );
    if !single || name.contains(['/', '\\']) {
        return Err(format!("IP name '{name}' is not a plain directory name"));
    }
    Ok(())
}

/// Installed IPs grouped by category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalRegistry {
    entries: IndexMap<Category, Vec<InstalledIpRecord>>,
}

impl LocalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a registry document
    pub fn from_json(path: &Path, bytes: &[u8]) -> IpmResult<Self> {
        let corrupt = |reason: String| IpmError::RegistryCorrupt {
            path: path.to_path_buf(),
            reason,
        };

        let registry: LocalRegistry =
            serde_json::from_slice(bytes).map_err(|e| corrupt(e.to_string()))?;
        for record in registry.iter() {
            check_ip_name(&record.name).map_err(corrupt)?;
        }
        Ok(registry)
    }

    /// Serialize to pretty JSON
    ///
    /// Only fails for an `ip_root` that is not valid UTF-8.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    /// Exact match on name, technology and root
    pub fn find_record(
        &self,
        name: &str,
        technology: Technology,
        ip_root: &Path,
    ) -> Option<&InstalledIpRecord> {
        self.iter().find(|r| r.matches(name, technology, ip_root))
    }

    /// Every record for an IP, across roots
    pub fn find_all<'a>(
        &'a self,
        name: &'a str,
        technology: Technology,
    ) -> impl Iterator<Item = &'a InstalledIpRecord> {
        self.iter()
            .filter(move |r| r.name == name && r.technology == technology)
    }

    /// Add a record, replacing any record at the same coordinates
    ///
    /// Returns the replaced record.
    pub fn upsert(&mut self, record: InstalledIpRecord) -> Option<InstalledIpRecord> {
        let previous = self.remove(&record.name, record.technology, &record.ip_root);
        self.entries.entry(record.category).or_default().push(record);
        previous
    }

    /// Remove the record at the given coordinates
    pub fn remove(
        &mut self,
        name: &str,
        technology: Technology,
        ip_root: &Path,
    ) -> Option<InstalledIpRecord> {
        let mut removed = None;
        for records in self.entries.values_mut() {
            if let Some(pos) = records
                .iter()
                .position(|r| r.matches(name, technology, ip_root))
            {
                removed = Some(records.remove(pos));
                break;
            }
        }
        self.entries.retain(|_, records| !records.is_empty());
        removed
    }

    /// All records in file order
    pub fn iter(&self) -> impl Iterator<Item = &InstalledIpRecord> {
        self.entries.values().flatten()
    }

    /// Records grouped by category, with optional filters
    pub fn list(
        &self,
        category: Option<Category>,
        technology: Option<Technology>,
    ) -> Vec<&InstalledIpRecord> {
        self.entries
            .iter()
            .filter(|(cat, _)| category.map_or(true, |c| c == **cat))
            .flat_map(|(_, records)| records.iter())
            .filter(|r| technology.map_or(true, |t| t == r.technology))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

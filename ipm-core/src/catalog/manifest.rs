//! Installing a set of IPs from a manifest file
//!
//! A manifest uses the registry file layout, so an `Installed_IPs.json` from
//! one workspace reproduces the same IP versions in another.

use std::path::{Path, PathBuf};

use super::index::CatalogStore;
use super::installer::PayloadInstaller;
use super::lock::LocalRegistry;
use super::planner::{InstallOutcome, InstallPlanner, InstallRequest};
use super::store::RegistryStorage;
use super::types::Technology;
use crate::error::{IpmError, IpmResult};

/// One IP pinned by a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub name: String,
    pub technology: Technology,
    pub version: String,
}

/// Read the pinned IPs from a manifest file
pub fn load_manifest(path: &Path) -> IpmResult<Vec<ManifestEntry>> {
    let bytes = std::fs::read(path).map_err(|e| IpmError::filesystem(path, e))?;
    let manifest = LocalRegistry::from_json(path, &bytes)?;
    Ok(manifest
        .iter()
        .map(|r| ManifestEntry {
            name: r.name.clone(),
            technology: r.technology,
            version: r.version.clone(),
        })
        .collect())
}

/// Install every manifest entry into `ip_root`
///
/// Entries are processed one after another and each gets its own result.
pub async fn install_manifest<I: PayloadInstaller, S: RegistryStorage>(
    planner: &InstallPlanner<I, S>,
    entries: &[ManifestEntry],
    ip_root: &Path,
    overwrite: bool,
    catalog: &CatalogStore,
    registry: &mut LocalRegistry,
) -> Vec<(ManifestEntry, IpmResult<InstallOutcome>)> {
    let mut results = Vec::with_capacity(entries.len());
    for entry in entries {
        let request = InstallRequest {
            name: entry.name.clone(),
            technology: entry.technology,
            version: Some(entry.version.clone()),
            overwrite,
            ip_root: PathBuf::from(ip_root),
        };
        let result = planner.install(&request, catalog, registry).await;
        if let Err(e) = &result {
            tracing::warn!("Failed to install {} {}: {}", entry.name, entry.version, e);
        }
        results.push((entry.clone(), result));
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_manifest() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("manifest.json");
        std::fs::write(
            &path,
            r#"{
  "comm": [
    {
      "name": "EF_UART", "repo": "github.com/efabless/EF_UART",
      "author": "Efabless", "email": "ip@efabless.com", "type": "soft",
      "category": "comm", "status": "verified", "width": "0.2", "height": "0.1",
      "technology": "sky130", "version": "1.2.0",
      "date": "2024-01-01T00:00:00Z", "ip_root": "/somewhere/else"
    }
  ]
}"#,
        )
        .unwrap();

        let entries = load_manifest(&path).unwrap();
        assert_eq!(
            entries,
            vec![ManifestEntry {
                name: "EF_UART".to_string(),
                technology: Technology::Sky130,
                version: "1.2.0".to_string(),
            }]
        );
    }

    #[test]
    fn test_missing_manifest() {
        let err = load_manifest(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, IpmError::FilesystemError { .. }));
    }
}

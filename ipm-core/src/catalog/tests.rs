//! Cross-component tests for the catalog module
//!
//! Exercise the planner and update checker against in-memory collaborators so
//! failures can be injected at each step.

#[cfg(test)]
mod integration_tests {
    use crate::catalog::index::sample_catalog_json;
    use crate::catalog::{
        CatalogStore, CheckTarget, InstallOutcome, InstallPlanner, InstallRequest, LocalRegistry,
        PayloadInstaller, RegistryService, RegistryStorage, Technology, UpdateChecker,
        UpdateStatus,
    };
    use crate::error::{IpmError, IpmResult};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    /// Registry storage kept in memory, with an optional write failure
    #[derive(Default, Clone)]
    struct MemoryStorage {
        files: Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>,
        fail_writes: Arc<AtomicBool>,
    }

    #[async_trait]
    impl RegistryStorage for MemoryStorage {
        async fn read_file(&self, path: &Path) -> IpmResult<Option<Vec<u8>>> {
            Ok(self.files.lock().unwrap().get(path).cloned())
        }

        async fn write_file_atomic(&self, path: &Path, bytes: &[u8]) -> IpmResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(IpmError::filesystem(
                    path,
                    std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
                ));
            }
            self.files
                .lock()
                .unwrap()
                .insert(path.to_path_buf(), bytes.to_vec());
            Ok(())
        }
    }

    /// Records every payload operation; URLs in `failing` fail to download
    #[derive(Default, Clone)]
    struct RecordingInstaller {
        downloads: Arc<Mutex<Vec<(String, PathBuf)>>>,
        removals: Arc<Mutex<Vec<PathBuf>>>,
        failing: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingInstaller {
        fn fail_on(&self, url: &str) {
            self.failing.lock().unwrap().push(url.to_string());
        }

        fn download_count(&self) -> usize {
            self.downloads.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl PayloadInstaller for RecordingInstaller {
        async fn download_and_extract(&self, url: &str, dest: &Path) -> IpmResult<()> {
            if self.failing.lock().unwrap().iter().any(|u| u == url) {
                return Err(IpmError::DownloadFailed {
                    url: url.to_string(),
                    reason: "HTTP 404 Not Found".to_string(),
                });
            }
            self.downloads
                .lock()
                .unwrap()
                .push((url.to_string(), dest.to_path_buf()));
            Ok(())
        }

        async fn remove_directory(&self, path: &Path) -> IpmResult<()> {
            self.removals.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }
    }

    const REGISTRY: &str = "/home/ipm/Installed_IPs.json";

    fn setup() -> (
        InstallPlanner<RecordingInstaller, MemoryStorage>,
        RecordingInstaller,
        MemoryStorage,
        CatalogStore,
    ) {
        let installer = RecordingInstaller::default();
        let storage = MemoryStorage::default();
        let planner = InstallPlanner::new(
            installer.clone(),
            RegistryService::new(storage.clone(), REGISTRY),
        );
        let catalog = CatalogStore::from_json("test", sample_catalog_json().as_bytes()).unwrap();
        (planner, installer, storage, catalog)
    }

    async fn persisted(
        planner: &InstallPlanner<RecordingInstaller, MemoryStorage>,
    ) -> LocalRegistry {
        planner.registry_service().load().await.unwrap()
    }

    #[tokio::test]
    async fn test_install_commits_record_after_payload() {
        let (planner, installer, _storage, catalog) = setup();
        let mut registry = LocalRegistry::new();

        let request = InstallRequest::new("EF_UART", Technology::Sky130, "/ips");
        let outcome = planner.install(&request, &catalog, &mut registry).await.unwrap();

        let InstallOutcome::Installed { record, previous } = outcome else {
            panic!("expected a fresh install");
        };
        assert_eq!(record.version, "1.10.0");
        assert!(previous.is_none());
        assert_eq!(
            installer.downloads.lock().unwrap()[0],
            (
                "https://github.com/efabless/EF_UART/releases/download/1.10.0/1.10.0.tar.gz"
                    .to_string(),
                PathBuf::from("/ips/sky130/EF_UART")
            )
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(persisted(&planner).await, registry);
    }

    #[tokio::test]
    async fn test_reinstall_same_version_skips_download() {
        let (planner, installer, _storage, catalog) = setup();
        let mut registry = LocalRegistry::new();
        let request = InstallRequest::new("EF_UART", Technology::Sky130, "/ips").version("1.2.0");

        planner.install(&request, &catalog, &mut registry).await.unwrap();
        let outcome = planner.install(&request, &catalog, &mut registry).await.unwrap();

        assert!(matches!(outcome, InstallOutcome::AlreadyInstalled(r) if r.version == "1.2.0"));
        assert_eq!(installer.download_count(), 1);
    }

    #[tokio::test]
    async fn test_overwrite_keeps_single_record() {
        let (planner, installer, _storage, catalog) = setup();
        let mut registry = LocalRegistry::new();
        let request = InstallRequest::new("EF_UART", Technology::Sky130, "/ips").version("1.2.0");

        planner.install(&request, &catalog, &mut registry).await.unwrap();
        let outcome = planner
            .install(&request.clone().overwrite(true), &catalog, &mut registry)
            .await
            .unwrap();

        assert!(matches!(outcome, InstallOutcome::Installed { previous: Some(_), .. }));
        assert_eq!(installer.download_count(), 2);
        assert_eq!(registry.find_all("EF_UART", Technology::Sky130).count(), 1);
        assert_eq!(persisted(&planner).await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_download_leaves_registry_untouched() {
        let (planner, installer, _storage, catalog) = setup();
        let mut registry = LocalRegistry::new();
        planner
            .install(
                &InstallRequest::new("EF_UART", Technology::Sky130, "/ips").version("1.0.0"),
                &catalog,
                &mut registry,
            )
            .await
            .unwrap();
        let before = registry.clone();

        installer.fail_on(
            "https://github.com/efabless/EF_UART/releases/download/1.10.0/1.10.0.tar.gz",
        );
        let err = planner
            .install(
                &InstallRequest::new("EF_UART", Technology::Sky130, "/ips"),
                &catalog,
                &mut registry,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, IpmError::DownloadFailed { .. }));
        assert_eq!(registry, before);
        assert_eq!(persisted(&planner).await, before);
    }

    #[tokio::test]
    async fn test_failed_save_leaves_memory_untouched() {
        let (planner, _installer, storage, catalog) = setup();
        let mut registry = LocalRegistry::new();

        storage.fail_writes.store(true, Ordering::SeqCst);
        let err = planner
            .install(
                &InstallRequest::new("EF_UART", Technology::Sky130, "/ips"),
                &catalog,
                &mut registry,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, IpmError::FilesystemError { .. }));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_uninstall_removes_files_then_record() {
        let (planner, installer, _storage, catalog) = setup();
        let mut registry = LocalRegistry::new();
        planner
            .install(
                &InstallRequest::new("EF_UART", Technology::Sky130, "/ips"),
                &catalog,
                &mut registry,
            )
            .await
            .unwrap();

        let removed = planner
            .uninstall("EF_UART", Technology::Sky130, Path::new("/ips"), &mut registry)
            .await
            .unwrap();

        assert_eq!(removed.version, "1.10.0");
        assert_eq!(
            *installer.removals.lock().unwrap(),
            vec![PathBuf::from("/ips/sky130/EF_UART")]
        );
        assert!(registry.is_empty());
        assert!(persisted(&planner).await.is_empty());
    }

    #[tokio::test]
    async fn test_uninstall_other_root_is_not_installed() {
        let (planner, installer, _storage, catalog) = setup();
        let mut registry = LocalRegistry::new();
        planner
            .install(
                &InstallRequest::new("EF_UART", Technology::Sky130, "/ips"),
                &catalog,
                &mut registry,
            )
            .await
            .unwrap();

        let err = planner
            .uninstall("EF_UART", Technology::Sky130, Path::new("/other"), &mut registry)
            .await
            .unwrap_err();

        assert!(matches!(err, IpmError::NotInstalled { ip_root: Some(_), .. }));
        assert!(installer.removals.lock().unwrap().is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_check_without_update_changes_nothing() {
        let (planner, installer, _storage, catalog) = setup();
        let mut registry = LocalRegistry::new();
        planner
            .install(
                &InstallRequest::new("EF_UART", Technology::Sky130, "/ips").version("1.0.0"),
                &catalog,
                &mut registry,
            )
            .await
            .unwrap();
        let before = registry.clone();

        let report = UpdateChecker::new(&planner)
            .check(&CheckTarget::AllInstalled, &mut registry, &catalog, false)
            .await
            .unwrap();

        assert_eq!(report.entries.len(), 1);
        assert!(matches!(
            &report.entries[0].result,
            Ok(UpdateStatus::UpdateAvailable { latest, .. }) if latest == "1.10.0"
        ));
        assert_eq!(installer.download_count(), 1);
        assert_eq!(registry, before);
    }

    #[tokio::test]
    async fn test_update_installs_latest_in_same_root() {
        let (planner, _installer, _storage, catalog) = setup();
        let mut registry = LocalRegistry::new();
        for root in ["/ips", "/other"] {
            planner
                .install(
                    &InstallRequest::new("EF_UART", Technology::Sky130, root).version("1.0.0"),
                    &catalog,
                    &mut registry,
                )
                .await
                .unwrap();
        }

        let target = CheckTarget::Ip {
            name: "EF_UART".to_string(),
            technology: Technology::Sky130,
        };
        let report = UpdateChecker::new(&planner)
            .check(&target, &mut registry, &catalog, true)
            .await
            .unwrap();

        assert_eq!(report.updated_count(), 2);
        for root in ["/ips", "/other"] {
            let record = registry
                .find_record("EF_UART", Technology::Sky130, Path::new(root))
                .unwrap();
            assert_eq!(record.version, "1.10.0");
        }
        assert_eq!(persisted(&planner).await, registry);
    }

    #[tokio::test]
    async fn test_check_uninstalled_ip() {
        let (planner, _installer, _storage, catalog) = setup();
        let mut registry = LocalRegistry::new();
        let target = CheckTarget::Ip {
            name: "EF_UART".to_string(),
            technology: Technology::Sky130,
        };

        let err = UpdateChecker::new(&planner)
            .check(&target, &mut registry, &catalog, false)
            .await
            .unwrap_err();
        assert!(matches!(err, IpmError::NotInstalled { ip_root: None, .. }));

        let report = UpdateChecker::new(&planner)
            .check(&CheckTarget::AllInstalled, &mut registry, &catalog, false)
            .await
            .unwrap();
        assert!(report.entries.is_empty());
    }
}

//! Test helpers shared by the integration tests
//!
//! Collaborators here touch the real filesystem under a temp directory but
//! never the network.

#![allow(dead_code)]

use async_trait::async_trait;
use ipm_core::catalog::{
    CatalogService, CatalogStore, FsStorage, HttpClient, InstallPlanner, PayloadInstaller,
    RegistryService,
};
use ipm_core::{IpmError, IpmResult};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Once};
use tempfile::TempDir;

/// Initialize logging for tests (only once per test run)
static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

pub const CATALOG_URL: &str = "https://catalog.test/Verified_IPs.json";

/// A catalog with three IPs across three categories
pub const CATALOG_JSON: &str = r#"{
  "digital": [
    {
      "name": "EF_GPIO8",
      "repo": "github.com/efabless/EF_GPIO8",
      "author": "Efabless",
      "email": "ip@efabless.com",
      "type": "soft",
      "category": "digital",
      "status": "verified",
      "width": "0.12",
      "height": "0.1",
      "technology": "sky130",
      "release": [
        { "version": "1.0.0", "date": "2023-11-02T10:00:00Z" },
        { "version": "1.1.0", "date": "2024-02-14T10:00:00Z" }
      ]
    }
  ],
  "comm": [
    {
      "name": "EF_UART",
      "repo": "https://github.com/efabless/EF_UART.git",
      "author": "Efabless",
      "email": "ip@efabless.com",
      "type": "soft",
      "category": "comm",
      "status": "verified",
      "width": "0.2",
      "height": "0.1",
      "technology": "sky130",
      "release": [
        { "version": "1.0.0", "date": "2023-10-01T10:00:00Z" },
        { "version": "1.0.9", "date": "2023-12-01T10:00:00Z" },
        { "version": "1.0.10", "date": "2024-03-01T10:00:00Z" }
      ]
    }
  ],
  "analog": [
    {
      "name": "sky130_ef_ip__adc3v_12bit",
      "repo": "github.com/efabless/sky130_ef_ip__adc3v_12bit",
      "author": "Efabless",
      "email": "ip@efabless.com",
      "type": "hard",
      "category": "analog",
      "status": "verified",
      "width": 0.35,
      "height": 0.4,
      "technology": "sky130",
      "release": [
        { "version": "0.1", "date": "2024-01-20T10:00:00Z" }
      ]
    }
  ]
}"#;

/// Catalog parsed from [`CATALOG_JSON`]
pub fn sample_catalog() -> CatalogStore {
    CatalogStore::from_json(CATALOG_URL, CATALOG_JSON.as_bytes()).unwrap()
}

/// Serves fixed bodies by URL
#[derive(Default)]
pub struct StaticHttpClient {
    bodies: HashMap<String, Vec<u8>>,
}

impl StaticHttpClient {
    pub fn with(mut self, url: &str, body: &str) -> Self {
        self.bodies.insert(url.to_string(), body.as_bytes().to_vec());
        self
    }
}

#[async_trait]
impl HttpClient for StaticHttpClient {
    async fn get(&self, url: &str) -> IpmResult<Vec<u8>> {
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| IpmError::CatalogUnavailable {
                url: url.to_string(),
                reason: "HTTP 404 Not Found".to_string(),
            })
    }
}

pub fn catalog_service() -> CatalogService<StaticHttpClient> {
    CatalogService::new(
        StaticHttpClient::default().with(CATALOG_URL, CATALOG_JSON),
        CATALOG_URL,
    )
}

/// Writes a `VERSION` file into the destination instead of unpacking a
/// tarball; URLs registered with [`DirInstaller::fail_on`] fail to download
#[derive(Default, Clone)]
pub struct DirInstaller {
    failing: Arc<Mutex<HashSet<String>>>,
}

impl DirInstaller {
    pub fn fail_on(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }
}

#[async_trait]
impl PayloadInstaller for DirInstaller {
    async fn download_and_extract(&self, url: &str, dest: &Path) -> IpmResult<()> {
        if self.failing.lock().unwrap().contains(url) {
            return Err(IpmError::DownloadFailed {
                url: url.to_string(),
                reason: "HTTP 404 Not Found".to_string(),
            });
        }
        if dest.exists() {
            std::fs::remove_dir_all(dest).map_err(|e| IpmError::filesystem(dest, e))?;
        }
        std::fs::create_dir_all(dest).map_err(|e| IpmError::filesystem(dest, e))?;
        std::fs::write(dest.join("VERSION"), url).map_err(|e| IpmError::filesystem(dest, e))
    }

    async fn remove_directory(&self, path: &Path) -> IpmResult<()> {
        match std::fs::remove_dir_all(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(IpmError::filesystem(path, e)),
        }
    }
}

/// A temporary ipm home with its IP root and registry file
pub struct TestWorkspace {
    pub temp_dir: TempDir,
    pub ip_root: PathBuf,
    pub registry_path: PathBuf,
    pub installer: DirInstaller,
}

impl TestWorkspace {
    pub fn new() -> Self {
        init_test_logging();
        let temp_dir = TempDir::new().unwrap();
        let ip_root = temp_dir.path().join("ips");
        let registry_path = temp_dir.path().join("home").join("Installed_IPs.json");
        Self {
            temp_dir,
            ip_root,
            registry_path,
            installer: DirInstaller::default(),
        }
    }

    pub fn planner(&self) -> InstallPlanner<DirInstaller, FsStorage> {
        InstallPlanner::new(
            self.installer.clone(),
            RegistryService::on_disk(&self.registry_path),
        )
    }

    /// Contents of the `VERSION` marker of an installed IP
    pub fn installed_marker(&self, technology: &str, name: &str) -> Option<String> {
        std::fs::read_to_string(self.ip_root.join(technology).join(name).join("VERSION")).ok()
    }
}

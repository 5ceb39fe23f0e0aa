//! Catalog and installation commands
//!
//! Every command builds its services from the resolved [`IpmConfig`]; the
//! catalog is fetched fresh each time.

use anyhow::{bail, Context, Result};
use std::path::Path;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

use ipm_core::catalog::{
    install_manifest, load_manifest, CatalogService, CatalogStore, Category, CheckEntry,
    CheckTarget, FsStorage, InstallOutcome, InstallPlanner, InstallRequest, LocalOrRemote,
    LocalRegistry, RegistryService, ReqwestClient, TarballInstaller, Technology, UpdateChecker,
    UpdateStatus,
};
use ipm_core::config::IpmConfig;
use ipm_core::IpmError;

type Planner = InstallPlanner<TarballInstaller, FsStorage>;

struct Services {
    catalog: CatalogService<LocalOrRemote<ReqwestClient>>,
    planner: Planner,
}

impl Services {
    fn new(config: &IpmConfig) -> Result<Self> {
        let client = ReqwestClient::new()?;
        let installer = TarballInstaller::with_client(client.inner().clone());
        Ok(Self {
            catalog: CatalogService::new(LocalOrRemote::new(client), &config.catalog_url),
            planner: InstallPlanner::new(
                installer,
                RegistryService::on_disk(&config.registry_path),
            ),
        })
    }

    async fn fetch_catalog(&self) -> Result<CatalogStore> {
        Ok(self.catalog.fetch_catalog().await?)
    }

    async fn load_registry(&self) -> Result<LocalRegistry> {
        Ok(self.planner.registry_service().load().await?)
    }
}

fn render<T: Tabled>(rows: &[T]) -> String {
    Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string()
}

/// Table row for catalog listings
#[derive(Tabled)]
struct CatalogRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Technology")]
    technology: String,
    #[tabled(rename = "Latest")]
    latest: String,
    #[tabled(rename = "Type")]
    ip_type: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Width (mm)")]
    width: String,
    #[tabled(rename = "Height (mm)")]
    height: String,
}

pub async fn execute_ls(
    config: &IpmConfig,
    category: Option<Category>,
    technology: Option<Technology>,
    json_output: bool,
) -> Result<()> {
    let services = Services::new(config)?;
    let catalog = services.fetch_catalog().await?;
    let entries = catalog.list(category, technology);

    if json_output {
        let descriptors: Vec<_> = entries.iter().map(|(_, d)| d).collect();
        println!("{}", serde_json::to_string_pretty(&descriptors)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No verified IPs match the given filters.");
        return Ok(());
    }

    let rows: Vec<CatalogRow> = entries
        .iter()
        .map(|(cat, d)| CatalogRow {
            category: cat.to_string(),
            name: d.name.clone(),
            technology: d.technology.to_string(),
            latest: d
                .latest_release()
                .map(|r| r.version.clone())
                .unwrap_or_else(|_| "-".to_string()),
            ip_type: d.ip_type.clone(),
            status: d.status.clone(),
            width: d.width.to_string(),
            height: d.height.to_string(),
        })
        .collect();

    println!("{}", render(&rows));
    println!("Total number of IPs: {}", rows.len());
    Ok(())
}

/// Table row for installed IPs
#[derive(Tabled)]
struct InstalledRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Technology")]
    technology: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "IP Root")]
    ip_root: String,
    #[tabled(rename = "Installed")]
    installed_at: String,
}

pub async fn execute_lls(
    config: &IpmConfig,
    category: Option<Category>,
    technology: Option<Technology>,
    json_output: bool,
) -> Result<()> {
    let registry = RegistryService::on_disk(&config.registry_path).load().await?;
    let records = registry.list(category, technology);

    if json_output {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No IPs installed.");
        println!("\nRun 'ipm ls' to find available IPs.");
        return Ok(());
    }

    let rows: Vec<InstalledRow> = records
        .iter()
        .map(|r| InstalledRow {
            category: r.category.to_string(),
            name: r.name.clone(),
            technology: r.technology.to_string(),
            version: r.version.clone(),
            ip_root: r.ip_root.display().to_string(),
            installed_at: r.date.split('T').next().unwrap_or(&r.date).to_string(),
        })
        .collect();

    println!("{}", render(&rows));
    println!("Total number of installed IPs: {}", rows.len());
    Ok(())
}

/// Table row for an IP's release history
#[derive(Tabled)]
struct ReleaseRow {
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Date")]
    date: String,
}

pub async fn execute_info(
    config: &IpmConfig,
    name: &str,
    technology: Option<Technology>,
    json_output: bool,
) -> Result<()> {
    let services = Services::new(config)?;
    let catalog = services.fetch_catalog().await?;

    let descriptors: Vec<_> = catalog
        .find_by_name(name)
        .filter(|d| technology.map_or(true, |t| t == d.technology))
        .collect();

    if descriptors.is_empty() {
        return Err(IpmError::UnknownIp {
            name: name.to_string(),
            technology: technology
                .map(|t| t.to_string())
                .unwrap_or_else(|| "any".to_string()),
        }
        .into());
    }

    if json_output {
        println!("{}", serde_json::to_string_pretty(&descriptors)?);
        return Ok(());
    }

    for descriptor in descriptors {
        let latest = descriptor.latest_release()?.version.clone();

        println!();
        println!("IP:         {}", descriptor.name);
        println!("Technology: {}", descriptor.technology);
        println!("Category:   {}", descriptor.category);
        println!("Type:       {}", descriptor.ip_type);
        println!("Status:     {}", descriptor.status);
        println!("Author:     {} <{}>", descriptor.author, descriptor.email);
        println!("Repository: {}", descriptor.repo);
        println!(
            "Size:       {} x {} mm",
            descriptor.width, descriptor.height
        );
        println!();

        let rows: Vec<ReleaseRow> = descriptor
            .release
            .iter()
            .map(|r| ReleaseRow {
                version: if r.version == latest {
                    format!("{} (latest)", r.version)
                } else {
                    r.version.clone()
                },
                date: r.date.clone(),
            })
            .collect();
        println!("{}", render(&rows));
    }

    Ok(())
}

pub async fn execute_install(
    config: &IpmConfig,
    name: &str,
    version: Option<String>,
    technology: Technology,
    overwrite: bool,
) -> Result<()> {
    let services = Services::new(config)?;
    let catalog = services.fetch_catalog().await?;
    let mut registry = services.load_registry().await?;

    let mut request = InstallRequest::new(name, technology, &config.ip_root).overwrite(overwrite);
    request.version = version;

    let outcome = services
        .planner
        .install(&request, &catalog, &mut registry)
        .await
        .with_context(|| format!("Failed to install {name}"))?;

    match outcome {
        InstallOutcome::Installed { record, previous } => {
            if let Some(previous) = previous {
                println!(
                    "Replaced {} {} with {}",
                    record.name, previous.version, record.version
                );
            }
            println!("Installed {} {}", record.name, record.version);
            println!("Location: {}", record.install_path().display());
        }
        InstallOutcome::AlreadyInstalled(record) => {
            println!(
                "{} {} is already installed at {}",
                record.name,
                record.version,
                record.install_path().display()
            );
            println!("Use --overwrite to reinstall it.");
        }
    }

    Ok(())
}

pub async fn execute_uninstall(
    config: &IpmConfig,
    name: &str,
    technology: Technology,
) -> Result<()> {
    let services = Services::new(config)?;
    let mut registry = services.load_registry().await?;

    let record = services
        .planner
        .uninstall(name, technology, &config.ip_root, &mut registry)
        .await?;

    println!(
        "Uninstalled {} {} from {}",
        record.name,
        record.version,
        record.install_path().display()
    );
    Ok(())
}

/// Table row for check and update results
#[derive(Tabled)]
struct CheckRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Technology")]
    technology: String,
    #[tabled(rename = "IP Root")]
    ip_root: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&CheckEntry> for CheckRow {
    fn from(entry: &CheckEntry) -> Self {
        let status = match &entry.result {
            Ok(UpdateStatus::UpToDate { version }) => format!("{version} (up to date)"),
            Ok(UpdateStatus::UpdateAvailable { installed, latest }) => {
                format!("{installed} -> {latest} available")
            }
            Ok(UpdateStatus::Updated { from, to }) => format!("updated {from} -> {to}"),
            Err(e) => {
                let message = e.to_string();
                let first_line = message.lines().next().unwrap_or_default().to_string();
                format!("error: {first_line}")
            }
        };
        Self {
            name: entry.name.clone(),
            technology: entry.technology.to_string(),
            ip_root: entry.ip_root.display().to_string(),
            status,
        }
    }
}

/// `check` when `update` is false, `update` otherwise
pub async fn execute_check(
    config: &IpmConfig,
    name: Option<&str>,
    technology: Technology,
    update: bool,
) -> Result<()> {
    let services = Services::new(config)?;
    let mut registry = services.load_registry().await?;

    let target = match name {
        Some(name) => CheckTarget::Ip {
            name: name.to_string(),
            technology,
        },
        None => CheckTarget::AllInstalled,
    };

    if target == CheckTarget::AllInstalled && registry.is_empty() {
        println!("No IPs installed.");
        return Ok(());
    }

    let catalog = services.fetch_catalog().await?;
    let report = UpdateChecker::new(&services.planner)
        .check(&target, &mut registry, &catalog, update)
        .await?;

    let rows: Vec<CheckRow> = report.entries.iter().map(CheckRow::from).collect();
    println!("{}", render(&rows));

    if update {
        println!("Updated {} IP(s)", report.updated_count());
    } else if report
        .entries
        .iter()
        .any(|e| matches!(&e.result, Ok(status) if status.has_update()))
    {
        println!("Run 'ipm update --all' to install newer releases.");
    }

    let failures = report.failures().count();
    if failures > 0 {
        bail!(
            "{failures} of {} installed IP(s) could not be {}",
            report.entries.len(),
            if update { "updated" } else { "checked" }
        );
    }
    Ok(())
}

pub async fn execute_install_from_manifest(
    config: &IpmConfig,
    manifest: &Path,
    overwrite: bool,
) -> Result<()> {
    let entries = load_manifest(manifest)
        .with_context(|| format!("Failed to read manifest {}", manifest.display()))?;
    if entries.is_empty() {
        println!("Manifest {} lists no IPs.", manifest.display());
        return Ok(());
    }

    let services = Services::new(config)?;
    let catalog = services.fetch_catalog().await?;
    let mut registry = services.load_registry().await?;

    let results = install_manifest(
        &services.planner,
        &entries,
        &config.ip_root,
        overwrite,
        &catalog,
        &mut registry,
    )
    .await;

    let mut failures = 0;
    for (entry, result) in &results {
        match result {
            Ok(InstallOutcome::Installed { .. }) => {
                println!("Installed {} {}", entry.name, entry.version)
            }
            Ok(InstallOutcome::AlreadyInstalled(_)) => {
                println!("{} {} is already installed", entry.name, entry.version)
            }
            Err(e) => {
                failures += 1;
                eprintln!("Failed to install {} {}: {e}", entry.name, entry.version);
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {} IP(s) failed to install", results.len());
    }
    Ok(())
}

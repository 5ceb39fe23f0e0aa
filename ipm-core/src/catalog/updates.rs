//! Update detection for installed IPs

use std::path::PathBuf;

use super::index::CatalogStore;
use super::installer::PayloadInstaller;
use super::lock::{InstalledIpRecord, LocalRegistry};
use super::planner::{plan_install, InstallDecision, InstallPlanner, InstallRequest};
use super::store::RegistryStorage;
use super::types::Technology;
use super::version::is_newer;
use crate::error::{IpmError, IpmResult};

/// Which installed IPs to check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckTarget {
    /// Every installed copy of one IP
    Ip { name: String, technology: Technology },
    /// Every record in the registry
    AllInstalled,
}

/// Status of one installed IP against the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    /// Installed version is the latest release
    UpToDate { version: String },
    /// A newer release exists and was not installed
    UpdateAvailable { installed: String, latest: String },
    /// A newer release was installed
    Updated { from: String, to: String },
}

impl UpdateStatus {
    /// Returns true if an update is available.
    pub fn has_update(&self) -> bool {
        matches!(self, Self::UpdateAvailable { .. })
    }
}

/// Outcome for one registry record
#[derive(Debug)]
pub struct CheckEntry {
    pub name: String,
    pub technology: Technology,
    pub ip_root: PathBuf,
    pub result: IpmResult<UpdateStatus>,
}

/// Outcomes for every record a check touched
#[derive(Debug, Default)]
pub struct CheckReport {
    pub entries: Vec<CheckEntry>,
}

impl CheckReport {
    pub fn failures(&self) -> impl Iterator<Item = &CheckEntry> {
        self.entries.iter().filter(|e| e.result.is_err())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn updated_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.result, Ok(UpdateStatus::Updated { .. })))
            .count()
    }
}

/// Compare a record against the catalog without installing anything
pub fn update_status(
    record: &InstalledIpRecord,
    catalog: &CatalogStore,
) -> IpmResult<UpdateStatus> {
    let descriptor = catalog
        .find_descriptor(&record.name, record.technology)
        .ok_or_else(|| IpmError::UnknownIp {
            name: record.name.clone(),
            technology: record.technology.to_string(),
        })?;
    let latest = descriptor.latest_release()?;

    if is_newer(&latest.version, &record.version)? {
        Ok(UpdateStatus::UpdateAvailable {
            installed: record.version.clone(),
            latest: latest.version.clone(),
        })
    } else {
        Ok(UpdateStatus::UpToDate {
            version: record.version.clone(),
        })
    }
}

/// Compares installed IPs with the catalog and optionally updates them
pub struct UpdateChecker<'a, I: PayloadInstaller, S: RegistryStorage> {
    planner: &'a InstallPlanner<I, S>,
}

impl<'a, I: PayloadInstaller, S: RegistryStorage> UpdateChecker<'a, I, S> {
    pub fn new(planner: &'a InstallPlanner<I, S>) -> Self {
        Self { planner }
    }

    /// Check `target`, installing newer releases when `update` is set
    ///
    /// A single-IP target with no registry record fails with
    /// [`IpmError::NotInstalled`]. Otherwise every matching record is
    /// processed in registry order and its own result is reported; one
    /// record failing never stops the rest.
    pub async fn check(
        &self,
        target: &CheckTarget,
        registry: &mut LocalRegistry,
        catalog: &CatalogStore,
        update: bool,
    ) -> IpmResult<CheckReport> {
        let records: Vec<InstalledIpRecord> = match target {
            CheckTarget::Ip { name, technology } => {
                let records: Vec<_> = registry.find_all(name, *technology).cloned().collect();
                if records.is_empty() {
                    return Err(IpmError::NotInstalled {
                        name: name.clone(),
                        technology: technology.to_string(),
                        ip_root: None,
                    });
                }
                records
            }
            CheckTarget::AllInstalled => registry.iter().cloned().collect(),
        };

        let mut report = CheckReport::default();
        for record in records {
            let result = self.check_record(&record, registry, catalog, update).await;
            if let Err(e) = &result {
                tracing::warn!("Skipping {} ({}): {}", record.name, record.technology, e);
            }
            report.entries.push(CheckEntry {
                name: record.name,
                technology: record.technology,
                ip_root: record.ip_root,
                result,
            });
        }

        Ok(report)
    }

    async fn check_record(
        &self,
        record: &InstalledIpRecord,
        registry: &mut LocalRegistry,
        catalog: &CatalogStore,
        update: bool,
    ) -> IpmResult<UpdateStatus> {
        let status = update_status(record, catalog)?;

        let UpdateStatus::UpdateAvailable { installed, latest } = status else {
            return Ok(status);
        };
        if !update {
            return Ok(UpdateStatus::UpdateAvailable { installed, latest });
        }

        let request = InstallRequest::new(&record.name, record.technology, &record.ip_root)
            .version(&latest)
            .overwrite(true);

        match plan_install(&request, catalog, registry)? {
            InstallDecision::Install(plan) => {
                self.planner.execute(plan, registry).await?;
                tracing::info!("Updated {} from {} to {}", record.name, installed, latest);
                Ok(UpdateStatus::Updated {
                    from: installed,
                    to: latest,
                })
            }
            InstallDecision::AlreadyInstalled(_) => Ok(UpdateStatus::UpToDate { version: latest }),
        }
    }
}

//! Directory-backed provider.
//!
//! Reads a provider export laid out as one JSON array per record type:
//!
//! ```text
//! <dir>/
//!   blood_pressure.json        [{"time": ..., "systolic_mmhg": ..., ...}, ...]
//!   sleep_session.json
//!   weight.json
//!   body_fat.json
//!   lean_body_mass.json
//!   heart_rate_variability.json
//!   permissions.json           ["read:blood_pressure", ...]   (optional)
//! ```
//!
//! A missing type file means the provider holds no records of that type.
//! A missing `permissions.json` means every required permission is granted.

use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::types::{
    required_permissions, Permission, ProviderRecordType, RawRecord, ReadPage, ReadRequest,
};
use super::HealthDataProvider;
use crate::error::{Error, Result};

/// Default number of records returned per page.
pub const DEFAULT_PAGE_SIZE: usize = 500;

const PERMISSIONS_FILE: &str = "permissions.json";

/// Provider reading per-type JSON exports from a directory.
#[derive(Debug, Clone)]
pub struct ExportDirProvider {
    dir: PathBuf,
    page_size: usize,
}

impl ExportDirProvider {
    /// Open an export directory.
    ///
    /// # Errors
    ///
    /// Returns `ProviderUnavailable` if `dir` is not a directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(Error::ProviderUnavailable(format!(
                "export directory not found: {}",
                dir.display()
            )));
        }
        Ok(Self {
            dir,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Override the page size (minimum 1).
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn type_path(&self, record_type: ProviderRecordType) -> PathBuf {
        self.dir.join(format!("{}.json", record_type.as_str()))
    }

    async fn load(&self, record_type: ProviderRecordType) -> Result<Vec<RawRecord>> {
        let path = self.type_path(record_type);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| read_error(record_type, format!("{}: {e}", path.display())))?;

        match record_type {
            ProviderRecordType::BloodPressure => {
                parse(&content, record_type, RawRecord::BloodPressure)
            }
            ProviderRecordType::SleepSession => {
                parse(&content, record_type, RawRecord::SleepSession)
            }
            ProviderRecordType::Weight => parse(&content, record_type, RawRecord::Weight),
            ProviderRecordType::BodyFat => parse(&content, record_type, RawRecord::BodyFat),
            ProviderRecordType::LeanBodyMass => {
                parse(&content, record_type, RawRecord::LeanBodyMass)
            }
            ProviderRecordType::HeartRateVariability => {
                parse(&content, record_type, RawRecord::HeartRateVariability)
            }
        }
    }
}

fn read_error(record_type: ProviderRecordType, message: String) -> Error {
    Error::ProviderRead {
        record_type,
        message,
    }
}

fn parse<T: DeserializeOwned>(
    content: &str,
    record_type: ProviderRecordType,
    wrap: fn(T) -> RawRecord,
) -> Result<Vec<RawRecord>> {
    let samples: Vec<T> = serde_json::from_str(content)
        .map_err(|e| read_error(record_type, format!("malformed export: {e}")))?;
    Ok(samples.into_iter().map(wrap).collect())
}

impl HealthDataProvider for ExportDirProvider {
    fn name(&self) -> &str {
        "export-dir"
    }

    async fn granted_permissions(&self) -> Result<HashSet<Permission>> {
        let path = self.dir.join(PERMISSIONS_FILE);
        if !path.exists() {
            return Ok(required_permissions());
        }

        let content = tokio::fs::read_to_string(&path).await?;
        let granted: Vec<Permission> = serde_json::from_str(&content).map_err(|e| {
            Error::ProviderUnavailable(format!("malformed {PERMISSIONS_FILE}: {e}"))
        })?;
        Ok(granted.into_iter().collect())
    }

    async fn read_page(&self, request: &ReadRequest) -> Result<ReadPage> {
        let offset = match request.page_token.as_deref() {
            None => 0,
            Some(token) => token.parse::<usize>().map_err(|_| {
                read_error(request.record_type, format!("invalid page token '{token}'"))
            })?,
        };

        let matching: Vec<RawRecord> = self
            .load(request.record_type)
            .await?
            .into_iter()
            .filter(|r| r.time() >= request.since)
            .collect();

        let end = (offset + self.page_size).min(matching.len());
        let records = matching
            .get(offset..end)
            .map(<[RawRecord]>::to_vec)
            .unwrap_or_default();
        let next_page_token = (end < matching.len()).then(|| end.to_string());

        debug!(
            record_type = %request.record_type,
            offset,
            returned = records.len(),
            has_more = next_page_token.is_some(),
            "Read export page"
        );

        Ok(ReadPage {
            records,
            next_page_token,
        })
    }
}

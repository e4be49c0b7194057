//! Health data provider boundary.
//!
//! The engine never talks to a platform health store directly. It goes
//! through [`HealthDataProvider`], which exposes exactly two capabilities:
//! a permission query and a paginated, time-filtered read.
//!
//! # Implementations
//!
//! - [`ExportDirProvider`] - reads a directory of per-type JSON exports
//! - [`MemoryProvider`] - serves scripted pages held in memory

mod export_dir;
mod memory;
mod types;

pub use export_dir::ExportDirProvider;
pub use memory::MemoryProvider;
pub use types::{
    required_permissions, BloodPressureSample, BodyFatSample, HrvSample, LeanBodyMassSample,
    Permission, ProviderRecordType, RawRecord, ReadPage, ReadRequest, RecordMetadata,
    SleepSessionSample, SleepStage, SleepStageType, WeightSample,
};

use crate::error::Result;
use std::collections::HashSet;

/// Trait for health data providers.
///
/// Both calls are suspension points; implementations may block on I/O
/// for as long as the underlying store needs.
pub trait HealthDataProvider: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    /// Permissions the user has granted to this client.
    fn granted_permissions(
        &self,
    ) -> impl std::future::Future<Output = Result<HashSet<Permission>>> + Send;

    /// Read one page of records matching `request`.
    fn read_page(
        &self,
        request: &ReadRequest,
    ) -> impl std::future::Future<Output = Result<ReadPage>> + Send;

    /// Check whether every permission in [`required_permissions`] is granted.
    fn has_all_permissions(&self) -> impl std::future::Future<Output = Result<bool>> + Send {
        async move {
            let granted = self.granted_permissions().await?;
            Ok(required_permissions().iter().all(|p| granted.contains(p)))
        }
    }
}

//! In-memory provider serving scripted pages.
//!
//! Used by tests and by embedders that already hold provider results in
//! memory (for example a platform bridge that hands records over in bulk).
//! Pages are served in the order they were added; the page token is the
//! index of the next page.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::types::{
    required_permissions, Permission, ProviderRecordType, RawRecord, ReadPage, ReadRequest,
};
use super::HealthDataProvider;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
enum ScriptedPage {
    Records(Vec<RawRecord>),
    Fail(String),
}

/// Provider backed by pre-built pages.
#[derive(Debug)]
pub struct MemoryProvider {
    pages: HashMap<ProviderRecordType, Vec<ScriptedPage>>,
    granted: HashSet<Permission>,
    unavailable: Option<String>,
    requests: Mutex<Vec<ReadRequest>>,
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProvider {
    /// Create an empty provider with every required permission granted.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            granted: required_permissions(),
            unavailable: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Append one page of records for the records' type.
    ///
    /// # Panics
    ///
    /// Panics if the page mixes record types.
    #[must_use]
    pub fn with_page(mut self, record_type: ProviderRecordType, records: Vec<RawRecord>) -> Self {
        assert!(
            records.iter().all(|r| r.record_type() == record_type),
            "page for {record_type} contains records of another type"
        );
        self.pages
            .entry(record_type)
            .or_default()
            .push(ScriptedPage::Records(records));
        self
    }

    /// Split `records` into pages of `page_size` and append them.
    #[must_use]
    pub fn with_records(
        mut self,
        record_type: ProviderRecordType,
        records: Vec<RawRecord>,
        page_size: usize,
    ) -> Self {
        for chunk in records.chunks(page_size.max(1)) {
            self = self.with_page(record_type, chunk.to_vec());
        }
        self
    }

    /// Append a page that fails when requested.
    #[must_use]
    pub fn with_failing_page(mut self, record_type: ProviderRecordType, message: &str) -> Self {
        self.pages
            .entry(record_type)
            .or_default()
            .push(ScriptedPage::Fail(message.to_string()));
        self
    }

    /// Replace the granted permission set.
    #[must_use]
    pub fn with_granted(mut self, granted: impl IntoIterator<Item = Permission>) -> Self {
        self.granted = granted.into_iter().collect();
        self
    }

    /// Make every call fail as if the provider were not installed.
    #[must_use]
    pub fn unavailable(mut self, reason: &str) -> Self {
        self.unavailable = Some(reason.to_string());
        self
    }

    /// Every read request received so far, in order.
    pub fn requests(&self) -> Vec<ReadRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn check_available(&self) -> Result<()> {
        match &self.unavailable {
            Some(reason) => Err(Error::ProviderUnavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

impl HealthDataProvider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    async fn granted_permissions(&self) -> Result<HashSet<Permission>> {
        self.check_available()?;
        Ok(self.granted.clone())
    }

    async fn read_page(&self, request: &ReadRequest) -> Result<ReadPage> {
        self.check_available()?;
        if let Ok(mut log) = self.requests.lock() {
            log.push(request.clone());
        }

        let index = match request.page_token.as_deref() {
            None => 0,
            Some(token) => token.parse::<usize>().map_err(|_| Error::ProviderRead {
                record_type: request.record_type,
                message: format!("invalid page token '{token}'"),
            })?,
        };

        let Some(pages) = self.pages.get(&request.record_type) else {
            return Ok(ReadPage::default());
        };

        let records = match pages.get(index) {
            None => Vec::new(),
            Some(ScriptedPage::Fail(message)) => {
                return Err(Error::ProviderRead {
                    record_type: request.record_type,
                    message: message.clone(),
                });
            }
            Some(ScriptedPage::Records(records)) => records
                .iter()
                .filter(|r| r.time() >= request.since)
                .cloned()
                .collect(),
        };

        let next_page_token = (index + 1 < pages.len()).then(|| (index + 1).to_string());
        Ok(ReadPage {
            records,
            next_page_token,
        })
    }
}

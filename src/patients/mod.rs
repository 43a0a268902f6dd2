//! Birthday reports over the clinical records store.

pub mod filter;
pub mod record;
pub mod store;

use std::sync::Arc;

use chrono::{Local, NaiveDate};

use crate::error::StoreError;

pub use filter::{PatientFilter, PatientQuery};
pub use record::PatientRecord;
pub use store::{MemoryPatientStore, PatientStore, PgPatientStore};

/// Runs patient queries and turns rows into [`PatientRecord`]s.
#[derive(Clone)]
pub struct PatientDirectory {
    store: Arc<dyn PatientStore>,
    default_country_code: String,
    clock: fn() -> NaiveDate,
}

/// Server local calendar date.
fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

impl PatientDirectory {
    pub fn new(store: Arc<dyn PatientStore>, default_country_code: impl Into<String>) -> Self {
        Self {
            store,
            default_country_code: default_country_code.into(),
            clock: local_today,
        }
    }

    /// Evaluate reports against `clock` instead of the local date.
    pub fn with_clock(mut self, clock: fn() -> NaiveDate) -> Self {
        self.clock = clock;
        self
    }

    /// The date "today", "tomorrow" and ages are computed from.
    pub fn today(&self) -> NaiveDate {
        (self.clock)()
    }

    /// Report-eligible patients matching `filter`.
    pub async fn fetch_patients(
        &self,
        filter: PatientFilter,
        today: NaiveDate,
    ) -> Result<Vec<PatientRecord>, StoreError> {
        self.run(PatientQuery::report(filter, today)).await
    }

    /// A single patient by UHID under the relaxed direct-lookup checks.
    pub async fn fetch_patient_by_exact_id(
        &self,
        uhid: i64,
        today: NaiveDate,
    ) -> Result<Option<PatientRecord>, StoreError> {
        let mut found = self.run(PatientQuery::by_exact_id(uhid, today)).await?;
        Ok(if found.is_empty() { None } else { Some(found.swap_remove(0)) })
    }

    async fn run(&self, query: PatientQuery) -> Result<Vec<PatientRecord>, StoreError> {
        let today = query.today;
        let rows = self.store.fetch(&query).await.inspect_err(|e| {
            tracing::error!(eligibility = ?query.eligibility, "patient query failed: {e}");
        })?;

        tracing::info!(
            count = rows.len(),
            eligibility = ?query.eligibility,
            "patient query returned"
        );

        Ok(rows
            .into_iter()
            .map(|row| PatientRecord::from_row(row, today, &self.default_country_code))
            .collect())
    }
}

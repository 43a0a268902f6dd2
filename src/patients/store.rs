use async_trait::async_trait;
use chrono::{Datelike, Days, NaiveDate};
use sqlx::PgPool;

use crate::error::StoreError;

use super::filter::PatientQuery;
use super::record::{PatientRow, SourcePatient, pick_mobile};

/// Read access to the clinical records store.
#[async_trait]
pub trait PatientStore: Send + Sync {
    /// Rows matching `query`, ordered by UHID ascending, capped by the
    /// filter's limit after ordering.
    async fn fetch(&self, query: &PatientQuery) -> Result<Vec<PatientRow>, StoreError>;
}

pub struct PgPatientStore {
    pool: PgPool,
}

impl PgPatientStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PatientStore for PgPatientStore {
    async fn fetch(&self, query: &PatientQuery) -> Result<Vec<PatientRow>, StoreError> {
        let mut qb = query.to_sql();
        tracing::debug!(sql = qb.sql(), "patient query");

        let rows = qb
            .build_query_as::<PatientRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

/// Patients held in process memory; used for demos and tests.
#[derive(Default)]
pub struct MemoryPatientStore {
    patients: Vec<SourcePatient>,
}

impl MemoryPatientStore {
    pub fn new(patients: Vec<SourcePatient>) -> Self {
        Self { patients }
    }

    /// A small ward whose birthdays sit around `today`, so every report
    /// has something to show.
    pub fn demo(today: NaiveDate) -> Self {
        let created = NaiveDate::from_ymd_opt(2024, 4, 1).and_then(|d| d.and_hms_opt(10, 0, 0));
        let shift = |years_ago: i32, days_ahead: u64| {
            let base = today.checked_add_days(Days::new(days_ahead)).unwrap_or(today);
            // Feb 29 falls back to Feb 28 in common years.
            base.with_year(base.year() - years_ago)
                .or_else(|| NaiveDate::from_ymd_opt(base.year() - years_ago, base.month(), 28))
        };

        let seed = [
            ("1001", "John Doe", 30, 0, "M", "9876543210"),
            ("1002", "Jane Smith", 41, 0, "F", "9876543211"),
            ("1003", "Mike Johnson", 24, 1, "M", "9876543212"),
            ("1004", "Sarah Wilson", 38, 1, "F", "+447700900123"),
            ("1005", "David Brown", 19, 3, "M", "9876543214"),
            ("1006", "Lisa Davis", 62, 0, "F", "9876543215"),
            ("1007", "Tom Anderson", 33, 10, "M", "0"),
            ("1008", "Emily Taylor", 27, 45, "F", "9876543217"),
        ];

        let patients = seed
            .into_iter()
            .map(|(uhid, name, age, days_ahead, sex, mobile)| SourcePatient {
                uhid: uhid.to_string(),
                name: Some(name.to_string()),
                dob: shift(age, days_ahead),
                sex: Some(sex.to_string()),
                deceased: Some(false),
                created_at: created,
                mobiles: vec![mobile.to_string()],
            })
            .collect();

        Self { patients }
    }
}

#[async_trait]
impl PatientStore for MemoryPatientStore {
    async fn fetch(&self, query: &PatientQuery) -> Result<Vec<PatientRow>, StoreError> {
        let mut rows: Vec<PatientRow> = self
            .patients
            .iter()
            .filter(|p| query.admits(p))
            .filter_map(|p| {
                Some(PatientRow {
                    uhid: p.uhid.parse().ok()?,
                    name: p.name.clone(),
                    dob: p.dob?,
                    gender: p.sex.clone(),
                    mobile: pick_mobile(&p.mobiles)?.to_string(),
                })
            })
            .collect();

        rows.sort_by_key(|r| r.uhid);
        if let Some(limit) = query.filter.limit {
            rows.truncate(limit.get() as usize);
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use super::*;
    use crate::patients::filter::PatientFilter;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn patient(uhid: &str, mobiles: &[&str]) -> SourcePatient {
        SourcePatient {
            uhid: uhid.into(),
            name: Some(format!("Patient {uhid}")),
            dob: Some(d(1990, 10, 19)),
            sex: Some("F".into()),
            deceased: None,
            created_at: d(2024, 2, 1).and_hms_opt(0, 0, 0),
            mobiles: mobiles.iter().map(|m| m.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn cap_applies_after_ordering() {
        let store = MemoryPatientStore::new(vec![
            patient("40", &["9000000040"]),
            patient("7", &["9000000007"]),
            patient("123", &["9000000123"]),
            patient("15", &["9000000015"]),
        ]);
        let filter = PatientFilter { limit: NonZeroU32::new(2), ..Default::default() };
        let rows = store
            .fetch(&PatientQuery::report(filter, d(2026, 10, 19)))
            .await
            .unwrap();

        let ids: Vec<i64> = rows.iter().map(|r| r.uhid).collect();
        assert_eq!(ids, vec![7, 15]);
    }

    #[tokio::test]
    async fn one_mobile_per_patient_is_stable() {
        let store = MemoryPatientStore::new(vec![patient("9", &["9555", "0", "9111", ""])]);
        let q = PatientQuery::report(PatientFilter::default(), d(2026, 10, 19));

        let first = store.fetch(&q).await.unwrap();
        let second = store.fetch(&q).await.unwrap();
        assert_eq!(first[0].mobile, "9111");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn demo_ward_fills_both_birthday_reports() {
        let today = d(2026, 10, 19);
        let store = MemoryPatientStore::demo(today);

        let todays = store
            .fetch(&PatientQuery::report(PatientFilter::birthday_today(), today))
            .await
            .unwrap();
        // Lisa Davis is over the age window.
        assert_eq!(todays.iter().map(|r| r.uhid).collect::<Vec<_>>(), vec![1001, 1002]);

        let tomorrows = store
            .fetch(&PatientQuery::report(PatientFilter::birthday_tomorrow(), today))
            .await
            .unwrap();
        assert_eq!(tomorrows.len(), 2);
    }

    #[tokio::test]
    async fn demo_handles_leap_day() {
        let store = MemoryPatientStore::demo(d(2028, 2, 29));
        assert!(store.patients.iter().all(|p| p.dob.is_some()));
    }
}

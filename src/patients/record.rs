use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::mobile::{self, NormalizedMobile};

/// A patient as held in the clinical source tables, before any filtering.
///
/// Only the in-memory store works with this shape; the Postgres store lets
/// the database do the filtering and returns [`PatientRow`]s directly.
#[derive(Debug, Clone, Default)]
pub struct SourcePatient {
    pub uhid: String,
    pub name: Option<String>,
    pub dob: Option<NaiveDate>,
    pub sex: Option<String>,
    pub deceased: Option<bool>,
    pub created_at: Option<NaiveDateTime>,
    /// One entry per address row.
    pub mobiles: Vec<String>,
}

/// One row of a patient report, as returned by a store.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PatientRow {
    pub uhid: i64,
    pub name: Option<String>,
    pub dob: NaiveDate,
    pub gender: Option<String>,
    pub mobile: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecord {
    pub uhid: i64,
    pub name: String,
    pub dob: NaiveDate,
    pub gender: String,
    pub age: i32,
    /// Mobile exactly as stored in the source.
    pub mobile: String,
    #[serde(flatten)]
    pub normalized: NormalizedMobile,
}

impl PatientRecord {
    pub fn from_row(row: PatientRow, today: NaiveDate, default_country_code: &str) -> Self {
        let normalized = mobile::normalize(&row.mobile, default_country_code);
        Self {
            uhid: row.uhid,
            name: row.name.map(|n| n.trim().to_string()).unwrap_or_default(),
            age: age_on(row.dob, today),
            gender: gender_label(row.gender.as_deref()),
            dob: row.dob,
            mobile: row.mobile,
            normalized,
        }
    }
}

/// Completed years between `dob` and `today`.
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        age -= 1;
    }
    age
}

pub fn gender_label(code: Option<&str>) -> String {
    match code.map(str::trim) {
        Some("M") => "Male".to_string(),
        Some("F") => "Female".to_string(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// Sentinel the source uses for "no number".
pub const MOBILE_SENTINEL: &str = "0";

pub fn is_usable_mobile(value: &str) -> bool {
    !value.is_empty() && value != MOBILE_SENTINEL
}

/// Pick one mobile per patient: the smallest usable value in byte order.
pub fn pick_mobile(mobiles: &[String]) -> Option<&str> {
    mobiles
        .iter()
        .map(String::as_str)
        .filter(|m| is_usable_mobile(m))
        .min()
}

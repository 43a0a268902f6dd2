use std::num::NonZeroU32;

use chrono::{Datelike, Months, NaiveDate};
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};

use super::record::{SourcePatient, age_on, pick_mobile};

/// Reports only cover records created in or after this year.
pub const REPORT_CREATED_SINCE_YEAR: i32 = 2024;
pub const REPORT_MIN_AGE: i32 = 10;
pub const REPORT_MAX_AGE: i32 = 50;

/// Narrowing options for a patient report. All populated options are ANDed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct PatientFilter {
    pub uhid: Option<i64>,
    pub dob: Option<NaiveDate>,
    #[serde(default)]
    pub birthday_today: bool,
    #[serde(default)]
    pub birthday_tomorrow: bool,
    pub limit: Option<NonZeroU32>,
}

impl PatientFilter {
    pub fn birthday_today() -> Self {
        Self { birthday_today: true, ..Default::default() }
    }

    pub fn birthday_tomorrow() -> Self {
        Self { birthday_tomorrow: true, ..Default::default() }
    }

    pub fn by_dob(dob: NaiveDate) -> Self {
        Self { dob: Some(dob), ..Default::default() }
    }
}

/// Which fixed data-quality checks a query applies on top of its filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// Every check: creation year, DOB, mobile, numeric id, alive, age range.
    Report,
    /// Direct lookup by a known id: drops the creation-year and age-range checks.
    DirectLookup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientQuery {
    pub filter: PatientFilter,
    pub eligibility: Eligibility,
    pub today: NaiveDate,
}

impl PatientQuery {
    pub fn report(filter: PatientFilter, today: NaiveDate) -> Self {
        Self { filter, eligibility: Eligibility::Report, today }
    }

    pub fn by_exact_id(uhid: i64, today: NaiveDate) -> Self {
        Self {
            filter: PatientFilter { uhid: Some(uhid), ..Default::default() },
            eligibility: Eligibility::DirectLookup,
            today,
        }
    }

    pub fn tomorrow(&self) -> NaiveDate {
        self.today.succ_opt().unwrap_or(self.today)
    }

    /// Latest DOB that is at least `REPORT_MIN_AGE` years old today.
    fn born_on_or_before(&self) -> NaiveDate {
        self.today
            .checked_sub_months(Months::new(12 * REPORT_MIN_AGE as u32))
            .unwrap_or(NaiveDate::MIN)
    }

    /// DOBs after this date are at most `REPORT_MAX_AGE` years old today.
    fn born_after(&self) -> NaiveDate {
        self.today
            .checked_sub_months(Months::new(12 * (REPORT_MAX_AGE as u32 + 1)))
            .unwrap_or(NaiveDate::MIN)
    }

    /// Render the query with every value as a bound parameter.
    pub fn to_sql(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT
              p.ireg_no::bigint AS uhid,
              p.cpat_name AS name,
              p.ddob::date AS dob,
              p.csex AS gender,
              COALESCE(a.cmobile, '') AS mobile
            FROM mast_patient p
            LEFT JOIN (
              SELECT ipat_id, MIN(cmobile COLLATE "C") AS cmobile
              FROM mast_pat_addr
              WHERE cmobile <> '0' AND cmobile <> ''
              GROUP BY ipat_id
            ) a ON a.ipat_id = p.ipat_id
            WHERE "#,
        );

        {
            let mut w = qb.separated(" AND ");

            let f = &self.filter;
            if let Some(uhid) = f.uhid {
                w.push("p.ireg_no = ");
                w.push_bind_unseparated(uhid.to_string());
            }
            if let Some(dob) = f.dob {
                w.push("p.ddob::date = ");
                w.push_bind_unseparated(dob);
            }
            if f.birthday_today {
                push_month_day(&mut w, self.today);
            }
            if f.birthday_tomorrow {
                push_month_day(&mut w, self.tomorrow());
            }

            w.push("p.ddob IS NOT NULL");
            w.push("COALESCE(a.cmobile, '') <> '0'");
            w.push("COALESCE(a.cmobile, '') <> ''");
            w.push("p.ireg_no <> '-1'");
            w.push("p.ireg_no ~ '^[0-9]+$'");
            w.push("COALESCE(p.bdead, FALSE) = FALSE");

            if self.eligibility == Eligibility::Report {
                w.push("EXTRACT(YEAR FROM p.dcreate_dt)::int >= ");
                w.push_bind_unseparated(REPORT_CREATED_SINCE_YEAR);
                w.push("p.ddob::date <= ");
                w.push_bind_unseparated(self.born_on_or_before());
                w.push("p.ddob::date > ");
                w.push_bind_unseparated(self.born_after());
            }
        }

        qb.push(" ORDER BY p.ireg_no::bigint ASC");
        if let Some(limit) = self.filter.limit {
            qb.push(" LIMIT ");
            qb.push_bind(i64::from(limit.get()));
        }
        qb
    }

    /// In-process evaluation of the same predicates `to_sql` renders.
    pub fn admits(&self, p: &SourcePatient) -> bool {
        let Some(dob) = p.dob else {
            return false;
        };
        if pick_mobile(&p.mobiles).is_none() {
            return false;
        }
        if p.uhid == "-1" || p.uhid.is_empty() || !p.uhid.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        if p.deceased.unwrap_or(false) {
            return false;
        }

        let f = &self.filter;
        if let Some(uhid) = f.uhid {
            if p.uhid != uhid.to_string() {
                return false;
            }
        }
        if f.dob.is_some_and(|want| want != dob) {
            return false;
        }
        if f.birthday_today && !same_month_day(dob, self.today) {
            return false;
        }
        if f.birthday_tomorrow && !same_month_day(dob, self.tomorrow()) {
            return false;
        }

        if self.eligibility == Eligibility::Report {
            let created_ok = p
                .created_at
                .is_some_and(|c| c.year() >= REPORT_CREATED_SINCE_YEAR);
            let age = age_on(dob, self.today);
            if !created_ok || !(REPORT_MIN_AGE..=REPORT_MAX_AGE).contains(&age) {
                return false;
            }
        }
        true
    }
}

fn push_month_day(w: &mut sqlx::query_builder::Separated<'_, 'static, Postgres, &'static str>, date: NaiveDate) {
    w.push("EXTRACT(MONTH FROM p.ddob)::int = ");
    w.push_bind_unseparated(date.month() as i32);
    w.push("EXTRACT(DAY FROM p.ddob)::int = ");
    w.push_bind_unseparated(date.day() as i32);
}

fn same_month_day(a: NaiveDate, b: NaiveDate) -> bool {
    a.month() == b.month() && a.day() == b.day()
}

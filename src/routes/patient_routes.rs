use std::sync::LazyLock;

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::QueryRejection},
    routing::get,
};
use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::AppState,
    patients::{PatientFilter, PatientRecord},
};

static DATE_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date regex"));

#[derive(Debug, Serialize)]
pub struct PatientListResponse {
    pub success: bool,
    pub data: Vec<PatientRecord>,
    pub count: usize,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct PatientResponse {
    pub success: bool,
    pub data: PatientRecord,
    pub message: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_patients))
        .route("/id/{uhid}", get(get_patient))
        .route("/dob/{dob}", get(patients_by_dob))
        .route("/birthday/today", get(birthday_today))
        .route("/birthday/tomorrow", get(birthday_tomorrow))
}

fn parse_dob(raw: &str) -> Result<NaiveDate, ApiError> {
    let invalid = || ApiError::validation("Invalid date format. Please use YYYY-MM-DD");
    if !DATE_SHAPE.is_match(raw) {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| invalid())
}

fn listing(data: Vec<PatientRecord>, what: impl std::fmt::Display) -> Json<PatientListResponse> {
    let count = data.len();
    Json(PatientListResponse {
        success: true,
        message: format!("Found {count} patients {what}"),
        data,
        count,
    })
}

pub async fn list_patients(
    State(state): State<AppState>,
    _auth: AuthContext,
    filter: Result<Query<PatientFilter>, QueryRejection>,
) -> Result<Json<PatientListResponse>, ApiError> {
    let Query(filter) = filter.map_err(|e| ApiError::validation(e.body_text()))?;
    let data = state.patients.fetch_patients(filter, state.patients.today()).await?;
    Ok(listing(data, "matching the filter"))
}

pub async fn get_patient(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(uhid): Path<String>,
) -> Result<Json<PatientResponse>, ApiError> {
    let uhid: i64 = uhid
        .trim()
        .parse()
        .map_err(|_| ApiError::validation("UHID must be numeric"))?;

    let patient = state
        .patients
        .fetch_patient_by_exact_id(uhid, state.patients.today())
        .await?
        .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "Patient not found".into()))?;

    Ok(Json(PatientResponse {
        success: true,
        data: patient,
        message: "Patient found successfully".into(),
    }))
}

pub async fn patients_by_dob(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(dob): Path<String>,
) -> Result<Json<PatientListResponse>, ApiError> {
    let dob = parse_dob(&dob)?;
    let data = state
        .patients
        .fetch_patients(PatientFilter::by_dob(dob), state.patients.today())
        .await?;
    Ok(listing(data, format_args!("with DOB {dob}")))
}

pub async fn birthday_today(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<PatientListResponse>, ApiError> {
    let data = state
        .patients
        .fetch_patients(PatientFilter::birthday_today(), state.patients.today())
        .await?;
    Ok(listing(data, "with birthday today"))
}

pub async fn birthday_tomorrow(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<PatientListResponse>, ApiError> {
    let data = state
        .patients
        .fetch_patients(PatientFilter::birthday_tomorrow(), state.patients.today())
        .await?;
    Ok(listing(data, "with birthday tomorrow"))
}

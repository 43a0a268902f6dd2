use crate::models::AppState;
use axum::{Router, routing::get};

pub mod auth_routes;
pub mod health_routes;
pub mod notify_routes;
pub mod patient_routes;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/auth", auth_routes::router())
        .nest("/api/patients", patient_routes::router())
        .nest("/api/notify", notify_routes::router())
        .nest("/api/health", health_routes::router())
        .route("/", get(health_routes::index))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use chrono::NaiveDate;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::accounts::{AccountService, MemoryAccountStore};
    use crate::auth::SessionSigner;
    use crate::config::WhatsAppSettings;
    use crate::error::StoreError;
    use crate::notify::gateway::{ContactRegistration, GatewayError, MessagingGateway, TemplateMessage};
    use crate::notify::Dispatcher;
    use crate::patients::{MemoryPatientStore, PatientDirectory, PatientQuery, PatientStore};
    use crate::patients::record::PatientRow;

    struct EchoGateway;

    #[async_trait]
    impl MessagingGateway for EchoGateway {
        async fn register_contact(&self, _: &ContactRegistration) -> Result<Value, GatewayError> {
            Ok(json!({ "ApiResponse": "Contact added" }))
        }

        async fn send_template(&self, msg: &TemplateMessage) -> Result<Value, GatewayError> {
            if msg.param == "Nobody" {
                return Ok(json!({ "ApiResponse": "Invalid contact" }));
            }
            Ok(json!({ "ApiResponse": "Message sent", "Contact": msg.contact }))
        }
    }

    struct DownStore;

    #[async_trait]
    impl PatientStore for DownStore {
        async fn fetch(&self, _: &PatientQuery) -> Result<Vec<PatientRow>, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }
    }

    fn whatsapp() -> WhatsAppSettings {
        WhatsAppSettings {
            send_url: Some("https://wa.example.test/send".into()),
            contact_url: Some("https://wa.example.test/contact".into()),
            license_number: Some("LIC-1".into()),
            api_key: Some("KEY-1".into()),
            default_template: Some("birthday_wish".into()),
            default_tag: None,
            timeout_secs: 5,
            concurrency: 2,
        }
    }

    struct TestApp {
        app: Router,
        admin_token: String,
        staff_token: String,
    }

    async fn setup_with(patients: Arc<dyn PatientStore>) -> TestApp {
        let accounts = AccountService::new(
            Arc::new(MemoryAccountStore::new()),
            SessionSigner::new(b"router-test-secret-router-test-s", 24),
        );
        let admin = accounts.register("Admin", "admin", "admin-pass-1", true).await.unwrap();
        let staff = accounts.register("Front Desk", "desk", "desk-pass-1", false).await.unwrap();
        let now = chrono::Utc::now();
        let admin_token = accounts.issue_token(&admin, now).token;
        let staff_token = accounts.issue_token(&staff, now).token;

        let state = AppState {
            patients: PatientDirectory::new(patients, "91").with_clock(fixed_today),
            accounts,
            dispatcher: Arc::new(Dispatcher::new(Arc::new(EchoGateway), whatsapp())),
        };
        TestApp { app: router(state), admin_token, staff_token }
    }

    fn fixed_today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    async fn setup() -> TestApp {
        setup_with(Arc::new(MemoryPatientStore::demo(fixed_today()))).await
    }

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn get(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut b = Request::get(uri);
        if let Some(t) = token {
            b = b.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        b.body(Body::empty()).unwrap()
    }

    fn send(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut b = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(t) = token {
            b = b.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        b.body(Body::from(body.to_string())).unwrap()
    }

    fn uhids(body: &Value) -> Vec<i64> {
        body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["uhid"].as_i64().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn health_and_index_are_public() {
        let t = setup().await;
        let (status, body) = call(&t.app, get("/api/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "OK");
        assert!(body["timestamp"].is_string());

        let (status, body) = call(&t.app, get("/", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "birthday-greeter");
    }

    #[tokio::test]
    async fn patient_routes_need_a_token() {
        let t = setup().await;
        let (status, body) = call(&t.app, get("/api/patients/birthday/today", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "MISSING_TOKEN");

        let (status, body) = call(&t.app, get("/api/patients/birthday/today", Some("nope"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn login_then_fetch_todays_birthdays() {
        let t = setup().await;
        let (status, body) = call(
            &t.app,
            send("POST", "/api/auth/login", None, json!({ "loginId": "desk", "password": "desk-pass-1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["account"]["loginId"], "desk");
        assert!(body["data"]["account"].get("passwordHash").is_none());
        let token = body["data"]["token"].as_str().unwrap().to_string();

        let (status, body) = call(&t.app, get("/api/patients/birthday/today", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        // 1006 shares the birthday but is over the age range
        assert_eq!(uhids(&body), vec![1001, 1002]);
        assert_eq!(body["count"], 2);
        assert_eq!(body["data"][0]["normalizedMobile"], "+919876543210");
        assert_eq!(body["data"][0]["countryName"], "India");
        assert_eq!(body["data"][0]["mobile"], "9876543210");
    }

    #[tokio::test]
    async fn bad_credentials_share_a_message() {
        let t = setup().await;
        let (s1, wrong) = call(
            &t.app,
            send("POST", "/api/auth/login", None, json!({ "loginId": "desk", "password": "wrong-pass" })),
        )
        .await;
        let (s2, unknown) = call(
            &t.app,
            send("POST", "/api/auth/login", None, json!({ "userId": "ghost", "password": "desk-pass-1" })),
        )
        .await;
        assert_eq!(s1, StatusCode::UNAUTHORIZED);
        assert_eq!(s2, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong["error"]["message"], unknown["error"]["message"]);
    }

    #[tokio::test]
    async fn tomorrow_and_filtered_listing() {
        let t = setup().await;
        let token = Some(t.staff_token.as_str());

        let (_, body) = call(&t.app, get("/api/patients/birthday/tomorrow", token)).await;
        // 1003 and 1004; 1005 is three days out
        assert_eq!(uhids(&body), vec![1003, 1004]);
        assert_eq!(body["data"][1]["countryCode"], "44");

        let (status, body) = call(&t.app, get("/api/patients?limit=3", token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(uhids(&body), vec![1001, 1002, 1003]);

        let (status, body) = call(&t.app, get("/api/patients?birthdayTomorrow=true&uhid=1004", token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(uhids(&body), vec![1004]);

        let (status, body) = call(&t.app, get("/api/patients?ward=3", token)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn lookup_by_id_uses_direct_lookup_rules() {
        let t = setup().await;
        let token = Some(t.staff_token.as_str());

        // outside the report age range, still found directly
        let (status, body) = call(&t.app, get("/api/patients/id/1006", token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["uhid"], 1006);
        assert_eq!(body["data"]["gender"], "Female");

        // placeholder mobile never qualifies
        let (status, _) = call(&t.app, get("/api/patients/id/1007", token)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&t.app, get("/api/patients/id/abc", token)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn dob_path_is_strict() {
        let t = setup().await;
        let token = Some(t.staff_token.as_str());

        let (status, body) = call(&t.app, get("/api/patients/dob/1990-1-01", token)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Invalid date format. Please use YYYY-MM-DD");

        let (status, body) = call(&t.app, get("/api/patients/dob/1990-01-01", token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn store_outage_is_not_an_empty_list() {
        let t = setup_with(Arc::new(DownStore)).await;
        let (status, body) =
            call(&t.app, get("/api/patients/birthday/today", Some(&t.staff_token))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "UPSTREAM_UNAVAILABLE");
    }

    #[tokio::test]
    async fn only_admins_register_accounts() {
        let t = setup().await;
        let new_account = json!({ "name": "Nurse", "loginId": "nurse", "password": "nurse-pass-1" });

        let (status, _) = call(
            &t.app,
            send("POST", "/api/auth/register", Some(&t.staff_token), new_account.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = call(
            &t.app,
            send("POST", "/api/auth/register", Some(&t.admin_token), new_account.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["account"]["isAdmin"], false);

        let (status, body) = call(
            &t.app,
            send("POST", "/api/auth/register", Some(&t.admin_token), new_account),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["message"], "User ID is already in use.");
    }

    #[tokio::test]
    async fn profile_and_password_changes() {
        let t = setup().await;
        let token = Some(t.staff_token.as_str());

        let (status, body) = call(
            &t.app,
            send("PUT", "/api/auth/profile", token, json!({ "name": "Reception" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["account"]["displayName"], "Reception");

        let (_, body) = call(&t.app, get("/api/auth/profile", token)).await;
        assert_eq!(body["data"]["account"]["displayName"], "Reception");

        let (status, body) = call(
            &t.app,
            send(
                "PUT",
                "/api/auth/change-password",
                token,
                json!({ "currentPassword": "wrong-one", "newPassword": "fresh-pass-1" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Current password is incorrect.");

        let (status, _) = call(
            &t.app,
            send(
                "PUT",
                "/api/auth/change-password",
                token,
                json!({ "currentPassword": "desk-pass-1", "newPassword": "fresh-pass-1" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn notify_reports_each_recipient() {
        let t = setup().await;
        let (status, body) = call(
            &t.app,
            send(
                "POST",
                "/api/notify",
                Some(&t.staff_token),
                json!({ "requests": [
                    { "contact": "+91 98765 43210", "displayName": "Asha" },
                    { "Contact": "919876543211", "Param": "Nobody" },
                ]}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["results"][0]["succeeded"], true);
        assert_eq!(body["results"][0]["sendOutcome"]["Contact"], "919876543210");
        assert_eq!(body["results"][0]["contactRegistrationOutcome"]["ApiResponse"], "Contact added");
        assert_eq!(body["results"][1]["succeeded"], false);
        assert_eq!(body["results"][1]["error"], "Invalid contact");

        let (status, body) = call(
            &t.app,
            send("POST", "/api/notify", Some(&t.staff_token), json!({ "requests": [] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "No recipients provided");
    }

    #[tokio::test]
    async fn malformed_json_bodies_get_the_error_envelope() {
        let t = setup().await;

        let (status, body) = call(
            &t.app,
            send("POST", "/api/notify", Some(&t.staff_token), json!({ "requests": "not-a-list" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, body) = call(
            &t.app,
            send("POST", "/api/auth/login", None, json!({ "loginId": "desk" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(body["error"]["message"].as_str().unwrap().contains("password"));

        let (status, body) = call(
            &t.app,
            send("PUT", "/api/auth/change-password", Some(&t.staff_token), json!({ "newPassword": 5 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }
}

mod accounts;
mod auth;
mod config;
mod middleware;
mod mobile;
mod notify;
mod patients;

mod db;
mod error;
mod models;
mod routes;

use std::sync::Arc;

use crate::{
    accounts::{AccountService, AccountStore, MemoryAccountStore, PgAccountStore},
    auth::SessionSigner,
    config::{Config, StoreBackend},
    models::AppState,
    notify::{Dispatcher, HttpGateway},
    patients::{MemoryPatientStore, PatientDirectory, PatientStore, PgPatientStore},
};

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use axum::http::{HeaderValue, header};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    tracing::debug!(config = ?cfg, "configuration loaded");

    let (patient_store, account_store): (Arc<dyn PatientStore>, Arc<dyn AccountStore>) =
        match cfg.backend {
            StoreBackend::Postgres => {
                let database_url = cfg
                    .database_url
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required"))?;
                let clinical_url = cfg.clinical_database_url.as_deref().unwrap_or(database_url);

                let accounts_pool = db::connect_pg(database_url).await?;
                let clinical_pool = db::connect_pg_read_only(clinical_url).await?;
                (
                    Arc::new(PgPatientStore::new(clinical_pool)),
                    Arc::new(PgAccountStore::new(accounts_pool)),
                )
            }
            StoreBackend::Memory => {
                tracing::warn!("STORE_BACKEND=memory: serving demo patients, accounts are not persisted");
                let today = chrono::Local::now().date_naive();
                (
                    Arc::new(MemoryPatientStore::demo(today)),
                    Arc::new(MemoryAccountStore::new()),
                )
            }
        };

    let accounts = AccountService::new(
        account_store,
        SessionSigner::new(cfg.session_secret.as_bytes(), cfg.session_ttl_hours),
    );

    if cfg.backend == StoreBackend::Memory {
        if let Some(password) = &cfg.demo_admin_password {
            accounts
                .register("Administrator", "admin", password, true)
                .await
                .map_err(|e| anyhow::anyhow!("seeding demo admin failed: {e}"))?;
            tracing::info!("demo admin account 'admin' created");
        }
    }

    let gateway = HttpGateway::new(cfg.whatsapp.timeout_secs)?;
    let state = AppState {
        patients: PatientDirectory::new(patient_store, cfg.default_country_code.clone()),
        accounts,
        dispatcher: Arc::new(Dispatcher::new(Arc::new(gateway), cfg.whatsapp.clone())),
    };

    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]);
    let cors = match &cfg.cors_origin {
        Some(origin) => cors.allow_origin(origin.parse::<HeaderValue>()?),
        None => cors.allow_origin(Any),
    };

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

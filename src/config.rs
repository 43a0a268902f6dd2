use std::env;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    /// Seeded in-process data, no database required.
    Memory,
}

#[derive(Clone)]
pub struct Config {
    pub bind_addr: String,
    pub backend: StoreBackend,
    pub database_url: Option<String>,
    pub clinical_database_url: Option<String>,
    pub session_secret: String,
    pub session_ttl_hours: i64,
    pub default_country_code: String,
    pub cors_origin: Option<String>,
    pub demo_admin_password: Option<String>,
    pub whatsapp: WhatsAppSettings,
}

/// Settings for the two remote messaging endpoints.
///
/// Every field is optional at start-up; the dispatcher checks the required
/// ones before each batch and refuses to send when any is missing.
#[derive(Clone, Default)]
pub struct WhatsAppSettings {
    pub send_url: Option<String>,
    pub contact_url: Option<String>,
    pub license_number: Option<String>,
    pub api_key: Option<String>,
    pub default_template: Option<String>,
    pub default_tag: Option<String>,
    pub timeout_secs: u64,
    pub concurrency: usize,
}

const MIN_SECRET_LEN: usize = 32;

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:5000".to_string());

        let backend = match env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "postgres" => StoreBackend::Postgres,
            "memory" => StoreBackend::Memory,
            other => anyhow::bail!("STORE_BACKEND must be postgres or memory, got {other}"),
        };

        let database_url = optional("DATABASE_URL");
        if backend == StoreBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL is required when STORE_BACKEND=postgres");
        }
        let clinical_database_url = optional("CLINICAL_DATABASE_URL").or_else(|| database_url.clone());

        let session_secret = env::var("SESSION_SECRET")
            .map_err(|_| anyhow::anyhow!("SESSION_SECRET is required"))?;
        if session_secret.len() < MIN_SECRET_LEN {
            anyhow::bail!("SESSION_SECRET must be at least {MIN_SECRET_LEN} bytes");
        }

        let session_ttl_hours = parsed("SESSION_TTL_HOURS").unwrap_or(24 * 7);

        let default_country_code = optional("DEFAULT_COUNTRY_CODE")
            .map(|c| c.trim_start_matches('+').to_string())
            .unwrap_or_else(|| "91".to_string());

        let whatsapp = WhatsAppSettings {
            send_url: optional("WA_API_BASE"),
            contact_url: optional("WA_CONTACT_API"),
            license_number: optional("LICENSE_NUMBER"),
            api_key: optional("API_KEY"),
            default_template: optional("TEMPLATE"),
            default_tag: optional("TAG"),
            timeout_secs: parsed("NOTIFY_TIMEOUT_SECS").unwrap_or(30),
            concurrency: parsed::<usize>("NOTIFY_CONCURRENCY").unwrap_or(1).max(1),
        };

        Ok(Self {
            bind_addr,
            backend,
            database_url,
            clinical_database_url,
            session_secret,
            session_ttl_hours,
            default_country_code,
            cors_origin: optional("CORS_ORIGIN"),
            demo_admin_password: optional("DEMO_ADMIN_PASSWORD"),
            whatsapp,
        })
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}

/// Replace the userinfo part of a connection string so it can be logged.
pub fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***:***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}

fn masked(v: &Option<String>) -> &'static str {
    if v.is_some() { "<set>" } else { "<unset>" }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_addr", &self.bind_addr)
            .field("backend", &self.backend)
            .field("database_url", &self.database_url.as_deref().map(redact_url))
            .field(
                "clinical_database_url",
                &self.clinical_database_url.as_deref().map(redact_url),
            )
            .field("session_secret", &"<redacted>")
            .field("session_ttl_hours", &self.session_ttl_hours)
            .field("default_country_code", &self.default_country_code)
            .field("cors_origin", &self.cors_origin)
            .field("whatsapp", &self.whatsapp)
            .finish()
    }
}

impl fmt::Debug for WhatsAppSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WhatsAppSettings")
            .field("send_url", &self.send_url)
            .field("contact_url", &self.contact_url)
            .field("license_number", &masked(&self.license_number))
            .field("api_key", &masked(&self.api_key))
            .field("default_template", &self.default_template)
            .field("default_tag", &self.default_tag)
            .field("timeout_secs", &self.timeout_secs)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHasher};
use sqlx::postgres::PgPoolOptions;

const USAGE: &str = "Usage: create_admin <login_id> <password> [display name]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_env_filter("info").init();

    let mut args = std::env::args().skip(1);
    let login_id = args.next().ok_or_else(|| anyhow::anyhow!(USAGE))?;
    let password = args.next().ok_or_else(|| anyhow::anyhow!(USAGE))?;
    let display_name = {
        let rest: Vec<String> = args.collect();
        if rest.is_empty() { "Administrator".to_string() } else { rest.join(" ") }
    };

    let login_id = login_id.trim();
    if login_id.len() < 3 {
        anyhow::bail!("login id must be at least 3 characters");
    }
    if password.trim().len() < 8 {
        anyhow::bail!("password must be at least 8 characters");
    }

    let database_url =
        std::env::var("DATABASE_URL").map_err(|_| anyhow::anyhow!("DATABASE_URL is required"))?;
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await?;

    let salt = SaltString::generate(&mut OsRng);
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("hash error: {e}"))?
        .to_string();

    let inserted = sqlx::query(
        r#"
        INSERT INTO staff_account (display_name, login_id, password_hash, is_active, is_admin)
        VALUES ($1, $2, $3, TRUE, TRUE)
        ON CONFLICT (login_id) DO NOTHING
        "#,
    )
    .bind(&display_name)
    .bind(login_id)
    .bind(&phc)
    .execute(&pool)
    .await?
    .rows_affected();

    if inserted == 0 {
        anyhow::bail!("login id '{login_id}' is already taken");
    }
    tracing::info!(login_id, "admin account created");
    Ok(())
}

use std::sync::Arc;

use anyhow::Context;

use crate::auth::{
    jwt::JwtKeys,
    password::{HashingError, PasswordCodec},
    repo::{PgUserStore, UserStore},
};
use crate::config::AppConfig;

/// Read-only after startup; cloned into every request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub keys: Arc<JwtKeys>,
    pub passwords: PasswordCodec,
    /// Verified against when a login names no account, so both failures cost one Argon2 run.
    pub dummy_hash: Arc<str>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        // Run migrations if present
        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }

        let users = Arc::new(PgUserStore::new(db)) as Arc<dyn UserStore>;
        Self::from_parts(config, users).context("hash login placeholder")
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
    ) -> Result<Self, HashingError> {
        let keys = Arc::new(JwtKeys::new(&config.jwt));
        let passwords = PasswordCodec::new(&config.password);
        let dummy_hash = passwords.hash("gatekeeper-placeholder")?.into();
        Ok(Self {
            config,
            users,
            keys,
            passwords,
            dummy_hash,
        })
    }

    #[cfg(test)]
    pub fn fake() -> (Self, Arc<crate::auth::memory::MemoryUserStore>) {
        let store = Arc::new(crate::auth::memory::MemoryUserStore::new());
        let state = Self::from_parts(
            Arc::new(AppConfig::for_tests()),
            store.clone() as Arc<dyn UserStore>,
        )
        .expect("test state");
        (state, store)
    }
}

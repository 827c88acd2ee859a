use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::{info, instrument, warn};

use crate::env::AppConfig;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialRole {
    ServiceRole,
    Anon,
}

/// A pool chosen for one request, tagged with the credentials it runs under.
#[derive(Debug, Clone, Copy)]
pub struct Credentialed<'a> {
    pool: &'a SqlitePool,
    role: CredentialRole,
}

impl<'a> Credentialed<'a> {
    pub fn pool(&self) -> &'a SqlitePool {
        self.pool
    }

    pub fn role(&self) -> CredentialRole {
        self.role
    }

    pub fn using_service_role(&self) -> bool {
        self.role == CredentialRole::ServiceRole
    }
}

/// Picks the privileged pool while it works and falls back to the restricted
/// pool for the rest of the process once it has failed.
#[derive(Debug)]
pub struct ClientSelector {
    privileged: Option<SqlitePool>,
    restricted: SqlitePool,
    downgraded: AtomicBool,
    warned: AtomicBool,
}

impl ClientSelector {
    pub fn new(privileged: Option<SqlitePool>, restricted: SqlitePool) -> Self {
        Self {
            privileged,
            restricted,
            downgraded: AtomicBool::new(false),
            warned: AtomicBool::new(false),
        }
    }

    #[instrument(skip_all)]
    pub async fn connect(config: &AppConfig) -> Result<Self, AppError> {
        let restricted = SqlitePoolOptions::new()
            .connect(&config.database_url)
            .await?;

        let privileged = match &config.service_database_url {
            Some(url) => match SqlitePoolOptions::new().connect(url).await {
                Ok(pool) => {
                    info!("Connected with service role credentials");
                    Some(pool)
                }
                Err(e) => {
                    warn!(error = %e, "Service role connection failed at startup");
                    None
                }
            },
            None => None,
        };

        Ok(Self::new(privileged, restricted))
    }

    /// Pool that schema migrations run against.
    pub fn migration_pool(&self) -> &SqlitePool {
        match &self.privileged {
            Some(pool) if !self.is_downgraded() => pool,
            _ => &self.restricted,
        }
    }

    #[instrument(skip(self))]
    pub async fn select(&self) -> Credentialed<'_> {
        if !self.is_downgraded() {
            match &self.privileged {
                Some(pool) => match pool.acquire().await {
                    Ok(_probe) => {
                        return Credentialed {
                            pool,
                            role: CredentialRole::ServiceRole,
                        };
                    }
                    Err(e) => self.downgrade(&e.to_string()),
                },
                None => self.downgrade("no service role credentials configured"),
            }
        }

        Credentialed {
            pool: &self.restricted,
            role: CredentialRole::Anon,
        }
    }

    pub fn is_downgraded(&self) -> bool {
        self.downgraded.load(Ordering::Acquire)
    }

    fn downgrade(&self, reason: &str) {
        self.downgraded.store(true, Ordering::Release);

        if !self.warned.swap(true, Ordering::AcqRel) {
            warn!(reason = %reason, "Falling back to restricted database credentials");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[rocket::async_test]
    async fn prefers_service_role_while_it_works() {
        let selector = ClientSelector::new(Some(memory_pool().await), memory_pool().await);

        let first = selector.select().await;
        assert!(first.using_service_role());
        let second = selector.select().await;
        assert_eq!(second.role(), CredentialRole::ServiceRole);
        assert!(!selector.is_downgraded());
    }

    #[rocket::async_test]
    async fn missing_service_role_uses_anon() {
        let selector = ClientSelector::new(None, memory_pool().await);

        assert!(!selector.select().await.using_service_role());
        assert!(selector.is_downgraded());
    }

    #[rocket::async_test]
    async fn downgrade_is_permanent_after_first_failure() {
        let privileged = memory_pool().await;
        let selector = ClientSelector::new(Some(privileged.clone()), memory_pool().await);

        privileged.close().await;

        assert_eq!(selector.select().await.role(), CredentialRole::Anon);
        assert!(selector.is_downgraded());

        for _ in 0..3 {
            assert!(!selector.select().await.using_service_role());
        }
        assert!(std::ptr::eq(
            selector.migration_pool(),
            &selector.restricted
        ));
    }
}

//! Establishing the database connection, with exponential backoff.
use crate::configuration::DatabaseSettings;
use crate::utils::error_chain_fmt;
use sqlx::{Connection, MySqlConnection};
use std::future::Future;
use std::time::Duration;

/// How often to try, and how long to wait between tries.
///
/// The wait before retry `n` (counted from 0) is `base_delay * 2^n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl BackoffPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(1))
    }
}

#[derive(thiserror::Error)]
pub enum ConnectionError {
    #[error("Failed to connect to the database after {attempts} attempts.")]
    Exhausted {
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },
}

impl std::fmt::Debug for ConnectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// Runs `operation` until it succeeds or `policy.max_attempts()` tries have
/// failed, in which case the last error is returned.
pub async fn retry_with_backoff<F, Fut, T, E>(policy: &BackoffPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 < policy.max_attempts() => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    error.message = %e,
                    "Attempt {}/{} failed, retrying in {}ms",
                    attempt + 1,
                    policy.max_attempts(),
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(
                    error.message = %e,
                    "Attempt {}/{} failed, giving up",
                    attempt + 1,
                    policy.max_attempts()
                );
                return Err(e);
            }
        }
    }
}

#[tracing::instrument(
    name = "Connecting to the database",
    skip(settings, policy),
    fields(
        db_host = %settings.host,
        db_name = %settings.database_name
    )
)]
pub async fn connect_with_retry(
    settings: &DatabaseSettings,
    policy: &BackoffPolicy,
) -> Result<MySqlConnection, ConnectionError> {
    let options = settings.connect_options();
    retry_with_backoff(policy, || MySqlConnection::connect_with(&options))
        .await
        .map_err(|source| ConnectionError::Exhausted {
            attempts: policy.max_attempts(),
            source,
        })
}

#[tracing::instrument(name = "Running database migrations", skip(connection))]
pub async fn run_migrations(
    connection: &mut MySqlConnection,
) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(connection).await
}

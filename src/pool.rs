//! Connection pooling for FTP clients using bb8

use crate::client::FtpClient;
use crate::config::ClientConfig;
use crate::error::{FtpError, Result};
use bb8::{Pool, PooledConnection};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for connection retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial backoff duration in milliseconds
    pub initial_backoff_ms: u64,
    /// Maximum backoff duration in milliseconds
    pub max_backoff_ms: u64,
    /// Backoff multiplier (exponential factor)
    pub backoff_multiplier: f64,
    /// Whether to add jitter to prevent thundering herd
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a retry config with no retries (fail fast)
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Create a retry config with custom max retries
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }
}

/// Connection manager for the bb8 pool
pub struct FtpConnectionManager {
    config: Arc<ClientConfig>,
}

impl FtpConnectionManager {
    /// Create a new connection manager
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

#[async_trait::async_trait]
impl bb8::ManageConnection for FtpConnectionManager {
    type Connection = FtpClient;
    type Error = FtpError;

    async fn connect(&self) -> Result<Self::Connection> {
        let mut client = FtpClient::connect(self.config.clone()).await?;
        client.login().await?;
        Ok(client)
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> Result<()> {
        conn.noop().await.map(|_| ())
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.is_broken()
    }
}

/// FTP connection pool with retry support
///
/// Provides connection pooling with:
/// - Automatic connection creation and login
/// - Exponential backoff with jitter on failures
/// - Broken connection detection and removal
///
/// # Example
///
/// ```no_run
/// use ftp_rs::{FtpPool, ClientConfig, RetryConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ClientConfig::ftps("ftp.example.com", "user", "pass");
///
/// // Create pool with 10 connections and default retry config
/// let pool = FtpPool::new(config.clone(), 10).await?;
///
/// // Or with custom retry config
/// let retry_config = RetryConfig {
///     max_retries: 5,
///     initial_backoff_ms: 200,
///     ..Default::default()
/// };
/// let pool = FtpPool::with_retry_config(config, 10, retry_config).await?;
///
/// // Get connection from pool
/// let mut conn = pool.get().await?;
/// conn.pwd().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FtpPool {
    pool: Pool<FtpConnectionManager>,
    retry_config: RetryConfig,
}

impl FtpPool {
    /// Create a new FTP connection pool with default retry configuration
    ///
    /// # Arguments
    ///
    /// * `config` - Server configuration
    /// * `max_size` - Maximum number of connections in the pool
    pub async fn new(config: ClientConfig, max_size: u32) -> Result<Self> {
        Self::with_retry_config(config, max_size, RetryConfig::default()).await
    }

    /// Create a new FTP connection pool with custom retry configuration
    pub async fn with_retry_config(
        config: ClientConfig,
        max_size: u32,
        retry_config: RetryConfig,
    ) -> Result<Self> {
        debug!(
            "Creating FTP connection pool for {}:{} (max size: {}, max retries: {})",
            config.host, config.port, max_size, retry_config.max_retries
        );

        let manager = FtpConnectionManager::new(config);
        let pool = Pool::builder()
            .max_size(max_size)
            // Allows for slow control-channel handshakes and AUTH TLS negotiation
            .connection_timeout(Duration::from_secs(120))
            .idle_timeout(Some(Duration::from_secs(300)))
            .build(manager)
            .await
            .map_err(run_error_to_ftp_error)?;

        Ok(Self { pool, retry_config })
    }

    /// Get a connection from the pool with automatic retry on failure
    ///
    /// Uses exponential backoff with optional jitter to prevent thundering herd
    /// when multiple clients retry simultaneously.
    ///
    /// # Errors
    ///
    /// Returns the last observed error if all retry attempts fail. The
    /// underlying error may be a connection failure, login failure, or pool
    /// exhaustion timeout.
    pub async fn get(&self) -> Result<PooledConnection<'_, FtpConnectionManager>> {
        let mut last_error = None;
        let mut backoff_ms = self.retry_config.initial_backoff_ms;

        for attempt in 0..=self.retry_config.max_retries {
            match self.pool.get().await {
                Ok(conn) => return Ok(conn),
                Err(e) => {
                    let err = run_error_to_ftp_error(e);

                    if attempt < self.retry_config.max_retries {
                        let sleep_ms = if self.retry_config.jitter {
                            let jitter = rand::thread_rng().gen_range(0..=(backoff_ms / 2));
                            backoff_ms + jitter
                        } else {
                            backoff_ms
                        };

                        warn!(
                            "Failed to get connection from pool (attempt {}/{}), retrying in {}ms: {}",
                            attempt + 1,
                            self.retry_config.max_retries + 1,
                            sleep_ms,
                            err
                        );

                        last_error = Some(err);
                        tokio::time::sleep(Duration::from_millis(sleep_ms)).await;

                        backoff_ms = std::cmp::min(
                            (backoff_ms as f64 * self.retry_config.backoff_multiplier) as u64,
                            self.retry_config.max_backoff_ms,
                        );
                    } else {
                        last_error = Some(err);
                    }
                }
            }
        }

        Err(last_error.unwrap_or(FtpError::Timeout))
    }

    /// Get a connection without retry (for cases where the caller handles retry)
    pub async fn get_no_retry(&self) -> Result<PooledConnection<'_, FtpConnectionManager>> {
        self.pool.get().await.map_err(run_error_to_ftp_error)
    }

    /// Get current pool state (for monitoring)
    pub fn state(&self) -> bb8::State {
        self.pool.state()
    }

    /// Get the number of connections currently in use
    pub fn connections_in_use(&self) -> u32 {
        let state = self.pool.state();
        state.connections - state.idle_connections
    }

    /// Get the number of idle connections available
    pub fn idle_connections(&self) -> u32 {
        self.pool.state().idle_connections
    }
}

fn run_error_to_ftp_error(err: bb8::RunError<FtpError>) -> FtpError {
    match err {
        bb8::RunError::User(e) => e,
        bb8::RunError::TimedOut => FtpError::Timeout,
    }
}

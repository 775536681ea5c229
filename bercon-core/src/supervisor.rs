//! Per-operation session lifecycle.
//!
//! Every operation gets a fresh [`RconConnection`]: resolve parameters,
//! connect (retrying transient failures), run, disconnect. The disconnect
//! happens on every path, including errors raised by the operation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::be_config::ConfigResolver;
use crate::client::{ClientOptions, ConnectionReport, KickSummary, Player, RconClient};
use crate::error::RconError;
use crate::network::{ConnectionOptions, ConnectionParams, RconConnection};
use crate::registry::ServerConfigProvider;

/// Connection and retry tunables for the supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    pub connection: ConnectionOptions,
    pub client: ClientOptions,
    /// Extra connect attempts after a retryable failure.
    pub connect_retries: u32,
    /// Base backoff; attempt `n` waits `n * retry_backoff`.
    pub retry_backoff: Duration,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            connection: ConnectionOptions::default(),
            client: ClientOptions::default(),
            connect_retries: 1,
            retry_backoff: Duration::from_secs(1),
        }
    }
}

#[derive(Clone)]
pub struct RconSupervisor {
    provider: Arc<dyn ServerConfigProvider>,
    resolver: ConfigResolver,
    options: SupervisorOptions,
}

impl RconSupervisor {
    pub fn new(provider: Arc<dyn ServerConfigProvider>, resolver: ConfigResolver) -> Self {
        Self::with_options(provider, resolver, SupervisorOptions::default())
    }

    pub fn with_options(
        provider: Arc<dyn ServerConfigProvider>,
        resolver: ConfigResolver,
        options: SupervisorOptions,
    ) -> Self {
        Self {
            provider,
            resolver,
            options,
        }
    }

    pub fn options(&self) -> &SupervisorOptions {
        &self.options
    }

    /// Resolve, connect and hand an authenticated client to `op`.
    ///
    /// Connect failures surface as [`RconError::ServerOffline`]; the
    /// operation's own errors pass through unchanged.
    pub async fn run<F, Fut, R>(&self, server_id: &str, op: F) -> Result<R, RconError>
    where
        F: FnOnce(Arc<RconClient>) -> Fut,
        Fut: Future<Output = Result<R, RconError>>,
    {
        let params = self.resolve(server_id).await?;
        self.run_on(params, op).await
    }

    /// Connection parameters for a registered server.
    pub async fn resolve(&self, server_id: &str) -> Result<ConnectionParams, RconError> {
        let record = self.provider.server_record(server_id).await?;
        let params = self.resolver.resolve(&record)?;
        debug!(server_id, endpoint = %params, "resolved RCon endpoint");
        Ok(params)
    }

    /// Same lifecycle as [`run`](Self::run) against explicit parameters.
    pub async fn run_on<F, Fut, R>(&self, params: ConnectionParams, op: F) -> Result<R, RconError>
    where
        F: FnOnce(Arc<RconClient>) -> Fut,
        Fut: Future<Output = Result<R, RconError>>,
    {
        let client = Arc::new(self.open(params).await?);
        let result = op(Arc::clone(&client)).await;
        client.disconnect().await;
        debug!(endpoint = %client.transport().params(), ok = result.is_ok(), "operation finished");
        result
    }

    async fn open(&self, params: ConnectionParams) -> Result<RconClient, RconError> {
        let connection = RconConnection::with_options(params, self.options.connection.clone());
        let client = RconClient::with_options(connection, self.options.client.clone());
        let endpoint = client.transport().params().to_string();

        let mut attempt = 0;
        loop {
            match client.connect().await {
                Ok(()) => return Ok(client),
                Err(e) if e.is_retryable() && attempt < self.options.connect_retries => {
                    attempt += 1;
                    let backoff = self.options.retry_backoff * attempt;
                    warn!(%endpoint, attempt, error = %e, ?backoff, "connect failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    client.disconnect().await;
                    warn!(%endpoint, error = %e, "server unreachable");
                    return Err(RconError::ServerOffline(Box::new(e)));
                }
            }
        }
    }

    // ── Convenience operations ───────────────────────────────────

    pub async fn players(&self, server_id: &str) -> Result<Vec<Player>, RconError> {
        self.run(server_id, |client| async move { client.list_players().await })
            .await
    }

    pub async fn broadcast(&self, server_id: &str, message: &str) -> Result<String, RconError> {
        self.run(server_id, |client| async move { client.broadcast(message).await })
            .await
    }

    pub async fn execute(&self, server_id: &str, command: &str) -> Result<String, RconError> {
        self.run(server_id, |client| async move { client.execute(command).await })
            .await
    }

    pub async fn kick_all(&self, server_id: &str, reason: &str) -> Result<KickSummary, RconError> {
        self.run(server_id, |client| async move { client.kick_all(reason).await })
            .await
    }

    pub async fn test_connection(&self, server_id: &str) -> Result<ConnectionReport, RconError> {
        self.run(server_id, |client| async move { client.test_connection().await })
            .await
    }

    /// Broadcast to several servers at once, one task per server.
    /// Results come back in `server_ids` order.
    pub async fn broadcast_all(
        &self,
        server_ids: &[String],
        message: &str,
    ) -> Vec<(String, Result<String, RconError>)> {
        let mut tasks = JoinSet::new();
        for (index, server_id) in server_ids.iter().enumerate() {
            let supervisor = self.clone();
            let server_id = server_id.clone();
            let message = message.to_string();
            tasks.spawn(async move {
                let result = supervisor.broadcast(&server_id, &message).await;
                (index, server_id, result)
            });
        }

        let mut results = Vec::with_capacity(server_ids.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => results.push(outcome),
                Err(e) => warn!(error = %e, "broadcast task aborted"),
            }
        }
        results.sort_by_key(|(index, _, _)| *index);

        let delivered = results.iter().filter(|(_, _, r)| r.is_ok()).count();
        info!(delivered, total = server_ids.len(), "broadcast finished");
        results
            .into_iter()
            .map(|(_, server_id, result)| (server_id, result))
            .collect()
    }
}

//! Authenticated request gateway
//!
//! Dispatches portal API requests with the stored access credential and
//! owns the credential-refresh state machine. The machine has two states:
//! idle, and refreshing. The first request to observe a 401 flips
//! `in_flight` and issues the one refresh call; every 401 observed while
//! that call is pending parks its request as a waiter instead of issuing
//! another. When the refresh settles the state is reset first, then every
//! waiter is resubmitted once (on success) or rejected (on failure).
//!
//! `in_flight` is flipped and the failing request enqueued inside a single
//! critical section, so two near-simultaneous 401s can never both start a
//! refresh. The state mutex is only ever held for those synchronous
//! transitions, never across a network call.
//!
//! Requests parked as waiters always settle; there is no caller-initiated
//! abort path. A request that fails with 401 after its post-refresh retry
//! is surfaced to its caller directly and never re-queued, so no request
//! loops through the machine twice.

use std::sync::Arc;
use std::time::Instant;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::Value;
use tokio::sync::{Mutex, broadcast, oneshot};
use tracing::{debug, info, instrument, warn};

use portal_auth::{CredentialStore, FileStore, MemoryStore, REFRESH_PATH, TokenResponse};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::{SessionEvent, SessionEvents};
use crate::metrics;
use crate::request::RequestDescription;
use crate::transport::{HttpTransport, Transport, TransportError};

/// A request parked behind the in-flight refresh: the original
/// description to resubmit and the channel its caller is awaiting.
struct Waiter {
    request: RequestDescription,
    done: oneshot::Sender<Result<Value>>,
}

/// Refresh machine state. `in_flight` is true from the first observed 401
/// until the refresh call settles; `waiters` holds every request parked
/// in that window, in arrival order.
#[derive(Default)]
struct RefreshState {
    in_flight: bool,
    waiters: Vec<Waiter>,
}

/// Authenticated request gateway for the portal API.
///
/// Cheap to share behind an `Arc`; all methods take `&self`. The
/// credential store is the single source of truth for tokens: the
/// gateway reads the access token at request time and writes both tokens
/// back after a refresh.
pub struct Gateway {
    transport: Arc<dyn Transport>,
    store: Arc<dyn CredentialStore>,
    refresh: Mutex<RefreshState>,
    events: SessionEvents,
}

impl Gateway {
    pub fn new(transport: Arc<dyn Transport>, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            transport,
            store,
            refresh: Mutex::new(RefreshState::default()),
            events: SessionEvents::new(),
        }
    }

    /// Wire a gateway from configuration: reqwest transport against
    /// `api.base_url`, file-backed credentials when `credentials.file` is
    /// set (in-memory otherwise), and the bootstrap refresh token seeded
    /// into a store that doesn't already hold one.
    pub async fn from_config(config: &Config) -> portal_auth::Result<Self> {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::from_config(&config.api));
        let store: Arc<dyn CredentialStore> = match &config.credentials.file {
            Some(path) => Arc::new(FileStore::load(path.clone()).await?),
            None => Arc::new(MemoryStore::new()),
        };
        if let Some(bootstrap) = &config.credentials.bootstrap_refresh {
            if store.refresh().await.is_none() {
                store.set_refresh(bootstrap.expose().clone()).await?;
            }
        }
        Ok(Self::new(transport, store))
    }

    /// Send one request to the portal API.
    ///
    /// Attaches the current access credential, dispatches, and returns the
    /// parsed response body. A 401 on the first attempt enters the refresh
    /// machine; every other failure is surfaced immediately as an
    /// [`Error`].
    pub async fn send(&self, request: RequestDescription) -> Result<Value> {
        let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
        self.send_inner(request, &request_id).await
    }

    #[instrument(skip_all, fields(request_id = %request_id, method = %request.method, path = %request.path))]
    async fn send_inner(&self, request: RequestDescription, request_id: &str) -> Result<Value> {
        let started = Instant::now();
        let method = request.method.clone();

        let result = self.attempt(request).await;

        metrics::record_request(method.as_str(), outcome_label(&result), started.elapsed());
        result
    }

    async fn attempt(&self, request: RequestDescription) -> Result<Value> {
        let access = self.store.access().await;
        let headers = bearer_headers(access.as_deref())?;

        match self.transport.execute(&request, headers).await {
            Ok(body) => Ok(body),
            Err(TransportError::Status { status: 401, .. }) => {
                debug!("access credential rejected, entering refresh path");
                self.refresh_and_retry(request).await
            }
            Err(other) => Err(Error::from(other)),
        }
    }

    /// Park the failing request and drive (or wait out) the single
    /// in-flight refresh.
    async fn refresh_and_retry(&self, request: RequestDescription) -> Result<Value> {
        let (done, outcome) = oneshot::channel();

        // Enqueue and claim leadership in one critical section: whichever
        // request finds the machine idle flips in_flight before anything
        // can suspend, so at most one refresh call is ever issued.
        let leader = {
            let mut state = self.refresh.lock().await;
            state.waiters.push(Waiter { request, done });
            if state.in_flight {
                debug!(queued = state.waiters.len(), "refresh already in flight, parked as waiter");
                false
            } else {
                state.in_flight = true;
                true
            }
        };

        if leader {
            let refreshed = self.run_refresh().await;

            // Reset the machine before settling anyone, so a 401 arriving
            // during the retries starts a fresh cycle instead of joining a
            // finished one.
            let waiters = {
                let mut state = self.refresh.lock().await;
                state.in_flight = false;
                std::mem::take(&mut state.waiters)
            };
            self.settle_waiters(waiters, refreshed);
        }

        // The leader's own request is waiters[0]; its outcome arrives on
        // the channel like everyone else's.
        outcome
            .await
            .unwrap_or_else(|_| Err(Error::Request("refresh settled without an outcome".into())))
    }

    /// Issue the one refresh call and persist its result.
    ///
    /// Any failure here is terminal for the session: the store is cleared
    /// and the unauthorized event fires exactly once, however many
    /// requests are parked.
    async fn run_refresh(&self) -> Result<String> {
        let outcome = match self.store.refresh().await {
            Some(refresh) => self.call_refresh_endpoint(refresh).await,
            None => Err(Error::Http {
                status: 401,
                message: "no refresh credential available".into(),
                details: None,
            }),
        };

        match outcome {
            Ok(access) => {
                metrics::record_refresh("success");
                Ok(access)
            }
            Err(err) => {
                warn!(error = %err, "credential refresh failed, invalidating session");
                metrics::record_refresh("failure");
                if let Err(e) = self.store.clear().await {
                    warn!(error = %e, "failed to clear credential store");
                }
                self.events.emit_unauthorized();
                metrics::record_session_invalidated();
                Err(err)
            }
        }
    }

    /// POST the refresh token to the refresh endpoint and store the new
    /// tokens.
    ///
    /// The refresh request carries the refresh token in its body and no
    /// authorization header; a 401 from this endpoint is a terminal
    /// refresh failure, never a trigger for another refresh.
    async fn call_refresh_endpoint(&self, refresh: String) -> Result<String> {
        let request = RequestDescription::post(REFRESH_PATH)
            .json(serde_json::json!({ "refreshToken": refresh }));

        let body = self
            .transport
            .execute(&request, HeaderMap::new())
            .await
            .map_err(Error::from)?;
        let token: TokenResponse = serde_json::from_value(body)
            .map_err(|e| Error::Request(format!("malformed refresh response: {e}")))?;

        // A persist failure leaves the new tokens live in this process;
        // the next refresh will write them again.
        if let Err(e) = self.store.set_access(token.access_token.clone()).await {
            warn!(error = %e, "failed to persist refreshed access token");
        }
        if let Some(rotated) = token.refresh_token {
            if let Err(e) = self.store.set_refresh(rotated).await {
                warn!(error = %e, "failed to persist rotated refresh token");
            }
        }
        info!("access credential refreshed");
        Ok(token.access_token)
    }

    /// Settle every parked request: resubmit each once with the new token,
    /// or reject each with the refresh failure.
    ///
    /// Resubmissions are spawned in arrival order but run independently,
    /// so they may complete out of order; each caller only ever observes
    /// its own outcome.
    fn settle_waiters(&self, waiters: Vec<Waiter>, refreshed: Result<String>) {
        match refreshed {
            Ok(token) => {
                info!(waiters = waiters.len(), "resubmitting requests parked behind refresh");
                for Waiter { request, done } in waiters {
                    let transport = Arc::clone(&self.transport);
                    let token = token.clone();
                    tokio::spawn(async move {
                        let result = resubmit(transport, request, &token).await;
                        // The receiver is gone only if the caller was
                        // dropped; the retry outcome is then discarded.
                        let _ = done.send(result);
                    });
                }
            }
            Err(err) => {
                warn!(waiters = waiters.len(), "rejecting requests parked behind failed refresh");
                for waiter in waiters {
                    let _ = waiter.done.send(Err(err.clone()));
                }
            }
        }
    }

    /// Replace the access credential used for all subsequent requests.
    /// Idempotent. Concurrent with an in-flight refresh this is
    /// last-write-wins.
    pub async fn set_credential(&self, access: impl Into<String>) -> portal_auth::Result<()> {
        self.store.set_access(access.into()).await
    }

    /// Remove the access and refresh credential. Used on logout; an
    /// irrecoverable refresh failure does the same internally.
    pub async fn clear_credential(&self) -> portal_auth::Result<()> {
        self.store.clear().await
    }

    /// Subscribe to session lifecycle events. `Unauthorized` fires once
    /// per irrecoverable refresh failure.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

/// Resubmit a parked request with the refreshed credential. A second 401
/// here is surfaced to the caller as-is; retried requests never re-enter
/// the refresh queue.
async fn resubmit(
    transport: Arc<dyn Transport>,
    request: RequestDescription,
    token: &str,
) -> Result<Value> {
    let headers = bearer_headers(Some(token))?;
    transport
        .execute(&request, headers)
        .await
        .map_err(Error::from)
}

/// Build the authorization headers for one dispatch.
fn bearer_headers(access: Option<&str>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    if let Some(token) = access {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| Error::Request(format!("invalid access credential: {e}")))?;
        headers.insert(AUTHORIZATION, value);
    }
    Ok(headers)
}

fn outcome_label(result: &Result<Value>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(Error::Network(_)) => "network",
        Err(Error::Http { .. }) => "http",
        Err(Error::Request(_)) => "request",
    }
}

//! Single-flight credential cache.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info, warn};

use super::{
    AUTHENTICATION_TYPE, CredentialError, CredentialScope, RealtimeCredential, RequestSigner,
};

/// How long a credential may be reused, measured from the start of its
/// generation.
pub const DEFAULT_FRESHNESS: Duration = Duration::from_secs(60);

type Generation = Shared<BoxFuture<'static, Result<RealtimeCredential, CredentialError>>>;

/// Observable generation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    /// Nothing cached and nothing in flight
    Inactive,
    /// A generation is in flight
    Creating,
    /// A credential is cached (it may since have gone stale)
    Active,
}

enum Slot {
    Inactive,
    Creating {
        id: u64,
        scope: CredentialScope,
        started: Instant,
        generation: Generation,
    },
    Active {
        credential: RealtimeCredential,
        started: Instant,
    },
}

/// Produces and caches session credentials.
///
/// At most one generation is in flight at a time: callers arriving while
/// one runs await the same result. A cached credential is reused until it
/// is older than the freshness window or was made for a different scope.
/// A failed generation leaves the cache empty and is not retried; the next
/// caller starts a new one.
///
/// Share one cache between sessions with `Arc<CredentialCache>`.
pub struct CredentialCache {
    signer: Arc<dyn RequestSigner>,
    freshness: Duration,
    slot: Arc<Mutex<Slot>>,
    generations: AtomicU64,
}

impl CredentialCache {
    pub fn new(signer: Arc<dyn RequestSigner>) -> Self {
        Self::with_freshness(signer, DEFAULT_FRESHNESS)
    }

    pub fn with_freshness(signer: Arc<dyn RequestSigner>, freshness: Duration) -> Self {
        Self {
            signer,
            freshness,
            slot: Arc::new(Mutex::new(Slot::Inactive)),
            generations: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> CredentialState {
        match &*self.slot.lock() {
            Slot::Inactive => CredentialState::Inactive,
            Slot::Creating { .. } => CredentialState::Creating,
            Slot::Active { .. } => CredentialState::Active,
        }
    }

    /// Number of generations started so far.
    pub fn generation_count(&self) -> u64 {
        self.generations.load(Ordering::Relaxed)
    }

    /// Return a credential for `scope` that is younger than the freshness
    /// window, generating one if needed.
    ///
    /// The generation runs on its own task, so it completes and populates
    /// the cache even if every caller stops waiting.
    pub async fn ensure_fresh(
        &self,
        scope: &CredentialScope,
    ) -> Result<RealtimeCredential, CredentialError> {
        let generation = {
            let mut slot = self.slot.lock();
            match &*slot {
                Slot::Active {
                    credential,
                    started,
                } if credential.scope() == *scope && started.elapsed() < self.freshness => {
                    return Ok(credential.clone());
                }
                Slot::Creating {
                    scope: in_flight,
                    started,
                    generation,
                    ..
                } if in_flight == scope && started.elapsed() < self.freshness => {
                    debug!("Awaiting in-flight credential generation");
                    generation.clone()
                }
                _ => {
                    let (creating, generation) = self.start_generation(scope.clone());
                    *slot = creating;
                    generation
                }
            }
        };

        generation.await
    }

    /// Build the slot for a new generation and the future awaiting it.
    fn start_generation(&self, scope: CredentialScope) -> (Slot, Generation) {
        let id = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let started = Instant::now();
        info!(
            generation = id,
            endpoint = %scope.endpoint,
            "Generating realtime credential"
        );

        let signer = Arc::clone(&self.signer);
        let task_slot = Arc::clone(&self.slot);
        let task_scope = scope.clone();
        let handle = tokio::spawn(async move {
            let result = generate(signer.as_ref(), &task_scope).await;
            settle(&task_slot, id, started, &result);
            result
        });

        let abort_slot = Arc::clone(&self.slot);
        let generation = async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => {
                    let err = CredentialError::GenerationAborted(e.to_string());
                    settle(&abort_slot, id, started, &Err(err.clone()));
                    Err(err)
                }
            }
        }
        .boxed()
        .shared();

        let slot = Slot::Creating {
            id,
            scope,
            started,
            generation: generation.clone(),
        };
        (slot, generation)
    }
}

/// Record the outcome of generation `id`, unless a newer one replaced it.
fn settle(
    slot: &Mutex<Slot>,
    id: u64,
    started: Instant,
    result: &Result<RealtimeCredential, CredentialError>,
) {
    let mut slot = slot.lock();
    if !matches!(&*slot, Slot::Creating { id: current, .. } if *current == id) {
        return;
    }
    *slot = match result {
        Ok(credential) => {
            info!(generation = id, "Realtime credential ready");
            Slot::Active {
                credential: credential.clone(),
                started,
            }
        }
        Err(e) => {
            warn!(generation = id, error = %e, "Realtime credential generation failed");
            Slot::Inactive
        }
    };
}

async fn generate(
    signer: &dyn RequestSigner,
    scope: &CredentialScope,
) -> Result<RealtimeCredential, CredentialError> {
    let (uri, host) = scope.request_target()?;
    let request = http::Request::get(uri.as_str())
        .body(())
        .map_err(|e| CredentialError::InvalidEndpoint(e.to_string()))?;

    let mut headers = signer.sign(&request).await?;
    headers.insert("host".to_string(), host);
    headers.insert("uri".to_string(), uri);

    Ok(RealtimeCredential {
        authentication_type: AUTHENTICATION_TYPE.to_string(),
        compartment_id: scope.compartment_id.clone(),
        headers,
        created_at: SystemTime::now(),
        endpoint: scope.endpoint.clone(),
    })
}

//! Lifespan resource scopes.
//!
//! A tool server acquires its shared, expensive resources (a pooled HTTP
//! client, an API credential) once when the scope opens and releases them
//! once when it closes. Handlers reach the resources through the
//! [`RequestContext`](super::context::RequestContext) while the scope is open.
//!
//! ```text
//! Unopened ──open()──▶ Open ──close()──▶ Closed
//!     └──────open() fails──────────────▶ Closed
//! ```
//!
//! Closing first cancels every invocation still running against the scope
//! and waits for it to be dropped, so no handle outlives the scope.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tokio_util::task::task_tracker::TaskTrackerToken;
use tracing::{debug, info, warn};

/// Errors raised while opening or closing a lifespan scope.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LifespanError {
    /// A required setting or credential is absent.
    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    /// A resource could not be constructed.
    #[error("Resource acquisition failed: {0}")]
    Acquire(String),

    /// A resource could not be released cleanly.
    #[error("Resource release failed: {0}")]
    Release(String),

    /// `open` was called on a scope that is already open.
    #[error("Lifespan scope is already open")]
    AlreadyOpen,

    /// `open` was called on a scope that has reached its terminal state.
    #[error("Lifespan scope is closed")]
    Closed,
}

impl LifespanError {
    /// Create a new "missing configuration" error.
    pub fn missing_configuration(msg: impl Into<String>) -> Self {
        Self::MissingConfiguration(msg.into())
    }

    /// Create a new "acquire" error.
    pub fn acquire(msg: impl Into<String>) -> Self {
        Self::Acquire(msg.into())
    }

    /// Create a new "release" error.
    pub fn release(msg: impl Into<String>) -> Self {
        Self::Release(msg.into())
    }

    /// Stable error kind reported in logs and startup failures.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingConfiguration(_) => "MissingConfigurationError",
            Self::Acquire(_) => "ResourceAcquisitionError",
            Self::Release(_) => "ResourceReleaseError",
            Self::AlreadyOpen | Self::Closed => "LifespanStateError",
        }
    }
}

/// Named resource handles acquired by a [`Lifespan`].
///
/// Handles are stored type-erased and retrieved by name and type, so each
/// server can keep whatever client types it needs.
#[derive(Default)]
pub struct Resources {
    handles: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Resources {
    /// Create an empty resource map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a handle under `name`, replacing any previous one.
    pub fn insert<T>(&mut self, name: impl Into<String>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.handles.insert(name.into(), Arc::new(value));
    }

    /// Fetch the handle stored under `name` if it has type `T`.
    pub fn get<T>(&self, name: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.handles.get(name)?.clone().downcast::<T>().ok()
    }

    /// Whether a handle is stored under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.handles.contains_key(name)
    }

    /// Names of all stored handles, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.handles.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl std::fmt::Debug for Resources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Handles may hold credentials; only the names are printed.
        f.debug_struct("Resources")
            .field("names", &self.names())
            .finish()
    }
}

/// Acquisition and release of a server's shared resources.
#[async_trait]
pub trait Lifespan: Send + Sync {
    /// Acquire resources into `resources`.
    ///
    /// On error, whatever was already inserted is handed to [`close`](Self::close).
    async fn open(&self, resources: &mut Resources) -> Result<(), LifespanError>;

    /// Release the acquired resources.
    ///
    /// Handles are dropped by the scope right after this returns, so the
    /// default only needs overriding for explicit teardown.
    async fn close(&self, _resources: &Resources) -> Result<(), LifespanError> {
        Ok(())
    }
}

/// A lifespan that acquires nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResources;

#[async_trait]
impl Lifespan for NoResources {
    async fn open(&self, _resources: &mut Resources) -> Result<(), LifespanError> {
        Ok(())
    }
}

/// Externally visible state of a [`LifespanScope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopePhase {
    Unopened,
    Open,
    Closed,
}

enum ScopeState {
    Unopened,
    Open(Arc<Resources>),
    Closed,
}

impl ScopeState {
    fn phase(&self) -> ScopePhase {
        match self {
            Self::Unopened => ScopePhase::Unopened,
            Self::Open(_) => ScopePhase::Open,
            Self::Closed => ScopePhase::Closed,
        }
    }
}

/// The bounded interval during which a server's resources exist.
pub struct LifespanScope {
    server_id: String,
    lifespan: Box<dyn Lifespan>,
    state: RwLock<ScopeState>,
    // Serializes open/close so teardown never races acquisition.
    transition: Mutex<()>,
    closing: CancellationToken,
    in_flight: TaskTracker,
}

impl LifespanScope {
    /// Create an unopened scope for `server_id`.
    pub fn new(server_id: impl Into<String>, lifespan: impl Lifespan + 'static) -> Self {
        Self {
            server_id: server_id.into(),
            lifespan: Box::new(lifespan),
            state: RwLock::new(ScopeState::Unopened),
            transition: Mutex::new(()),
            closing: CancellationToken::new(),
            in_flight: TaskTracker::new(),
        }
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Current phase of the scope.
    pub fn phase(&self) -> ScopePhase {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .phase()
    }

    /// Acquire the server's resources.
    pub async fn open(&self) -> Result<(), LifespanError> {
        let _guard = self.transition.lock().await;

        match self.phase() {
            ScopePhase::Unopened => {}
            ScopePhase::Open => return Err(LifespanError::AlreadyOpen),
            ScopePhase::Closed => return Err(LifespanError::Closed),
        }

        let mut resources = Resources::new();
        match self.lifespan.open(&mut resources).await {
            Ok(()) => {
                info!(
                    server = %self.server_id,
                    resources = ?resources.names(),
                    "Lifespan scope opened"
                );
                self.set_state(ScopeState::Open(Arc::new(resources)));
                Ok(())
            }
            Err(err) => {
                warn!(server = %self.server_id, "Lifespan scope failed to open: {}", err);
                if !resources.is_empty() {
                    if let Err(close_err) = self.lifespan.close(&resources).await {
                        warn!(
                            server = %self.server_id,
                            "Failed to release partially acquired resources: {}", close_err
                        );
                    }
                }
                self.set_state(ScopeState::Closed);
                Err(err)
            }
        }
    }

    /// Release the server's resources.
    ///
    /// Closing twice, or closing a scope that never opened, is a no-op.
    pub async fn close(&self) -> Result<(), LifespanError> {
        let _guard = self.transition.lock().await;

        if self.phase() != ScopePhase::Open {
            debug!(server = %self.server_id, "Lifespan scope close is a no-op");
            return Ok(());
        }

        self.closing.cancel();
        self.in_flight.close();
        if !self.in_flight.is_empty() {
            info!(
                server = %self.server_id,
                in_flight = self.in_flight.len(),
                "Cancelling in-flight invocations"
            );
        }
        self.in_flight.wait().await;

        let previous = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *state, ScopeState::Closed)
        };
        let ScopeState::Open(resources) = previous else {
            return Ok(());
        };

        let result = self.lifespan.close(&resources).await;
        drop(resources);

        match &result {
            Ok(()) => info!(server = %self.server_id, "Lifespan scope closed"),
            Err(err) => {
                warn!(server = %self.server_id, "Lifespan scope closed with error: {}", err)
            }
        }
        result
    }

    /// Register one in-flight use of the scope. [`close`](Self::close) waits
    /// until every token is dropped before releasing resources.
    pub fn enter(&self) -> TaskTrackerToken {
        self.in_flight.token()
    }

    /// Cancelled as soon as [`close`](Self::close) begins.
    pub fn closing(&self) -> CancellationToken {
        self.closing.clone()
    }

    /// The resources of an open scope, or `None` before open and after close.
    pub fn resources(&self) -> Option<Arc<Resources>> {
        match &*self.state.read().unwrap_or_else(PoisonError::into_inner) {
            ScopeState::Open(resources) => Some(resources.clone()),
            ScopeState::Unopened | ScopeState::Closed => None,
        }
    }

    fn set_state(&self, next: ScopeState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = next;
    }
}

impl std::fmt::Debug for LifespanScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifespanScope")
            .field("server_id", &self.server_id)
            .field("phase", &self.phase())
            .finish()
    }
}

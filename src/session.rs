//! Session registry with single-flight construction.
//!
//! An [`EditorManager`] maps a [`SessionKey`] (project, collaboration) to
//! one long-lived editor object. Each key moves through:
//!
//! ```text
//!   absent ──get_or_create──▶ pending ──ok──▶ ready ──release──▶ absent
//!                               │
//!                               └──err──▶ absent (retryable)
//! ```
//!
//! The pending future is inserted into the map while the lock is still
//! held, before anything is awaited, so every concurrent caller for the
//! same key joins the same construction. Construction runs on its own task
//! and finishes even if every caller goes away.
//!
//! A construction that completes after its key was released (or replaced
//! by a newer construction) is handed to its waiters but never installed.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::ResourceResult;

/// Composite session key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey {
    pub project_id: String,
    pub collaboration_id: String,
}

impl SessionKey {
    pub fn new(project_id: impl Into<String>, collaboration_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            collaboration_id: collaboration_id.into(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project_id, self.collaboration_id)
    }
}

/// When the "current editor" pointer moves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurrentTracking {
    OnCreate,
    OnAccess,
    #[default]
    Both,
}

impl CurrentTracking {
    fn on_create(self) -> bool {
        matches!(self, CurrentTracking::OnCreate | CurrentTracking::Both)
    }

    fn on_access(self) -> bool {
        matches!(self, CurrentTracking::OnAccess | CurrentTracking::Both)
    }
}

/// Builds the editor for a session key.
#[async_trait]
pub trait EditorFactory: Send + Sync + 'static {
    type Editor: Send + Sync + 'static;
    /// Per-call construction input (e.g. the project's data sources).
    type Context: Send + 'static;

    async fn create(&self, key: &SessionKey, ctx: Self::Context) -> ResourceResult<Self::Editor>;
}

type Build<E> = Shared<BoxFuture<'static, ResourceResult<Arc<E>>>>;

struct Pending<E> {
    generation: u64,
    build: Build<E>,
}

struct State<E> {
    ready: BTreeMap<SessionKey, Arc<E>>,
    pending: HashMap<SessionKey, Pending<E>>,
    current: Option<SessionKey>,
    next_generation: u64,
}

impl<E> Default for State<E> {
    fn default() -> Self {
        Self {
            ready: BTreeMap::new(),
            pending: HashMap::new(),
            current: None,
            next_generation: 0,
        }
    }
}

pub struct EditorManager<F: EditorFactory> {
    factory: Arc<F>,
    state: Arc<Mutex<State<F::Editor>>>,
    tracking: CurrentTracking,
}

impl<F: EditorFactory> EditorManager<F> {
    pub fn new(factory: F, tracking: CurrentTracking) -> Self {
        Self::with_factory(Arc::new(factory), tracking)
    }

    pub fn with_factory(factory: Arc<F>, tracking: CurrentTracking) -> Self {
        Self {
            factory,
            state: Arc::new(Mutex::new(State::default())),
            tracking,
        }
    }

    pub fn factory(&self) -> &Arc<F> {
        &self.factory
    }

    /// Return the editor for `key`, constructing it at most once.
    pub async fn get_or_create_editor(&self, key: &SessionKey, ctx: F::Context) -> ResourceResult<Arc<F::Editor>> {
        let build = {
            let mut state = self.state.lock().await;
            if let Some(editor) = state.ready.get(key).cloned() {
                if self.tracking.on_access() {
                    state.current = Some(key.clone());
                }
                return Ok(editor);
            }
            match state.pending.get(key) {
                Some(pending) => {
                    debug!(session = %key, "joining in-flight editor construction");
                    pending.build.clone()
                }
                None => self.start_build(&mut state, key, ctx),
            }
        };

        let result = build.await;
        if result.is_ok() && self.tracking.on_access() {
            let mut state = self.state.lock().await;
            if state.ready.contains_key(key) {
                state.current = Some(key.clone());
            }
        }
        result
    }

    /// Register a pending construction. Caller holds the state lock.
    fn start_build(&self, state: &mut State<F::Editor>, key: &SessionKey, ctx: F::Context) -> Build<F::Editor> {
        state.next_generation += 1;
        let generation = state.next_generation;

        let factory = Arc::clone(&self.factory);
        let shared_state = Arc::clone(&self.state);
        let tracking = self.tracking;
        let owned_key = key.clone();

        let build: Build<F::Editor> = async move {
            let result = factory.create(&owned_key, ctx).await.map(Arc::new);

            let mut state = shared_state.lock().await;
            let still_current = state
                .pending
                .get(&owned_key)
                .is_some_and(|p| p.generation == generation);
            if !still_current {
                debug!(session = %owned_key, generation, "discarding stale editor construction");
                return result;
            }
            state.pending.remove(&owned_key);
            match &result {
                Ok(editor) => {
                    state.ready.insert(owned_key.clone(), Arc::clone(editor));
                    if tracking.on_create() {
                        state.current = Some(owned_key.clone());
                    }
                    info!(session = %owned_key, "editor ready");
                }
                Err(e) => warn!(session = %owned_key, error = %e, "editor construction failed"),
            }
            result
        }
        .boxed()
        .shared();

        state.pending.insert(
            key.clone(),
            Pending {
                generation,
                build: build.clone(),
            },
        );
        tokio::spawn(build.clone());
        debug!(session = %key, generation, "editor construction started");
        build
    }

    /// The ready editor for `key`, if any. Never constructs.
    pub async fn get_editor(&self, key: &SessionKey) -> Option<Arc<F::Editor>> {
        let mut state = self.state.lock().await;
        let editor = state.ready.get(key).cloned()?;
        if self.tracking.on_access() {
            state.current = Some(key.clone());
        }
        Some(editor)
    }

    pub async fn has_editor(&self, key: &SessionKey) -> bool {
        self.state.lock().await.ready.contains_key(key)
    }

    pub async fn is_pending(&self, key: &SessionKey) -> bool {
        self.state.lock().await.pending.contains_key(key)
    }

    /// Drop the editor for `key` and any construction in flight for it.
    pub async fn release_editor(&self, key: &SessionKey) -> Option<Arc<F::Editor>> {
        let mut state = self.state.lock().await;
        state.pending.remove(key);
        let released = state.ready.remove(key);
        if state.current.as_ref() == Some(key) {
            state.current = None;
        }
        if released.is_some() {
            info!(session = %key, "editor released");
        }
        released
    }

    /// Keys of all ready editors, in key order.
    pub async fn active_keys(&self) -> Vec<SessionKey> {
        self.state.lock().await.ready.keys().cloned().collect()
    }

    /// The most recently tracked editor, or the first ready one.
    ///
    /// A convenience for picking a default session; not a correctness signal.
    pub async fn current_editor(&self) -> Option<(SessionKey, Arc<F::Editor>)> {
        let state = self.state.lock().await;
        state
            .current
            .as_ref()
            .and_then(|k| state.ready.get(k).map(|e| (k.clone(), Arc::clone(e))))
            .or_else(|| {
                state
                    .ready
                    .iter()
                    .next()
                    .map(|(k, e)| (k.clone(), Arc::clone(e)))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Operation, ResourceError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Counting {
        built: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl EditorFactory for Counting {
        type Editor = String;
        type Context = Duration;

        async fn create(&self, key: &SessionKey, delay: Duration) -> ResourceResult<String> {
            let n = self.built.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            if self.fail_first && n == 0 {
                return Err(ResourceError::handling(key.to_string(), Operation::Connect, "boom"));
            }
            Ok(format!("editor-{}-{}", key, n))
        }
    }

    fn manager(fail_first: bool, tracking: CurrentTracking) -> EditorManager<Counting> {
        EditorManager::new(
            Counting {
                built: AtomicUsize::new(0),
                fail_first,
            },
            tracking,
        )
    }

    #[tokio::test]
    async fn failure_reverts_to_absent() {
        let mgr = manager(true, CurrentTracking::Both);
        let key = SessionKey::new("p", "c");

        assert!(mgr.get_or_create_editor(&key, Duration::ZERO).await.is_err());
        assert!(!mgr.has_editor(&key).await);
        assert!(!mgr.is_pending(&key).await);

        let editor = mgr.get_or_create_editor(&key, Duration::ZERO).await.unwrap();
        assert_eq!(editor.as_str(), "editor-p/c-1");
        assert!(mgr.has_editor(&key).await);
    }

    #[tokio::test]
    async fn release_during_construction_is_not_installed() {
        let mgr = Arc::new(manager(false, CurrentTracking::Both));
        let key = SessionKey::new("p", "c");

        let waiter = {
            let mgr = Arc::clone(&mgr);
            let key = key.clone();
            tokio::spawn(async move { mgr.get_or_create_editor(&key, Duration::from_millis(50)).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(mgr.is_pending(&key).await);
        mgr.release_editor(&key).await;

        let editor = waiter.await.unwrap().unwrap();
        assert_eq!(editor.as_str(), "editor-p/c-0");
        assert!(!mgr.has_editor(&key).await);
    }

    #[tokio::test]
    async fn current_editor_tracking() {
        let mgr = manager(false, CurrentTracking::OnCreate);
        let a = SessionKey::new("a", "1");
        let b = SessionKey::new("b", "1");

        assert!(mgr.current_editor().await.is_none());
        mgr.get_or_create_editor(&b, Duration::ZERO).await.unwrap();
        mgr.get_or_create_editor(&a, Duration::ZERO).await.unwrap();
        assert_eq!(mgr.current_editor().await.unwrap().0, a);

        // Access does not move the pointer under OnCreate.
        mgr.get_editor(&b).await.unwrap();
        assert_eq!(mgr.current_editor().await.unwrap().0, a);

        // Releasing the current editor falls back to the first key.
        mgr.release_editor(&a).await;
        assert_eq!(mgr.current_editor().await.unwrap().0, b);
        assert_eq!(mgr.active_keys().await, vec![b]);
    }

    #[test]
    fn tracking_deserializes_snake_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            mode: CurrentTracking,
        }
        let w: Wrapper = toml::from_str("mode = \"on_access\"").unwrap();
        assert_eq!(w.mode, CurrentTracking::OnAccess);
    }
}

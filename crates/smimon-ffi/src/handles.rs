//! Handle-based context management for the C ABI
//!
//! Open contexts are parked in a global registry and handed to callers as
//! opaque `u64` handles. The component itself is a process-wide singleton.
//!
//! ## Thread Safety
//!
//! The context registry is an `Arc<Mutex<HashMap>>`; each context sits behind
//! its own lock so one caller reading a context never blocks another opening
//! a different one. Handle generation is atomic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use parking_lot::RwLock;
use smimon_core::{Component, Context, Error, Result};

static HANDLE_COUNTER: AtomicU64 = AtomicU64::new(1);

pub(crate) type SharedContext = Arc<parking_lot::Mutex<Context>>;

lazy_static::lazy_static! {
    /// The component behind every exported call
    pub(crate) static ref COMPONENT: RwLock<Option<Component>> = RwLock::new(None);

    /// Registry of all open contexts
    pub(crate) static ref CONTEXT_REGISTRY: Arc<Mutex<HashMap<u64, SharedContext>>> =
        Arc::new(Mutex::new(HashMap::new()));
}

/// Generate a unique context handle
///
/// Handles start at 1; 0 is reserved as the invalid handle.
pub(crate) fn generate_handle() -> u64 {
    HANDLE_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Lock a registry, recovering the data if a previous holder panicked
pub(crate) fn lock_registry<T>(mutex: &Arc<Mutex<T>>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Registry mutex was poisoned, recovering data");
            poisoned.into_inner()
        }
    }
}

/// Run `f` against the initialized component
pub(crate) fn with_component<T>(f: impl FnOnce(&Component) -> Result<T>) -> Result<T> {
    let guard = COMPONENT.read();
    match guard.as_ref() {
        Some(component) => f(component),
        None => Err(Error::unsupported("smimon_init has not been called")),
    }
}

pub(crate) fn register_context(context: Context) -> u64 {
    let handle = generate_handle();
    lock_registry(&CONTEXT_REGISTRY).insert(handle, Arc::new(parking_lot::Mutex::new(context)));
    handle
}

/// Look up an open context
///
/// The registry lock is released before the caller locks the context.
pub(crate) fn context(handle: u64) -> Result<SharedContext> {
    if handle == 0 {
        return Err(Error::InvalidArgument("null context handle".to_string()));
    }
    lock_registry(&CONTEXT_REGISTRY)
        .get(&handle)
        .cloned()
        .ok_or_else(|| Error::InvalidArgument(format!("unknown context handle {handle}")))
}

pub(crate) fn take_context(handle: u64) -> Option<SharedContext> {
    lock_registry(&CONTEXT_REGISTRY).remove(&handle)
}

/// Install a pre-built component in place of the one `smimon_init` would load
///
/// Any previous component is dropped, which shuts it down. Hosts embedding a
/// custom [`smimon_core::SmiLibrary`] use this before calling `smimon_init`.
pub fn install_component(component: Component) {
    let mut slot = COMPONENT.write();
    clear_all_registries();
    *slot = Some(component);
}

/// Close every open context and forget its handle
pub fn clear_all_registries() {
    let contexts: Vec<SharedContext> = lock_registry(&CONTEXT_REGISTRY).drain().map(|(_, c)| c).collect();
    let count = contexts.len();
    for context in contexts {
        if let Err(err) = context.lock().close() {
            tracing::warn!(error = %err, "context close failed while clearing registry");
        }
    }
    if count > 0 {
        tracing::info!(count, "All context handles cleared");
    }
}

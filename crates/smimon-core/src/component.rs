//! The component: library, device registry and event table behind one value.
//!
//! # Example
//!
//! ```no_run
//! use smimon_core::{Component, SmiConfig};
//!
//! let mut component = Component::new(SmiConfig::default().with_root("/opt/rocm"));
//! component.init()?;
//! let code = component.name_to_code("temp_current:device=0:sensor=0")?;
//! let mut context = component.open(&[code])?;
//! context.start()?;
//! context.read()?;
//! println!("{}", context.values()[0]);
//! context.stop()?;
//! context.close()?;
//! # Ok::<(), smimon_core::Error>(())
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use smimon_tracing::timed_span;
use tracing::{debug, info, warn};

use crate::codec::EventCode;
use crate::config::SmiConfig;
use crate::context::{Context, DeviceLock};
use crate::error::{Error, Result};
use crate::event::{EnumModifier, EventHooks, EventInfo, EventTable};
use crate::probe;
use crate::registry::DeviceRegistry;
use crate::vendor::{DynamicLibrary, SmiLibrary};

/// State built by `init` and shared with every open context.
pub(crate) struct Runtime {
    pub(crate) library: Arc<dyn SmiLibrary>,
    pub(crate) registry: RwLock<DeviceRegistry>,
    pub(crate) table: EventTable,
    pub(crate) lock: Arc<DeviceLock>,
}

pub struct Component {
    config: SmiConfig,
    library: Option<Arc<dyn SmiLibrary>>,
    runtime: Option<Arc<Runtime>>,
    /// Outlives init/shutdown cycles so stale contexts keep their devices.
    lock: Arc<DeviceLock>,
}

impl Component {
    /// Component that binds the shared library on first `init`.
    pub fn new(config: SmiConfig) -> Self {
        Self {
            config,
            library: None,
            runtime: None,
            lock: Arc::new(DeviceLock::new()),
        }
    }

    pub fn from_env() -> Self {
        Self::new(SmiConfig::from_env())
    }

    /// Component over an already constructed library (e.g. [`crate::vendor::StubLibrary`]).
    pub fn with_library(library: Arc<dyn SmiLibrary>, config: SmiConfig) -> Self {
        Self {
            config,
            library: Some(library),
            runtime: None,
            lock: Arc::new(DeviceLock::new()),
        }
    }

    pub fn config(&self) -> &SmiConfig {
        &self.config
    }

    /// Discover devices and build the event table. No-op when already initialized.
    ///
    /// On failure the registry is rolled back and the component stays uninitialized.
    #[tracing::instrument(skip(self))]
    pub fn init(&mut self) -> Result<()> {
        if self.runtime.is_some() {
            return Ok(());
        }
        let _timer = timed_span!("component_init");

        let library = match &self.library {
            Some(library) => Arc::clone(library),
            None => {
                let library: Arc<dyn SmiLibrary> = Arc::new(DynamicLibrary::load(&self.config)?);
                self.library = Some(Arc::clone(&library));
                library
            }
        };

        let mut registry = DeviceRegistry::new();
        registry.init(&*library, self.config.init_flags)?;

        let table = match probe::build_table(&*library, &registry, &self.config) {
            Ok(table) => table,
            Err(err) => {
                warn!(error = %err, "event table build failed, shutting down");
                if let Err(shutdown_err) = registry.shutdown(&*library) {
                    warn!(error = %shutdown_err, "shutdown after failed build also failed");
                }
                return Err(err);
            }
        };

        info!(
            gpus = registry.gpu_count(),
            cpus = registry.cpu_count(),
            events = table.len(),
            "component initialized"
        );
        self.runtime = Some(Arc::new(Runtime {
            library,
            registry: RwLock::new(registry),
            table,
            lock: Arc::clone(&self.lock),
        }));
        Ok(())
    }

    /// Tear down the table and registry. No-op when not initialized.
    pub fn shutdown(&mut self) -> Result<()> {
        let Some(runtime) = self.runtime.take() else {
            return Ok(());
        };
        let open_contexts = Arc::strong_count(&runtime) - 1;
        if open_contexts > 0 {
            warn!(open_contexts, "shutting down with contexts still open");
        }
        let result = runtime.registry.write().shutdown(&*runtime.library);
        debug!("component shut down");
        result
    }

    pub fn is_initialized(&self) -> bool {
        self.runtime.is_some()
    }

    fn runtime(&self) -> Result<&Arc<Runtime>> {
        self.runtime
            .as_ref()
            .ok_or_else(|| Error::unsupported("component is not initialized"))
    }

    pub fn table(&self) -> Result<&EventTable> {
        self.runtime().map(|runtime| &runtime.table)
    }

    pub fn device_count(&self) -> usize {
        self.runtime
            .as_ref()
            .map_or(0, |runtime| runtime.registry.read().device_count())
    }

    pub fn gpu_count(&self) -> usize {
        self.runtime
            .as_ref()
            .map_or(0, |runtime| runtime.registry.read().gpu_count())
    }

    pub fn cpu_count(&self) -> usize {
        self.runtime
            .as_ref()
            .map_or(0, |runtime| runtime.registry.read().cpu_count())
    }

    pub fn enumerate(&self, code: EventCode, modifier: EnumModifier) -> Result<EventCode> {
        self.table()?.enumerate(code, modifier)
    }

    pub fn name_to_code(&self, name: &str) -> Result<EventCode> {
        self.table()?.name_to_code(name)
    }

    pub fn code_to_name(&self, code: EventCode) -> Result<String> {
        self.table()?.code_to_name(code)
    }

    pub fn code_to_description(&self, code: EventCode) -> Result<String> {
        self.table()?.code_to_description(code)
    }

    pub fn event_info(&self, code: EventCode) -> Result<EventInfo> {
        self.table()?.event_info(code)
    }

    /// Attach lifecycle hooks to an event. Fails while any context is open.
    pub fn set_hooks(&mut self, name: &str, hooks: Option<Arc<dyn EventHooks>>) -> Result<()> {
        let runtime = self
            .runtime
            .as_mut()
            .ok_or_else(|| Error::unsupported("component is not initialized"))?;
        let runtime = Arc::get_mut(runtime).ok_or_else(|| Error::invalid("cannot change hooks while contexts are open"))?;
        runtime.table.set_hooks(name, hooks)
    }

    /// Open a context over `codes`, acquiring their devices.
    pub fn open(&self, codes: &[EventCode]) -> Result<Context> {
        Context::open(Arc::clone(self.runtime()?), codes)
    }

    /// Devices currently owned by open contexts.
    pub fn busy_devices(&self) -> u64 {
        self.lock.busy()
    }
}

impl Drop for Component {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!(error = %err, "shutdown on drop failed");
        }
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("config", &self.config)
            .field("initialized", &self.is_initialized())
            .field("busy", &format_args!("{:#x}", self.busy_devices()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vendor::StubLibrary;

    fn component(lib: StubLibrary) -> (Arc<StubLibrary>, Component) {
        let lib = Arc::new(lib);
        let component = Component::with_library(lib.clone(), SmiConfig::default());
        (lib, component)
    }

    #[test]
    fn init_then_shutdown_twice() {
        let (lib, mut component) = component(StubLibrary::builder().gpus(1).build());
        component.init().unwrap();
        component.init().unwrap();
        assert_eq!(lib.init_calls(), 1);
        assert!(component.device_count() > 0);

        component.shutdown().unwrap();
        component.shutdown().unwrap();
        assert!(!component.is_initialized());
        assert_eq!(lib.shutdown_calls(), 1);
        assert_eq!(component.device_count(), 0);
    }

    #[test]
    fn queries_before_init_are_unsupported() {
        let (_, component) = component(StubLibrary::default());
        assert!(matches!(component.name_to_code("perf_level:device=0"), Err(Error::NotSupported(_))));
        assert!(matches!(component.open(&[]), Err(Error::NotSupported(_))));
    }

    #[test]
    fn failed_build_rolls_back() {
        let lib = Arc::new(StubLibrary::builder().gpus(1).build());
        let config = SmiConfig::default().with_max_events_per_device(4);
        let mut component = Component::with_library(lib.clone(), config);
        assert!(matches!(component.init(), Err(Error::NotSupported(_))));
        assert!(!component.is_initialized());
        assert!(!lib.is_initialized());
    }

    #[test]
    fn missing_root_is_not_supported() {
        let mut component = Component::new(SmiConfig::default());
        assert!(matches!(component.init(), Err(Error::NotSupported(_))));
    }
}

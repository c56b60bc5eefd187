//! Event descriptors and the tables built from them.
//!
//! A descriptor is immutable after the table is built except for its cached
//! value, which is an atomic so contexts on different threads can share the
//! table. The device a read or write targets is never stored on the
//! descriptor; it travels with the call (see [`accessor::AccessTarget`]).

pub mod accessor;
pub mod name;
pub mod table;

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::error::Result;

pub use accessor::{AccessTarget, Accessor};
pub use name::NameIndex;
pub use table::{EnumModifier, EventInfo, EventTable, EventTableBuilder, ResolvedEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

impl AccessMode {
    pub fn is_writable(self) -> bool {
        matches!(self, AccessMode::ReadWrite)
    }
}

/// Device association of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Device-independent; codes never carry a device qualifier.
    System,
    /// Supported on the devices in the descriptor's `device_map`.
    Device,
}

/// Field selectors interpreted by the accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Selector {
    pub variant: u32,
    pub subvariant: u32,
}

/// The event a hook is invoked for.
#[derive(Debug, Clone, Copy)]
pub struct HookEvent<'a> {
    pub name: &'a str,
    pub device: Option<usize>,
}

/// Optional per-event lifecycle callbacks. Every method defaults to a no-op.
#[allow(unused_variables)]
pub trait EventHooks: Send + Sync {
    fn open(&self, event: &HookEvent<'_>) -> Result<()> {
        Ok(())
    }

    fn close(&self, event: &HookEvent<'_>) -> Result<()> {
        Ok(())
    }

    fn start(&self, event: &HookEvent<'_>) -> Result<()> {
        Ok(())
    }

    fn stop(&self, event: &HookEvent<'_>) -> Result<()> {
        Ok(())
    }
}

/// Candidate descriptor produced by a probe, before it has a table slot.
#[derive(Clone)]
pub struct EventSpec {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) accessor: Accessor,
    pub(crate) selector: Selector,
    pub(crate) mode: AccessMode,
    pub(crate) scope: Scope,
    pub(crate) hooks: Option<Arc<dyn EventHooks>>,
}

impl EventSpec {
    /// Read-only, per-device event.
    pub fn new(name: impl Into<String>, description: impl Into<String>, accessor: Accessor) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            accessor,
            selector: Selector::default(),
            mode: AccessMode::ReadOnly,
            scope: Scope::Device,
            hooks: None,
        }
    }

    pub fn variant(mut self, variant: impl Into<u32>) -> Self {
        self.selector.variant = variant.into();
        self
    }

    pub fn subvariant(mut self, subvariant: impl Into<u32>) -> Self {
        self.selector.subvariant = subvariant.into();
        self
    }

    pub fn writable(mut self) -> Self {
        self.mode = AccessMode::ReadWrite;
        self
    }

    pub fn system(mut self) -> Self {
        self.scope = Scope::System;
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn EventHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn accessor(&self) -> Accessor {
        self.accessor
    }

    pub fn selector(&self) -> Selector {
        self.selector
    }
}

impl fmt::Debug for EventSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSpec")
            .field("name", &self.name)
            .field("accessor", &self.accessor)
            .field("selector", &self.selector)
            .field("mode", &self.mode)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// One row of the event table.
pub struct EventDescriptor {
    nameid: usize,
    name: String,
    description: String,
    scope: Scope,
    device_map: u64,
    mode: AccessMode,
    accessor: Accessor,
    selector: Selector,
    value: AtomicI64,
    hooks: Option<Arc<dyn EventHooks>>,
}

impl EventDescriptor {
    pub(crate) fn from_spec(nameid: usize, spec: EventSpec) -> Self {
        Self {
            nameid,
            name: spec.name,
            description: spec.description,
            scope: spec.scope,
            device_map: 0,
            mode: spec.mode,
            accessor: spec.accessor,
            selector: spec.selector,
            value: AtomicI64::new(0),
            hooks: spec.hooks,
        }
    }

    pub(crate) fn add_device(&mut self, device: usize) {
        self.device_map |= 1u64 << device;
    }

    pub(crate) fn set_hooks(&mut self, hooks: Option<Arc<dyn EventHooks>>) {
        self.hooks = hooks;
    }

    pub fn nameid(&self) -> usize {
        self.nameid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn device_map(&self) -> u64 {
        self.device_map
    }

    pub fn supports_device(&self, device: usize) -> bool {
        device < 64 && self.device_map & (1u64 << device) != 0
    }

    /// Supported devices in ascending order.
    pub fn devices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..64).filter(move |d| self.supports_device(*d))
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn accessor(&self) -> Accessor {
        self.accessor
    }

    pub fn selector(&self) -> Selector {
        self.selector
    }

    pub fn hooks(&self) -> Option<&Arc<dyn EventHooks>> {
        self.hooks.as_ref()
    }

    pub fn cached_value(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }

    pub(crate) fn store_value(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
    }
}

impl fmt::Debug for EventDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDescriptor")
            .field("nameid", &self.nameid)
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("device_map", &format_args!("{:#x}", self.device_map))
            .field("mode", &self.mode)
            .field("accessor", &self.accessor)
            .field("selector", &self.selector)
            .field("hooks", &self.hooks.is_some())
            .finish()
    }
}

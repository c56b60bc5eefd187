//! Measurement contexts and device exclusivity.
//!
//! ```text
//!   closed ──open──▶ stopped ──start──▶ running
//!                      ▲  ◀──stop──────────┘
//!                      └──────close──▶ closed
//! ```
//!
//! Opening acquires every device the events name, all at once; a context
//! that is dropped while open releases them.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::codec::EventCode;
use crate::component::Runtime;
use crate::error::{Error, Result};
use crate::event::{AccessTarget, EventDescriptor, HookEvent, Scope};

/// One bit per device; a set bit is owned by exactly one open context.
#[derive(Debug, Default)]
pub struct DeviceLock {
    busy: Mutex<u64>,
}

impl DeviceLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire every device in `mask` or none of them.
    pub fn try_acquire(&self, mask: u64) -> Result<()> {
        let mut busy = self.busy.lock();
        let conflict = *busy & mask;
        if conflict != 0 {
            return Err(Error::Conflict { mask: conflict });
        }
        *busy |= mask;
        Ok(())
    }

    pub fn release(&self, mask: u64) {
        *self.busy.lock() &= !mask;
    }

    pub fn busy(&self) -> u64 {
        *self.busy.lock()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Stopped,
    Running,
    Closed,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    code: EventCode,
    nameid: usize,
    device: Option<usize>,
}

pub struct Context {
    runtime: Arc<Runtime>,
    slots: Vec<Slot>,
    values: Vec<i64>,
    owned: u64,
    state: State,
}

impl Context {
    pub(crate) fn open(runtime: Arc<Runtime>, codes: &[EventCode]) -> Result<Self> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(codes.len())
            .map_err(|e| Error::OutOfMemory(format!("context slots: {e}")))?;

        let mut mask = 0u64;
        for code in codes {
            let resolved = runtime.table.resolve(*code)?;
            let descriptor = resolved.descriptor;
            if descriptor.scope() == Scope::Device && resolved.device.is_none() {
                return Err(Error::invalid(format!(
                    "{} needs a device qualifier (event code {code})",
                    descriptor.name()
                )));
            }
            if let Some(device) = resolved.device {
                mask |= 1u64 << device;
            }
            slots.push(Slot {
                code: *code,
                nameid: descriptor.nameid(),
                device: resolved.device,
            });
        }

        runtime.lock.try_acquire(mask)?;

        let mut context = Self {
            values: vec![0; slots.len()],
            runtime,
            slots,
            owned: mask,
            state: State::Stopped,
        };

        if let Err((opened, err)) = context.open_hooks() {
            context.close_hooks(opened);
            context.runtime.lock.release(context.owned);
            context.owned = 0;
            context.state = State::Closed;
            return Err(err);
        }

        debug!(events = context.slots.len(), devices = mask, "context opened");
        Ok(context)
    }

    fn descriptor(&self, slot: &Slot) -> &EventDescriptor {
        &self.runtime.table.events()[slot.nameid]
    }

    /// On failure, returns how many slots were opened before the failing one.
    fn open_hooks(&self) -> std::result::Result<(), (usize, Error)> {
        for (index, slot) in self.slots.iter().enumerate() {
            let descriptor = self.descriptor(slot);
            if let Some(hooks) = descriptor.hooks() {
                if let Err(err) = hooks.open(&hook_event(descriptor, slot)) {
                    warn!(event = descriptor.name(), error = %err, "open hook failed, rolling back");
                    return Err((index, err));
                }
            }
        }
        Ok(())
    }

    /// Run close hooks for the first `count` slots, logging failures.
    fn close_hooks(&self, count: usize) {
        for slot in &self.slots[..count] {
            let descriptor = self.descriptor(slot);
            if let Some(hooks) = descriptor.hooks() {
                if let Err(err) = hooks.close(&hook_event(descriptor, slot)) {
                    warn!(event = descriptor.name(), error = %err, "close hook failed");
                }
            }
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state == State::Closed {
            return Err(Error::invalid("context is closed"));
        }
        Ok(())
    }

    /// Release the context's devices. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.state == State::Closed {
            return Ok(());
        }
        self.close_hooks(self.slots.len());
        self.runtime.lock.release(self.owned);
        debug!(devices = self.owned, "context closed");
        self.owned = 0;
        self.slots.clear();
        self.values.clear();
        self.state = State::Closed;
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        self.ensure_open()?;
        for slot in &self.slots {
            let descriptor = self.descriptor(slot);
            if let Some(hooks) = descriptor.hooks() {
                hooks.start(&hook_event(descriptor, slot))?;
            }
        }
        self.state = State::Running;
        Ok(())
    }

    /// Run every stop hook; the first failure is reported after all have run.
    pub fn stop(&mut self) -> Result<()> {
        if self.state != State::Running {
            return Ok(());
        }
        let mut first_err = None;
        for slot in &self.slots {
            let descriptor = self.descriptor(slot);
            if let Some(hooks) = descriptor.hooks() {
                if let Err(err) = hooks.stop(&hook_event(descriptor, slot)) {
                    warn!(event = descriptor.name(), error = %err, "stop hook failed");
                    first_err.get_or_insert(err);
                }
            }
        }
        self.state = State::Stopped;
        first_err.map_or(Ok(()), Err)
    }

    /// Read every event into the context buffer.
    ///
    /// All slots are filled even when some reads fail (failed slots read
    /// zero); the first failure is returned once the pass completes.
    pub fn read(&mut self) -> Result<()> {
        if self.state != State::Running {
            return Err(Error::invalid("context is not running"));
        }

        let registry = self.runtime.registry.read();
        let library = &*self.runtime.library;
        let mut first_err = None;

        for (slot, value) in self.slots.iter().zip(self.values.iter_mut()) {
            let descriptor = &self.runtime.table.events()[slot.nameid];
            let target = AccessTarget::new(library, &registry, slot.device);
            match descriptor.accessor().read(descriptor.selector(), &target) {
                Ok(v) => {
                    *value = v;
                    descriptor.store_value(v);
                }
                Err(err) => {
                    debug!(event = descriptor.name(), device = ?slot.device, error = %err, "read failed");
                    *value = 0;
                    first_err.get_or_insert(err);
                }
            }
        }

        first_err.map_or(Ok(()), Err)
    }

    /// Write one value per event, stopping at the first failure.
    pub fn write(&mut self, values: &[i64]) -> Result<()> {
        self.ensure_open()?;
        if values.len() != self.slots.len() {
            return Err(Error::invalid(format!(
                "expected {} values, got {}",
                self.slots.len(),
                values.len()
            )));
        }

        let registry = self.runtime.registry.read();
        let library = &*self.runtime.library;

        for (index, (slot, value)) in self.slots.iter().zip(values).enumerate() {
            let descriptor = &self.runtime.table.events()[slot.nameid];
            if !descriptor.mode().is_writable() {
                return Err(Error::NotImplemented(format!("{} is read-only", descriptor.name())));
            }
            let target = AccessTarget::new(library, &registry, slot.device);
            descriptor
                .accessor()
                .write(descriptor.selector(), &target, *value)?;
            descriptor.store_value(*value);
            self.values[index] = *value;
        }
        Ok(())
    }

    /// Zero the cached value of every event and the context buffer.
    pub fn reset(&mut self) -> Result<()> {
        self.ensure_open()?;
        for slot in &self.slots {
            self.descriptor(slot).store_value(0);
        }
        self.values.iter_mut().for_each(|v| *v = 0);
        Ok(())
    }

    pub fn values(&self) -> &[i64] {
        &self.values
    }

    pub fn codes(&self) -> impl Iterator<Item = EventCode> + '_ {
        self.slots.iter().map(|slot| slot.code)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Devices this context holds.
    pub fn owned_devices(&self) -> u64 {
        self.owned
    }

    pub fn is_open(&self) -> bool {
        self.state != State::Closed
    }

    pub fn is_running(&self) -> bool {
        self.state == State::Running
    }
}

fn hook_event<'a>(descriptor: &'a EventDescriptor, slot: &Slot) -> HookEvent<'a> {
    HookEvent {
        name: descriptor.name(),
        device: slot.device,
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if self.state != State::Closed {
            let _ = self.close();
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("events", &self.slots.len())
            .field("owned", &format_args!("{:#x}", self.owned))
            .field("state", &self.state)
            .finish()
    }
}

//! Capability probing.
//!
//! Every candidate event is probed with the same read its accessor performs
//! at runtime; only candidates whose probe succeeds are registered. A failed
//! probe skips the candidate. Overflow and allocation failure abort the
//! build.

mod gpu;
mod system;

#[cfg(feature = "cpu")]
mod cpu;

use smimon_tracing::timed_span;
use tracing::{debug, info};

use crate::config::SmiConfig;
use crate::error::{Error, Result};
use crate::event::{AccessTarget, EventSpec, EventTable, EventTableBuilder};
use crate::registry::DeviceRegistry;
use crate::vendor::SmiLibrary;

/// Build the event table for every device in `registry`.
pub fn build_table(library: &dyn SmiLibrary, registry: &DeviceRegistry, config: &SmiConfig) -> Result<EventTable> {
    let _timer = timed_span!("build_event_table", devices = registry.device_count());

    let limit = config.event_limit(registry.device_count());
    let mut prober = Prober::new(library, registry, limit)?;

    system::probe(&mut prober)?;
    for device in registry.gpus() {
        gpu::probe(&mut prober, device.index)?;
    }
    #[cfg(feature = "cpu")]
    for device in registry.cpus() {
        cpu::probe(&mut prober, device.index)?;
    }

    let skipped = prober.skipped;
    let registrations = prober.builder.registrations();
    let table = prober.builder.build();
    info!(events = table.len(), registrations, skipped, limit, "event table built");
    Ok(table)
}

/// Probe state threaded through the family probes.
pub(crate) struct Prober<'a> {
    library: &'a dyn SmiLibrary,
    registry: &'a DeviceRegistry,
    builder: EventTableBuilder,
    skipped: usize,
}

impl<'a> Prober<'a> {
    pub(crate) fn new(library: &'a dyn SmiLibrary, registry: &'a DeviceRegistry, limit: usize) -> Result<Self> {
        Ok(Self {
            library,
            registry,
            builder: EventTableBuilder::new(limit)?,
            skipped: 0,
        })
    }

    pub(crate) fn registry(&self) -> &'a DeviceRegistry {
        self.registry
    }

    fn probe_read(&self, spec: &EventSpec, device: Option<usize>) -> Result<i64> {
        let target = AccessTarget::new(self.library, self.registry, device);
        spec.accessor().read(spec.selector(), &target)
    }

    /// Probe and register one candidate. Returns whether it was registered.
    pub(crate) fn single(&mut self, spec: EventSpec, device: Option<usize>) -> Result<bool> {
        self.group(vec![spec], device)
    }

    /// Probe a family of fields that come from one vendor result.
    ///
    /// The first candidate's probe decides whether the family exists at all;
    /// if it fails the whole group is skipped without further vendor calls.
    /// Otherwise each remaining field is read once more and registered only
    /// if its own value can be derived (a level index may be out of range,
    /// a partition label unrecognized).
    pub(crate) fn group(&mut self, specs: Vec<EventSpec>, device: Option<usize>) -> Result<bool> {
        let Some(first) = specs.first() else {
            return Ok(false);
        };

        if let Err(err) = self.probe_read(first, device) {
            if let Error::OutOfMemory(_) = err {
                return Err(err);
            }
            debug!(event = first.name(), ?device, error = %err, "probe skipped");
            self.skipped += specs.len();
            return Ok(false);
        }

        let mut specs = specs.into_iter();
        if let Some(first) = specs.next() {
            self.builder.register(first, device)?;
        }
        for spec in specs {
            match self.probe_read(&spec, device) {
                Ok(_) => {
                    self.builder.register(spec, device)?;
                }
                Err(err @ Error::OutOfMemory(_)) => return Err(err),
                Err(err) => {
                    debug!(event = spec.name(), ?device, error = %err, "field skipped");
                    self.skipped += 1;
                }
            }
        }
        Ok(true)
    }
}

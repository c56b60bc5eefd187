//! The event table: descriptors addressed by nameid, plus the name index.

use std::sync::Arc;

use tracing::debug;

use crate::codec::{self, EventCode, MAX_EVENTS};
use crate::error::{Error, Result};

use super::name::{render_name, split_device_qualifier, NameIndex};
use super::{AccessMode, EventDescriptor, EventHooks, EventSpec, Scope};

/// Enumeration step requested by the host framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumModifier {
    /// First base event (index 0, no qualifier).
    First,
    /// Base event following the given one.
    Next,
    /// Next device qualifier of a per-device event, ascending.
    Devices,
}

/// A code that has been validated against the table.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedEvent<'a> {
    pub code: EventCode,
    pub descriptor: &'a EventDescriptor,
    pub device: Option<usize>,
}

impl ResolvedEvent<'_> {
    pub fn name(&self) -> String {
        render_name(self.descriptor.name(), self.device)
    }
}

/// Descriptor summary for tooling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventInfo {
    pub code: EventCode,
    pub name: String,
    pub description: String,
    pub mode: AccessMode,
    pub scope: Scope,
    /// Device named by the code, if qualified.
    pub device: Option<usize>,
    /// Every device the event is supported on.
    pub devices: Vec<usize>,
}

#[derive(Debug, Default)]
pub struct EventTable {
    events: Vec<EventDescriptor>,
    names: NameIndex,
}

impl EventTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[EventDescriptor] {
        &self.events
    }

    pub fn get(&self, nameid: usize) -> Option<&EventDescriptor> {
        self.events.get(nameid)
    }

    pub fn find(&self, base_name: &str) -> Option<&EventDescriptor> {
        self.names.find(base_name).and_then(|index| self.events.get(index))
    }

    /// Decode `code` and check it against the descriptor's device association.
    pub fn resolve(&self, code: EventCode) -> Result<ResolvedEvent<'_>> {
        let fields = codec::decode(code)?;
        let descriptor = self
            .events
            .get(fields.nameid)
            .ok_or_else(|| Error::no_such_event(format!("event code {code} is past the end of the table")))?;

        let device = fields.qualified_device();
        if let Some(device) = device {
            if descriptor.scope() == Scope::System {
                return Err(Error::no_such_event(format!(
                    "{} is system-wide and takes no device qualifier",
                    descriptor.name()
                )));
            }
            if !descriptor.supports_device(device) {
                return Err(Error::no_such_event(format!(
                    "{} is not supported on device {device}",
                    descriptor.name()
                )));
            }
        }

        Ok(ResolvedEvent {
            code,
            descriptor,
            device,
        })
    }

    pub fn enumerate(&self, code: EventCode, modifier: EnumModifier) -> Result<EventCode> {
        match modifier {
            EnumModifier::First => {
                if self.events.is_empty() {
                    return Err(Error::no_such_event("event table is empty"));
                }
                codec::encode_for(0, None)
            }
            EnumModifier::Next => {
                let next = self.resolve(code)?.descriptor.nameid() + 1;
                if next >= self.events.len() {
                    return Err(Error::no_such_event("no more events"));
                }
                codec::encode_for(next, None)
            }
            EnumModifier::Devices => {
                let resolved = self.resolve(code)?;
                let descriptor = resolved.descriptor;
                if descriptor.scope() == Scope::System {
                    return Err(Error::no_such_event(format!("{} has no device qualifiers", descriptor.name())));
                }
                let from = resolved.device.map_or(0, |d| d + 1);
                let device = descriptor
                    .devices()
                    .find(|d| *d >= from)
                    .ok_or_else(|| Error::no_such_event(format!("no more devices for {}", descriptor.name())))?;
                codec::encode_for(descriptor.nameid(), Some(device))
            }
        }
    }

    pub fn name_to_code(&self, name: &str) -> Result<EventCode> {
        let (base, device) = split_device_qualifier(name)?;
        let descriptor = self
            .find(&base)
            .ok_or_else(|| Error::no_such_event(format!("unknown event {name:?}")))?;

        match (descriptor.scope(), device) {
            (Scope::System, Some(_)) => Err(Error::no_such_event(format!(
                "{name:?}: system events take no device qualifier"
            ))),
            (Scope::Device, None) => Err(Error::no_such_event(format!("{name:?}: device qualifier required"))),
            (Scope::Device, Some(d)) if !descriptor.supports_device(d) => {
                Err(Error::no_such_event(format!("{name:?}: not supported on device {d}")))
            }
            (_, device) => codec::encode_for(descriptor.nameid(), device),
        }
    }

    pub fn code_to_name(&self, code: EventCode) -> Result<String> {
        self.resolve(code).map(|resolved| resolved.name())
    }

    pub fn code_to_description(&self, code: EventCode) -> Result<String> {
        self.resolve(code)
            .map(|resolved| resolved.descriptor.description().to_string())
    }

    pub fn event_info(&self, code: EventCode) -> Result<EventInfo> {
        let resolved = self.resolve(code)?;
        let descriptor = resolved.descriptor;
        Ok(EventInfo {
            code,
            name: resolved.name(),
            description: descriptor.description().to_string(),
            mode: descriptor.mode(),
            scope: descriptor.scope(),
            device: resolved.device,
            devices: descriptor.devices().collect(),
        })
    }

    /// Attach (or with `None`, detach) lifecycle hooks to the event named by
    /// `name`. A device segment in `name` is ignored: hooks apply on every device.
    pub fn set_hooks(&mut self, name: &str, hooks: Option<Arc<dyn EventHooks>>) -> Result<()> {
        let (base, _) = split_device_qualifier(name)?;
        let index = self
            .names
            .find(&base)
            .ok_or_else(|| Error::no_such_event(format!("unknown event {name:?}")))?;
        self.events[index].set_hooks(hooks);
        Ok(())
    }

    /// Zero every cached value.
    pub fn reset_values(&self) {
        for descriptor in &self.events {
            descriptor.store_value(0);
        }
    }
}

/// Accumulates descriptors during probing.
///
/// Every successful probe counts as one registration against `limit`;
/// re-registering a name on another device merges it into the existing
/// descriptor's device map. Distinct names are bounded separately by the
/// nameid width ([`MAX_EVENTS`]).
#[derive(Debug)]
pub struct EventTableBuilder {
    events: Vec<EventDescriptor>,
    names: NameIndex,
    limit: usize,
    registrations: usize,
}

impl EventTableBuilder {
    pub fn new(limit: usize) -> Result<Self> {
        let capacity = limit.min(MAX_EVENTS);
        let mut events = Vec::new();
        events
            .try_reserve(capacity)
            .map_err(|e| Error::OutOfMemory(format!("event table: {e}")))?;
        Ok(Self {
            events,
            names: NameIndex::with_capacity(capacity),
            limit,
            registrations: 0,
        })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn registrations(&self) -> usize {
        self.registrations
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Register `spec` on `device` (`None` for system events) and return its nameid.
    pub fn register(&mut self, spec: EventSpec, device: Option<usize>) -> Result<usize> {
        if self.registrations >= self.limit {
            return Err(Error::unsupported(format!(
                "event table overflow: more than {} registrations",
                self.limit
            )));
        }

        match (spec.scope, device) {
            (Scope::System, Some(d)) => {
                return Err(Error::misc(format!("system event {} registered on device {d}", spec.name)))
            }
            (Scope::Device, None) => {
                return Err(Error::misc(format!("device event {} registered without a device", spec.name)))
            }
            (_, Some(d)) if d >= codec::MAX_DEVICES => {
                return Err(Error::misc(format!("device {d} is beyond the qualifier width")))
            }
            _ => {}
        }

        let nameid = match self.names.find(&spec.name) {
            Some(existing) => {
                let descriptor = &self.events[existing];
                if descriptor.scope() != spec.scope || descriptor.accessor() != spec.accessor {
                    return Err(Error::misc(format!("conflicting registrations for {}", spec.name)));
                }
                existing
            }
            None => {
                let nameid = self.events.len();
                if nameid >= MAX_EVENTS {
                    return Err(Error::unsupported(format!(
                        "event table overflow: more than {MAX_EVENTS} distinct events"
                    )));
                }
                self.events
                    .try_reserve(1)
                    .map_err(|e| Error::OutOfMemory(format!("event table: {e}")))?;
                self.names.insert(spec.name.clone(), nameid);
                self.events.push(EventDescriptor::from_spec(nameid, spec));
                nameid
            }
        };

        if let Some(device) = device {
            self.events[nameid].add_device(device);
        }
        self.registrations += 1;
        debug!(nameid, name = self.events[nameid].name(), ?device, "event registered");
        Ok(nameid)
    }

    pub fn build(self) -> EventTable {
        EventTable {
            events: self.events,
            names: self.names,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode, Qualifiers};
    use crate::event::Accessor;

    fn table() -> EventTable {
        let mut builder = EventTableBuilder::new(64).unwrap();
        let temp = EventSpec::new("temp_current:sensor=0", "Edge temperature.", Accessor::Temperature);
        builder.register(temp.clone(), Some(0)).unwrap();
        builder.register(temp, Some(2)).unwrap();
        builder
            .register(
                EventSpec::new("threads_per_core", "SMT width.", Accessor::ThreadsPerCore).system(),
                None,
            )
            .unwrap();
        builder
            .register(EventSpec::new("power_cap", "Power cap.", Accessor::PowerCap).writable(), Some(1))
            .unwrap();
        builder.build()
    }

    #[test]
    fn merges_devices_under_one_name() {
        let table = table();
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(0).unwrap().device_map(), 0b101);
    }

    #[test]
    fn name_round_trip() {
        let table = table();
        for name in ["temp_current:device=2:sensor=0", "threads_per_core", "power_cap:device=1"] {
            let code = table.name_to_code(name).unwrap();
            assert_eq!(table.code_to_name(code).unwrap(), name);
        }
    }

    #[test]
    fn name_qualifier_must_match_scope() {
        let table = table();
        for name in [
            "temp_current:sensor=0",
            "temp_current:device=1:sensor=0",
            "threads_per_core:device=0",
            "no_such_metric",
        ] {
            assert!(matches!(table.name_to_code(name), Err(Error::NoSuchEvent(_))), "{name}");
        }
    }

    #[test]
    fn resolve_checks_association() {
        let table = table();
        assert!(table.resolve(encode(1, Qualifiers::DEVICE, 0).unwrap()).is_err());
        assert!(table.resolve(encode(0, Qualifiers::DEVICE, 1).unwrap()).is_err());
        assert!(table.resolve(encode(3, Qualifiers::NONE, 0).unwrap()).is_err());
        assert!(table.resolve(encode(0, Qualifiers::NONE, 0).unwrap()).is_ok());
    }

    #[test]
    fn enumerates_base_events_then_stops() {
        let table = table();
        let mut code = table.enumerate(EventCode::from_raw(0), EnumModifier::First).unwrap();
        let mut seen = vec![code.raw()];
        while let Ok(next) = table.enumerate(code, EnumModifier::Next) {
            seen.push(next.raw());
            code = next;
        }
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn enumerates_device_qualifiers_in_order() {
        let table = table();
        let base = table.enumerate(EventCode::from_raw(0), EnumModifier::First).unwrap();
        let first = table.enumerate(base, EnumModifier::Devices).unwrap();
        let second = table.enumerate(first, EnumModifier::Devices).unwrap();
        assert_eq!(table.code_to_name(first).unwrap(), "temp_current:device=0:sensor=0");
        assert_eq!(table.code_to_name(second).unwrap(), "temp_current:device=2:sensor=0");
        assert!(matches!(
            table.enumerate(second, EnumModifier::Devices),
            Err(Error::NoSuchEvent(_))
        ));

        let system = table.name_to_code("threads_per_core").unwrap();
        assert!(table.enumerate(system, EnumModifier::Devices).is_err());
    }

    #[test]
    fn empty_table_has_no_first() {
        assert!(matches!(
            EventTable::empty().enumerate(EventCode::from_raw(0), EnumModifier::First),
            Err(Error::NoSuchEvent(_))
        ));
    }

    #[test]
    fn overflow_fails_the_build() {
        let mut builder = EventTableBuilder::new(2).unwrap();
        let spec = EventSpec::new("perf_level", "", Accessor::PerfLevel);
        builder.register(spec.clone(), Some(0)).unwrap();
        builder.register(spec.clone(), Some(1)).unwrap();
        assert!(matches!(builder.register(spec, Some(2)), Err(Error::NotSupported(_))));
    }

    #[test]
    fn registrations_past_the_nameid_width_merge() {
        let mut builder = EventTableBuilder::new(2 * MAX_EVENTS).unwrap();
        assert_eq!(builder.limit(), 2 * MAX_EVENTS);
        let spec = EventSpec::new("perf_level", "", Accessor::PerfLevel);
        for device in 0..codec::MAX_DEVICES {
            builder.register(spec.clone(), Some(device)).unwrap();
        }
        assert_eq!(builder.len(), 1);
        assert_eq!(builder.registrations(), codec::MAX_DEVICES);
    }

    #[test]
    fn distinct_names_are_bounded_by_nameid_width() {
        let mut builder = EventTableBuilder::new(MAX_EVENTS + 1).unwrap();
        for index in 0..MAX_EVENTS {
            let spec = EventSpec::new(format!("metric_{index}"), "", Accessor::ThreadsPerCore).system();
            builder.register(spec, None).unwrap();
        }
        let extra = EventSpec::new("one_too_many", "", Accessor::ThreadsPerCore).system();
        assert!(matches!(builder.register(extra, None), Err(Error::NotSupported(_))));
        assert_eq!(builder.len(), MAX_EVENTS);
    }

    #[test]
    fn event_info_lists_devices() {
        let table = table();
        let code = table.name_to_code("power_cap:device=1").unwrap();
        let info = table.event_info(code).unwrap();
        assert_eq!(info.mode, AccessMode::ReadWrite);
        assert_eq!(info.device, Some(1));
        assert_eq!(info.devices, vec![1]);
        assert_eq!(table.code_to_description(code).unwrap(), "Power cap.");
    }

    #[test]
    fn reset_zeroes_cached_values() {
        let table = table();
        table.get(0).unwrap().store_value(9);
        table.reset_values();
        assert_eq!(table.get(0).unwrap().cached_value(), 0);
    }
}

//! # smimon-core - Hardware Telemetry Events
//!
//! Exposes GPU and CPU counters from the AMD SMI library (temperatures, power,
//! clocks, memory, ECC, partitioning) as named, enumerable events that can be
//! read and, for a subset, written.
//!
//! ## Architecture
//!
//! ```text
//! DeviceRegistry ──▶ probe::build_table ──▶ EventTable + NameIndex
//!                                                │
//!                         Component::open ──▶ Context ──▶ Accessor ──▶ SmiLibrary
//!                                                │
//!                                           DeviceLock (busy mask)
//! ```
//!
//! - **Registry**: GPUs first, then CPU sockets, each with a flat device index.
//! - **Probe**: every candidate metric is probed per device; only what answers is registered.
//! - **Codec**: event codes pack `nameid` (12 bits), a device qualifier flag and a 6-bit device.
//! - **Accessors**: one tag per metric family, selecting fields with `variant`/`subvariant`.
//! - **Contexts**: own their devices exclusively from `open` to `close`.
//!
//! ## Naming
//!
//! `<metric>[:device=<n>][:sensor=<n>]`, e.g. `temp_current:device=0:sensor=1`,
//! `power_cap:device=0`, `threads_per_core`.
//!
//! ## Features
//!
//! - `cpu` (default): CPU socket, core and DIMM events.

pub mod codec;
pub mod component;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod hash;
pub mod probe;
pub mod registry;
pub mod vendor;

// Re-export primary types
pub use codec::{EventCode, Qualifiers};
pub use component::Component;
pub use config::SmiConfig;
pub use context::{Context, DeviceLock};
pub use error::{Error, Result, Status};
pub use event::{AccessMode, EnumModifier, EventHooks, EventInfo, HookEvent, Scope};
pub use registry::{DeviceKind, DeviceRegistry};
pub use vendor::{DynamicLibrary, SmiLibrary, StubLibrary};

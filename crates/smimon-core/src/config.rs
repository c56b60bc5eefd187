//! Component configuration.
//!
//! | Variable                       | Field                   | Default          |
//! |--------------------------------|-------------------------|------------------|
//! | `SMIMON_SMI_ROOT`              | `root`                  | unset (required) |
//! | `SMIMON_SMI_LIBRARY`           | `library_name`          | `libamd_smi.so`  |
//! | `SMIMON_MAX_EVENTS_PER_DEVICE` | `max_events_per_device` | 512              |

use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::vendor::InitFlags;

pub const ROOT_ENV: &str = "SMIMON_SMI_ROOT";
pub const LIBRARY_ENV: &str = "SMIMON_SMI_LIBRARY";
pub const MAX_EVENTS_ENV: &str = "SMIMON_MAX_EVENTS_PER_DEVICE";

pub const DEFAULT_LIBRARY_NAME: &str = "libamd_smi.so";
pub const DEFAULT_MAX_EVENTS_PER_DEVICE: usize = 512;

/// Directories searched below the install root, in order.
const LIBRARY_SUBDIRS: &[&str] = &["lib", "lib64", ""];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmiConfig {
    /// Install root of the vendor library.
    pub root: Option<PathBuf>,
    pub library_name: String,
    pub init_flags: InitFlags,
    /// Registration budget per discovered device.
    pub max_events_per_device: usize,
}

impl Default for SmiConfig {
    fn default() -> Self {
        Self {
            root: None,
            library_name: DEFAULT_LIBRARY_NAME.to_string(),
            init_flags: InitFlags::discovery_default(),
            max_events_per_device: DEFAULT_MAX_EVENTS_PER_DEVICE,
        }
    }
}

impl SmiConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(root) = env::var(ROOT_ENV) {
            if !root.trim().is_empty() {
                config.root = Some(PathBuf::from(root));
            }
        }

        if let Ok(name) = env::var(LIBRARY_ENV) {
            if !name.trim().is_empty() {
                config.library_name = name.trim().to_string();
            }
        }

        if let Ok(raw) = env::var(MAX_EVENTS_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(value) if value > 0 => config.max_events_per_device = value,
                _ => tracing::warn!(value = %raw, "ignoring invalid {MAX_EVENTS_ENV}"),
            }
        }

        config
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn with_library_name(mut self, name: impl Into<String>) -> Self {
        self.library_name = name.into();
        self
    }

    pub fn with_init_flags(mut self, flags: InitFlags) -> Self {
        self.init_flags = flags;
        self
    }

    pub fn with_max_events_per_device(mut self, max: usize) -> Self {
        self.max_events_per_device = max;
        self
    }

    /// Candidate paths for the shared object, in lookup order.
    pub fn library_candidates(&self) -> Result<Vec<PathBuf>> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| Error::unsupported(format!("{ROOT_ENV} is not set")))?;
        Ok(LIBRARY_SUBDIRS
            .iter()
            .map(|sub| root.join(sub).join(&self.library_name))
            .collect())
    }

    /// Registration bound for a table built over `device_count` devices.
    ///
    /// Registrations count once per device; the nameid width bounds distinct
    /// names separately (see [`crate::event::EventTableBuilder`]).
    pub fn event_limit(&self, device_count: usize) -> usize {
        self.max_events_per_device.saturating_mul(device_count)
    }
}

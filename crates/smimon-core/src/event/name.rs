//! Event names and the name index.
//!
//! Grammar: `<metric>[:device=<n>][:sensor=<n>]`. The table stores base
//! names (no device segment); the device segment is spliced in right after
//! the metric token when a code carries a device qualifier.

use std::collections::HashMap;

use crate::codec::MAX_DEVICES;
use crate::error::{Error, Result};

const DEVICE_SEGMENT: &str = ":device=";

/// Base name → table index.
#[derive(Debug, Default, Clone)]
pub struct NameIndex {
    map: HashMap<String, usize>,
}

impl NameIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity(capacity),
        }
    }

    /// Returns the previous index if `name` was already present.
    pub fn insert(&mut self, name: impl Into<String>, index: usize) -> Option<usize> {
        self.map.insert(name.into(), index)
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.map.get(name).copied()
    }

    pub fn remove(&mut self, name: &str) -> Option<usize> {
        self.map.remove(name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

/// Strip the `:device=<n>` segment from `name`.
///
/// Fails with `NoSuchEvent` when the segment repeats, is empty or not
/// decimal, or names a device beyond the codec's 6-bit field.
pub fn split_device_qualifier(name: &str) -> Result<(String, Option<usize>)> {
    let Some(start) = name.find(DEVICE_SEGMENT) else {
        return Ok((name.to_string(), None));
    };

    let value_start = start + DEVICE_SEGMENT.len();
    let rest = &name[value_start..];
    let value_len = rest.find(':').unwrap_or(rest.len());
    let value = &rest[..value_len];

    if rest[value_len..].contains(DEVICE_SEGMENT) {
        return Err(Error::no_such_event(format!("{name}: more than one device qualifier")));
    }
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::no_such_event(format!("{name}: malformed device qualifier")));
    }
    let device = value
        .parse::<usize>()
        .ok()
        .filter(|d| *d < MAX_DEVICES)
        .ok_or_else(|| Error::no_such_event(format!("{name}: device {value} out of range")))?;

    let mut base = String::with_capacity(name.len());
    base.push_str(&name[..start]);
    base.push_str(&rest[value_len..]);
    Ok((base, Some(device)))
}

/// Render `base` with an optional device segment after the metric token.
pub fn render_name(base: &str, device: Option<usize>) -> String {
    let Some(device) = device else {
        return base.to_string();
    };
    let split = base.find(':').unwrap_or(base.len());
    format!("{}{DEVICE_SEGMENT}{device}{}", &base[..split], &base[split..])
}

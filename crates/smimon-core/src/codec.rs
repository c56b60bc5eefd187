//! Event code packing.
//!
//! ```text
//!  31                  19 18        13  12  11                    0
//! ┌──────────────────────┬────────────┬────┬───────────────────────┐
//! │   reserved (zero)    │   device   │ DQ │        nameid         │
//! └──────────────────────┴────────────┴────┴───────────────────────┘
//! ```
//!
//! `nameid` indexes the event table, `DQ` is the device-qualifier flag and
//! `device` is only meaningful when `DQ` is set. Table-aware validation
//! (nameid range, device association) lives in [`crate::event::EventTable::resolve`].

use std::fmt;

use crate::error::{Error, Result};

pub const NAMEID_WIDTH: u32 = 12;
pub const QUALIFIER_WIDTH: u32 = 1;
pub const DEVICE_WIDTH: u32 = 6;

pub const NAMEID_SHIFT: u32 = 0;
pub const QUALIFIER_SHIFT: u32 = NAMEID_SHIFT + NAMEID_WIDTH;
pub const DEVICE_SHIFT: u32 = QUALIFIER_SHIFT + QUALIFIER_WIDTH;
pub const USED_BITS: u32 = DEVICE_SHIFT + DEVICE_WIDTH;

pub const NAMEID_MASK: u32 = ((1 << NAMEID_WIDTH) - 1) << NAMEID_SHIFT;
pub const QUALIFIER_MASK: u32 = ((1 << QUALIFIER_WIDTH) - 1) << QUALIFIER_SHIFT;
pub const DEVICE_MASK: u32 = ((1 << DEVICE_WIDTH) - 1) << DEVICE_SHIFT;
pub const RESERVED_MASK: u32 = !((1 << USED_BITS) - 1);

/// Number of distinct table indices a code can address.
pub const MAX_EVENTS: usize = 1 << NAMEID_WIDTH;
/// Number of distinct devices a code can address.
pub const MAX_DEVICES: usize = 1 << DEVICE_WIDTH;

/// Qualifier flags carried by a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Qualifiers(u32);

impl Qualifiers {
    pub const NONE: Qualifiers = Qualifiers(0);
    pub const DEVICE: Qualifiers = Qualifiers(0x1);

    const DEFINED: u32 = Self::DEVICE.0;

    /// `None` when `bits` contains an undefined flag.
    pub fn from_bits(bits: u32) -> Option<Self> {
        (bits & !Self::DEFINED == 0).then_some(Qualifiers(bits))
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Qualifiers) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn has_device(self) -> bool {
        self.contains(Self::DEVICE)
    }
}

/// Packed event identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventCode(u32);

impl EventCode {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Unpacked fields of an [`EventCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventFields {
    pub nameid: usize,
    pub qualifiers: Qualifiers,
    pub device: usize,
}

impl EventFields {
    /// Qualified device, if the device flag is set.
    pub fn qualified_device(&self) -> Option<usize> {
        self.qualifiers.has_device().then_some(self.device)
    }
}

/// Pack a code. Fails for out-of-width fields and undefined flags.
pub fn encode(nameid: usize, qualifiers: Qualifiers, device: usize) -> Result<EventCode> {
    if nameid >= MAX_EVENTS {
        return Err(Error::invalid(format!("nameid {nameid} exceeds {NAMEID_WIDTH} bits")));
    }
    if device >= MAX_DEVICES {
        return Err(Error::invalid(format!("device {device} exceeds {DEVICE_WIDTH} bits")));
    }
    if Qualifiers::from_bits(qualifiers.bits()).is_none() {
        return Err(Error::invalid(format!("undefined qualifier bits {:#x}", qualifiers.bits())));
    }
    let raw = ((nameid as u32) << NAMEID_SHIFT)
        | (qualifiers.bits() << QUALIFIER_SHIFT)
        | ((device as u32) << DEVICE_SHIFT);
    Ok(EventCode(raw))
}

/// Code for `nameid`, qualified with `device` when one is given.
pub fn encode_for(nameid: usize, device: Option<usize>) -> Result<EventCode> {
    match device {
        Some(device) => encode(nameid, Qualifiers::DEVICE, device),
        None => encode(nameid, Qualifiers::NONE, 0),
    }
}

/// Unpack a code without consulting a table.
///
/// Rejects reserved bits and a nonzero device field without the device flag.
pub fn decode(code: EventCode) -> Result<EventFields> {
    let raw = code.raw();
    if raw & RESERVED_MASK != 0 {
        return Err(Error::no_such_event(format!("event code {code} has reserved bits set")));
    }
    let qualifiers = Qualifiers((raw & QUALIFIER_MASK) >> QUALIFIER_SHIFT);
    let device = ((raw & DEVICE_MASK) >> DEVICE_SHIFT) as usize;
    if !qualifiers.has_device() && device != 0 {
        return Err(Error::no_such_event(format!(
            "event code {code} names device {device} without a device qualifier"
        )));
    }
    Ok(EventFields {
        nameid: ((raw & NAMEID_MASK) >> NAMEID_SHIFT) as usize,
        qualifiers,
        device,
    })
}

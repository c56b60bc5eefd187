//! Error types for smimon-core operations

use std::fmt;

use crate::vendor::VendorStatus;

/// Result type for smimon-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while discovering, naming, reading or writing events
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Caller supplied a malformed argument (bad length, unknown modifier, value out of range)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The library, device or accessor cannot provide the requested service
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Discovery found zero GPUs and zero CPU sockets
    #[error("no devices found behind the system-management library")]
    NoDevices,

    /// Unknown event name, or an event code that does not decode against the table
    #[error("no such event: {0}")]
    NoSuchEvent(String),

    /// Devices already owned by another open context
    #[error("devices {mask:#x} are owned by another context")]
    Conflict { mask: u64 },

    /// The vendor library refused a write for lack of privileges
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Allocation of handle arrays or the event table failed
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// A vendor call returned a non-success status
    #[error("{call} failed: {status}")]
    Vendor { call: &'static str, status: VendorStatus },

    /// Write on a read-only event
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Generic failure
    #[error("{0}")]
    Misc(String),
}

impl Error {
    pub fn invalid(msg: impl fmt::Display) -> Self {
        Self::InvalidArgument(msg.to_string())
    }

    pub fn unsupported(msg: impl fmt::Display) -> Self {
        Self::NotSupported(msg.to_string())
    }

    pub fn no_such_event(msg: impl fmt::Display) -> Self {
        Self::NoSuchEvent(msg.to_string())
    }

    pub fn misc(msg: impl fmt::Display) -> Self {
        Self::Misc(msg.to_string())
    }

    /// Wrap a failed vendor read.
    pub fn vendor(call: &'static str, status: VendorStatus) -> Self {
        Self::Vendor { call, status }
    }

    /// Wrap a failed vendor write; "no permission" surfaces as [`Error::PermissionDenied`].
    pub fn vendor_write(call: &'static str, status: VendorStatus) -> Self {
        if status == VendorStatus::NoPerm {
            Self::PermissionDenied(format!("{call} requires elevated privileges"))
        } else {
            Self::Vendor { call, status }
        }
    }

    /// Stable status code reported across the C ABI.
    pub fn status(&self) -> Status {
        match self {
            Error::InvalidArgument(_) => Status::InvalidArgument,
            Error::NotSupported(_) | Error::NoDevices => Status::NotSupported,
            Error::NoSuchEvent(_) => Status::NoSuchEvent,
            Error::Conflict { .. } => Status::Conflict,
            Error::PermissionDenied(_) => Status::PermissionDenied,
            Error::OutOfMemory(_) => Status::OutOfMemory,
            Error::NotImplemented(_) => Status::NotImplemented,
            Error::Vendor { .. } | Error::Misc(_) => Status::Misc,
        }
    }
}

/// Small, stable status space shared with C callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Status {
    Ok = 0,
    InvalidArgument = -1,
    NotSupported = -2,
    NoSuchEvent = -3,
    Conflict = -4,
    PermissionDenied = -5,
    OutOfMemory = -6,
    Misc = -7,
    NotImplemented = -8,
}

impl Status {
    pub const ALL: [Status; 9] = [
        Status::Ok,
        Status::InvalidArgument,
        Status::NotSupported,
        Status::NoSuchEvent,
        Status::Conflict,
        Status::PermissionDenied,
        Status::OutOfMemory,
        Status::Misc,
        Status::NotImplemented,
    ];

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.code() == code)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::InvalidArgument => "INVALID_ARGUMENT",
            Status::NotSupported => "NOT_SUPPORTED",
            Status::NoSuchEvent => "NO_SUCH_EVENT",
            Status::Conflict => "CONFLICT",
            Status::PermissionDenied => "PERMISSION_DENIED",
            Status::OutOfMemory => "OUT_OF_MEMORY",
            Status::Misc => "MISC_ERROR",
            Status::NotImplemented => "NOT_IMPLEMENTED",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<T> From<&Result<T>> for Status {
    fn from(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Status::Ok,
            Err(err) => err.status(),
        }
    }
}

//! # smimon FFI
//!
//! C ABI for the smimon telemetry component.
//!
//! Every exported function returns an `i32` status (`0` on success, one of the
//! negative [`Status`] codes otherwise). Panics never cross the boundary; a
//! caught panic is reported as `MISC_ERROR`.
//!
//! ## Architecture
//!
//! - **Component** - process-wide singleton created by `smimon_init`
//! - **Context** - event set opened by `smimon_open` (u64 handle, 0 is invalid)
//!
//! Event codes are the packed `u32` values produced by the component; callers
//! treat them as opaque.

use std::ffi::{c_char, CStr};
use std::panic::{self, AssertUnwindSafe};

use smimon_core::{Error, Result, Status};

mod contexts;
mod events;
mod handles;
mod lifecycle;

pub use contexts::{smimon_close, smimon_open, smimon_read, smimon_reset, smimon_start, smimon_stop, smimon_write};
pub use events::{smimon_code_to_descr, smimon_code_to_name, smimon_enum, smimon_name_to_code};
pub use handles::{clear_all_registries, install_component};
pub use lifecycle::{smimon_init, smimon_shutdown};

/// `smimon_enum` modifier: first base event
pub const SMIMON_ENUM_FIRST: i32 = 0;
/// `smimon_enum` modifier: next base event
pub const SMIMON_ENUM_NEXT: i32 = 1;
/// `smimon_enum` modifier: next device qualifier of the same event
pub const SMIMON_ENUM_DEVICES: i32 = 2;

/// Run one exported call, converting errors and panics into a status code
pub(crate) fn ffi_call<F>(op: &'static str, f: F) -> i32
where
    F: FnOnce() -> Result<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Status::Ok.code(),
        Ok(Err(e)) => {
            tracing::debug!(op, error = %e, "call failed");
            e.status().code()
        }
        Err(_) => {
            tracing::error!(op, "panic caught at the C boundary");
            Status::Misc.code()
        }
    }
}

pub(crate) fn non_null<T>(ptr: *const T, what: &str) -> Result<()> {
    if ptr.is_null() {
        return Err(Error::InvalidArgument(format!("{what} is null")));
    }
    Ok(())
}

/// Human-readable name of a status code
///
/// The returned string is static and NUL-terminated; callers must not free it.
/// Unknown codes map to `"UNKNOWN_STATUS"`.
#[no_mangle]
pub extern "C" fn smimon_status_string(status: i32) -> *const c_char {
    status_cstr(status).as_ptr()
}

fn status_cstr(status: i32) -> &'static CStr {
    match Status::from_code(status) {
        Some(Status::Ok) => c"OK",
        Some(Status::InvalidArgument) => c"INVALID_ARGUMENT",
        Some(Status::NotSupported) => c"NOT_SUPPORTED",
        Some(Status::NoSuchEvent) => c"NO_SUCH_EVENT",
        Some(Status::Conflict) => c"CONFLICT",
        Some(Status::PermissionDenied) => c"PERMISSION_DENIED",
        Some(Status::OutOfMemory) => c"OUT_OF_MEMORY",
        Some(Status::Misc) => c"MISC_ERROR",
        Some(Status::NotImplemented) => c"NOT_IMPLEMENTED",
        None => c"UNKNOWN_STATUS",
    }
}

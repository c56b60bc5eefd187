//! Context lifecycle over opaque handles

use std::slice;

use smimon_core::{Error, EventCode, Result};

use crate::handles::{context, register_context, take_context, with_component};
use crate::{ffi_call, non_null};

/// Open a context over `count` event codes
///
/// Claims every device the events name. On success `*handle` receives a
/// non-zero handle; on failure it is left untouched.
///
/// # Safety
///
/// `codes` must be valid for `count` reads (it may be null when `count` is 0)
/// and `handle` must point to a writable `u64`.
#[no_mangle]
pub unsafe extern "C" fn smimon_open(codes: *const u32, count: usize, handle: *mut u64) -> i32 {
    ffi_call("smimon_open", || {
        non_null(handle, "handle")?;
        let codes: Vec<EventCode> = if count == 0 {
            Vec::new()
        } else {
            non_null(codes, "codes")?;
            // SAFETY: non-null and the caller guarantees `count` elements.
            unsafe { slice::from_raw_parts(codes, count) }
                .iter()
                .copied()
                .map(EventCode::from_raw)
                .collect()
        };
        // Registered under the component lock so shutdown cannot miss it.
        let new_handle = with_component(|c| c.open(&codes).map(register_context))?;
        tracing::debug!(handle = new_handle, events = count, "context opened");
        unsafe { *handle = new_handle };
        Ok(())
    })
}

/// Close a context and release its devices
///
/// The handle is invalid afterwards. Closing 0 or an already closed handle
/// succeeds.
#[no_mangle]
pub extern "C" fn smimon_close(handle: u64) -> i32 {
    ffi_call("smimon_close", || match take_context(handle) {
        Some(shared) => shared.lock().close(),
        None => Ok(()),
    })
}

/// Start counting on an open context
#[no_mangle]
pub extern "C" fn smimon_start(handle: u64) -> i32 {
    ffi_call("smimon_start", || context(handle)?.lock().start())
}

/// Stop counting on a running context
#[no_mangle]
pub extern "C" fn smimon_stop(handle: u64) -> i32 {
    ffi_call("smimon_stop", || context(handle)?.lock().stop())
}

/// Zero the context's value buffer and cached event values
#[no_mangle]
pub extern "C" fn smimon_reset(handle: u64) -> i32 {
    ffi_call("smimon_reset", || context(handle)?.lock().reset())
}

/// Read every event of a running context into `values`
///
/// `len` must equal the number of events the context was opened with. The
/// buffer is filled even when some reads fail; failed slots hold 0 and the
/// first failure is returned.
///
/// # Safety
///
/// `values` must be valid for `len` writes.
#[no_mangle]
pub unsafe extern "C" fn smimon_read(handle: u64, values: *mut i64, len: usize) -> i32 {
    ffi_call("smimon_read", || {
        non_null(values, "values")?;
        let shared = context(handle)?;
        let mut ctx = shared.lock();
        check_len(ctx.len(), len)?;
        let result = ctx.read();
        // SAFETY: non-null and the caller guarantees `len` writable elements.
        let out = unsafe { slice::from_raw_parts_mut(values, len) };
        out.copy_from_slice(ctx.values());
        result
    })
}

/// Write one value per event, in open order
///
/// Stops at the first event that fails; earlier writes stay applied.
///
/// # Safety
///
/// `values` must be valid for `len` reads.
#[no_mangle]
pub unsafe extern "C" fn smimon_write(handle: u64, values: *const i64, len: usize) -> i32 {
    ffi_call("smimon_write", || {
        non_null(values, "values")?;
        let shared = context(handle)?;
        let mut ctx = shared.lock();
        check_len(ctx.len(), len)?;
        // SAFETY: non-null and the caller guarantees `len` readable elements.
        let input = unsafe { slice::from_raw_parts(values, len) };
        ctx.write(input)
    })
}

fn check_len(expected: usize, len: usize) -> Result<()> {
    if expected != len {
        return Err(Error::invalid(format!("context holds {expected} events, buffer holds {len}")));
    }
    Ok(())
}

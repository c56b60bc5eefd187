//! Component initialization and shutdown

use smimon_core::{Component, Result};

use crate::ffi_call;
use crate::handles::{clear_all_registries, COMPONENT};

/// Initialize the component
///
/// Loads the vendor library on first use, discovers devices and builds the
/// event table. Calling it again on an initialized component is a no-op.
/// Also installs the global tracing subscriber configured by the
/// `SMIMON_LOG_*` variables unless the host already set one.
#[no_mangle]
pub extern "C" fn smimon_init() -> i32 {
    ffi_call("smimon_init", || {
        smimon_tracing::init_from_env();
        let mut slot = COMPONENT.write();
        let component = slot.get_or_insert_with(Component::from_env);
        component.init()
    })
}

/// Close every open context and shut the component down
///
/// Outstanding context handles become invalid. The vendor library stays
/// loaded so a later `smimon_init` does not reload it.
#[no_mangle]
pub extern "C" fn smimon_shutdown() -> i32 {
    ffi_call("smimon_shutdown", shutdown)
}

fn shutdown() -> Result<()> {
    // Held across the clear so no open can register a handle in between.
    let mut slot = COMPONENT.write();
    clear_all_registries();
    match slot.as_mut() {
        Some(component) => component.shutdown(),
        None => Ok(()),
    }
}

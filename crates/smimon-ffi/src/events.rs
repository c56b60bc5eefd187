//! Event enumeration and name/code translation

use std::ffi::{c_char, CStr};

use smimon_core::{EnumModifier, Error, EventCode, Result};

use crate::handles::with_component;
use crate::{ffi_call, non_null, SMIMON_ENUM_DEVICES, SMIMON_ENUM_FIRST, SMIMON_ENUM_NEXT};

fn parse_modifier(raw: i32) -> Result<EnumModifier> {
    match raw {
        SMIMON_ENUM_FIRST => Ok(EnumModifier::First),
        SMIMON_ENUM_NEXT => Ok(EnumModifier::Next),
        SMIMON_ENUM_DEVICES => Ok(EnumModifier::Devices),
        other => Err(Error::invalid(format!("unknown enumeration modifier {other}"))),
    }
}

/// Step through the event table
///
/// `code` is read as the starting point and overwritten with the next code.
/// `NO_SUCH_EVENT` marks the end of the walk.
///
/// # Safety
///
/// `code` must point to a writable `u32`.
#[no_mangle]
pub unsafe extern "C" fn smimon_enum(code: *mut u32, modifier_raw: i32) -> i32 {
    ffi_call("smimon_enum", || {
        non_null(code, "code")?;
        let modifier = parse_modifier(modifier_raw)?;
        // SAFETY: checked non-null; the caller guarantees it is writable.
        let current = EventCode::from_raw(unsafe { *code });
        let next = with_component(|c| c.enumerate(current, modifier))?;
        unsafe { *code = next.raw() };
        Ok(())
    })
}

/// Translate an event name to its code
///
/// # Safety
///
/// `name` must be a NUL-terminated string and `code` must point to a
/// writable `u32`.
#[no_mangle]
pub unsafe extern "C" fn smimon_name_to_code(name: *const c_char, code: *mut u32) -> i32 {
    ffi_call("smimon_name_to_code", || {
        non_null(name, "name")?;
        non_null(code, "code")?;
        // SAFETY: checked non-null; the caller guarantees NUL termination.
        let name = unsafe { CStr::from_ptr(name) }
            .to_str()
            .map_err(|_| Error::NoSuchEvent("event name is not UTF-8".to_string()))?;
        let resolved = with_component(|c| c.name_to_code(name))?;
        unsafe { *code = resolved.raw() };
        Ok(())
    })
}

/// Copy the full name of `code` into `buf`
///
/// Fails with `INVALID_ARGUMENT` and leaves `buf` untouched when the name and
/// its terminator do not fit in `len` bytes.
///
/// # Safety
///
/// `buf` must be valid for `len` bytes of writes.
#[no_mangle]
pub unsafe extern "C" fn smimon_code_to_name(code: u32, buf: *mut c_char, len: usize) -> i32 {
    ffi_call("smimon_code_to_name", || {
        let name = with_component(|c| c.code_to_name(EventCode::from_raw(code)))?;
        unsafe { copy_out(&name, buf, len) }
    })
}

/// Copy the description of `code` into `buf`
///
/// Same buffer rules as [`smimon_code_to_name`].
///
/// # Safety
///
/// `buf` must be valid for `len` bytes of writes.
#[no_mangle]
pub unsafe extern "C" fn smimon_code_to_descr(code: u32, buf: *mut c_char, len: usize) -> i32 {
    ffi_call("smimon_code_to_descr", || {
        let description = with_component(|c| c.code_to_description(EventCode::from_raw(code)))?;
        unsafe { copy_out(&description, buf, len) }
    })
}

/// # Safety
///
/// `buf` must be valid for `len` bytes of writes.
unsafe fn copy_out(text: &str, buf: *mut c_char, len: usize) -> Result<()> {
    non_null(buf, "buffer")?;
    let bytes = text.as_bytes();
    if bytes.len() >= len {
        return Err(Error::invalid(format!("buffer of {len} bytes cannot hold {} bytes", bytes.len() + 1)));
    }
    // SAFETY: bytes.len() + 1 <= len and the caller guarantees `len` writable bytes.
    unsafe {
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), buf.cast::<u8>(), bytes.len());
        *buf.add(bytes.len()) = 0;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::ptr;
    use std::sync::Arc;

    use serial_test::serial;
    use smimon_core::{Component, SmiConfig, Status, StubLibrary};

    use super::*;
    use crate::handles::install_component;
    use crate::smimon_init;

    fn setup(gpus: usize) {
        let lib = Arc::new(StubLibrary::builder().gpus(gpus).build());
        install_component(Component::with_library(lib, SmiConfig::default()));
        assert_eq!(smimon_init(), 0);
    }

    fn name_of(code: u32) -> String {
        let mut buf = [0 as c_char; 128];
        assert_eq!(unsafe { smimon_code_to_name(code, buf.as_mut_ptr(), buf.len()) }, 0);
        unsafe { CStr::from_ptr(buf.as_ptr()) }.to_str().expect("utf-8").to_string()
    }

    #[test]
    #[serial]
    fn names_round_trip_through_c_strings() {
        setup(2);
        let mut code = 0u32;
        let status = unsafe { smimon_name_to_code(c"temp_current:device=1:sensor=0".as_ptr(), &mut code) };
        assert_eq!(status, 0);
        assert_eq!(name_of(code), "temp_current:device=1:sensor=0");

        let mut descr = [0 as c_char; 256];
        assert_eq!(unsafe { smimon_code_to_descr(code, descr.as_mut_ptr(), descr.len()) }, 0);
        assert!(!unsafe { CStr::from_ptr(descr.as_ptr()) }.to_bytes().is_empty());
    }

    #[test]
    #[serial]
    fn short_buffers_are_rejected_untouched() {
        setup(1);
        let mut code = 0u32;
        assert_eq!(unsafe { smimon_name_to_code(c"perf_level:device=0".as_ptr(), &mut code) }, 0);

        let mut buf = [7 as c_char; 8];
        let status = unsafe { smimon_code_to_name(code, buf.as_mut_ptr(), buf.len()) };
        assert_eq!(status, Status::InvalidArgument.code());
        assert!(buf.iter().all(|&b| b == 7));
    }

    #[test]
    #[serial]
    fn enumeration_walks_to_the_end() {
        setup(1);
        let mut code = 0u32;
        assert_eq!(unsafe { smimon_enum(&mut code, SMIMON_ENUM_FIRST) }, 0);
        let first = name_of(code);
        assert!(!first.contains(":device="));

        let mut seen = 1;
        loop {
            match unsafe { smimon_enum(&mut code, SMIMON_ENUM_NEXT) } {
                0 => seen += 1,
                status => {
                    assert_eq!(status, Status::NoSuchEvent.code());
                    break;
                }
            }
        }
        assert!(seen > 1);
        assert_eq!(unsafe { smimon_enum(&mut code, 9) }, Status::InvalidArgument.code());
    }

    #[test]
    #[serial]
    fn null_pointers_are_invalid_arguments() {
        setup(1);
        let mut code = 0u32;
        assert_eq!(unsafe { smimon_name_to_code(ptr::null(), &mut code) }, Status::InvalidArgument.code());
        assert_eq!(unsafe { smimon_enum(ptr::null_mut(), SMIMON_ENUM_FIRST) }, Status::InvalidArgument.code());
        assert_eq!(
            unsafe { smimon_name_to_code(c"no_such_event".as_ptr(), &mut code) },
            Status::NoSuchEvent.code()
        );
    }
}

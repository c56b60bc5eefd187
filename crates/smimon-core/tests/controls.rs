mod common;

use smimon_core::vendor::ComputePartition;
use smimon_core::{Error, Status, StubLibrary};

use common::{codes, component};

const WATT_UW: i64 = 1_000_000;

#[test]
fn power_cap_write_reads_back_and_restores() {
    let (lib, component) = component(StubLibrary::builder().gpus(1));
    let events = codes(
        &component,
        &["power_cap:device=0", "power_cap_min:device=0", "power_cap_max:device=0"],
    );
    let mut limits = component.open(&events[1..]).expect("open limits");
    limits.start().expect("start");
    limits.read().expect("read limits");
    let (min, max) = (limits.values()[0], limits.values()[1]);
    limits.close().expect("close limits");

    let mut context = component.open(&events[..1]).expect("open cap");
    context.start().expect("start");
    context.read().expect("read cap");
    let original = context.values()[0];

    let lowered = (original - 50 * WATT_UW).clamp(min, max);
    assert_ne!(lowered, original);
    context.write(&[lowered]).expect("write lowered cap");
    context.read().expect("read back");
    assert_eq!(context.values()[0], lowered);

    context.write(&[original]).expect("restore");
    context.read().expect("read restored");
    assert_eq!(context.values()[0], original);
    assert_eq!(lib.writes().len(), 2);
}

#[test]
fn write_is_fail_fast() {
    let (lib, component) = component(StubLibrary::builder().gpus(1));
    let events = codes(
        &component,
        &["perf_level:device=0", "temp_current:device=0:sensor=0", "fan_speed:device=0:sensor=0"],
    );
    let mut context = component.open(&events).expect("open");

    let err = context.write(&[1, 40_000, 100]).expect_err("temperature is read-only");
    assert!(matches!(err, Error::NotImplemented(_)));
    assert_eq!(err.status(), Status::NotImplemented);

    let writes = lib.writes();
    assert_eq!(writes.len(), 1, "the fan write must not run");
    assert_eq!(writes[0].call, "set_perf_level");
    assert_eq!(context.values()[0], 1);
}

#[test]
fn write_checks_value_count() {
    let (_lib, component) = component(StubLibrary::builder().gpus(1));
    let mut context = component
        .open(&codes(&component, &["perf_level:device=0"]))
        .expect("open");
    assert!(matches!(context.write(&[]), Err(Error::InvalidArgument(_))));
    assert!(matches!(context.write(&[1, 2]), Err(Error::InvalidArgument(_))));
}

#[test]
fn write_without_privileges_is_permission_denied() {
    let (lib, component) = component(StubLibrary::builder().gpus(1));
    lib.deny_writes(true);
    let mut context = component
        .open(&codes(&component, &["power_cap:device=0"]))
        .expect("open");
    let err = context.write(&[200 * WATT_UW]).expect_err("denied");
    assert_eq!(err.status(), Status::PermissionDenied);
}

#[test]
fn out_of_range_values_are_invalid_arguments() {
    let (lib, component) = component(StubLibrary::builder().gpus(1));
    let mut context = component
        .open(&codes(&component, &["perf_level:device=0", "power_cap:device=0"]))
        .expect("open");
    assert!(matches!(context.write(&[-1, 0]), Err(Error::InvalidArgument(_))));
    assert!(lib.writes().is_empty());
}

#[test]
fn vendor_rejection_is_misc() {
    let (_lib, component) = component(StubLibrary::builder().gpus(1));
    let mut context = component
        .open(&codes(&component, &["power_cap:device=0"]))
        .expect("open");
    // below the stub's 100 W floor
    let err = context.write(&[WATT_UW]).expect_err("vendor refuses");
    assert_eq!(err.status(), Status::Misc);
}

#[test]
fn compute_partition_switches_mode() {
    let (_lib, component) = component(StubLibrary::builder().gpus(1));
    let mut context = component
        .open(&codes(&component, &["compute_partition:device=0"]))
        .expect("open");
    context.start().expect("start");
    context.read().expect("read");
    assert_eq!(context.values()[0], i64::from(ComputePartition::Spx.raw()));

    context
        .write(&[i64::from(ComputePartition::Dpx.raw())])
        .expect("switch to DPX");
    context.read().expect("read");
    assert_eq!(context.values()[0], i64::from(ComputePartition::Dpx.raw()));
}

#[test]
fn clock_mask_selects_active_level() {
    let (_lib, component) = component(StubLibrary::builder().gpus(1));
    let mut context = component
        .open(&codes(&component, &["clk_sys_mask:device=0", "clk_sys_freq_current:device=0"]))
        .expect("open");
    context.start().expect("start");
    context.read().expect("read");
    assert_eq!(context.values()[0], 0b1000, "highest level active by default");

    context.write(&[0b0011, 0]).expect_err("frequency is read-only");
    context.read().expect("read");
    assert_eq!(context.values()[0], 0b0010);
}

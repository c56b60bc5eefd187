//! Machines that fill the 6-bit device field.

mod common;

use smimon_core::codec::{self, MAX_DEVICES};
use smimon_core::{EnumModifier, Error, EventCode, StubLibrary};

use common::{codes, component};

#[test]
fn full_width_machine_initializes() {
    let (_lib, wide) = component(StubLibrary::builder().gpus(MAX_DEVICES));
    let (_lib, single) = component(StubLibrary::builder().gpus(1));

    assert_eq!(wide.device_count(), MAX_DEVICES);
    assert_eq!(wide.gpu_count(), MAX_DEVICES);
    // Names merge across devices, so the table does not grow with the GPU count.
    assert_eq!(wide.table().unwrap().len(), single.table().unwrap().len());

    let perf = wide.table().unwrap().find("perf_level").expect("perf_level");
    assert_eq!(perf.device_map(), u64::MAX);
}

#[test]
fn every_supported_gpu_count_initializes() {
    for gpus in [16, 20, 24, 32, 63] {
        let (_lib, component) = component(StubLibrary::builder().gpus(gpus));
        assert_eq!(component.device_count(), gpus, "{gpus} gpus");
    }
}

#[test]
fn last_device_round_trips() {
    let (_lib, component) = component(StubLibrary::builder().gpus(MAX_DEVICES));

    let code = component.name_to_code("perf_level:device=63").unwrap();
    let fields = codec::decode(code).unwrap();
    assert_eq!(fields.qualified_device(), Some(63));
    assert_eq!(component.code_to_name(code).unwrap(), "perf_level:device=63");

    let temp = component.name_to_code("temp_current:device=63:sensor=0").unwrap();
    assert_eq!(component.code_to_name(temp).unwrap(), "temp_current:device=63:sensor=0");

    assert!(matches!(
        component.name_to_code("perf_level:device=64"),
        Err(Error::NoSuchEvent(_))
    ));
}

#[test]
fn top_bit_of_the_busy_mask() {
    let (_lib, component) = component(StubLibrary::builder().gpus(MAX_DEVICES));

    let mut held = component
        .open(&codes(&component, &["perf_level:device=63"]))
        .expect("device 63");
    assert_eq!(held.owned_devices(), 1u64 << 63);
    assert_eq!(component.busy_devices(), 1u64 << 63);

    let err = component
        .open(&codes(&component, &["perf_level:device=0", "fan_speed:device=63:sensor=0"]))
        .expect_err("device 63 is taken");
    assert_eq!(err, Error::Conflict { mask: 1u64 << 63 });
    assert_eq!(component.busy_devices(), 1u64 << 63, "device 0 must not be acquired");

    let mut rest = component
        .open(&codes(&component, &["perf_level:device=0", "perf_level:device=62"]))
        .expect("disjoint devices");
    held.start().unwrap();
    held.read().unwrap();
    assert_eq!(component.busy_devices(), (1u64 << 63) | (1u64 << 62) | 1);

    held.close().unwrap();
    rest.close().unwrap();
    assert_eq!(component.busy_devices(), 0);
}

#[test]
fn device_enumeration_reaches_the_last_device() {
    let (_lib, component) = component(StubLibrary::builder().gpus(MAX_DEVICES));
    let base = codes(&component, &["perf_level:device=0"])[0];
    let base = codec::encode_for(codec::decode(base).unwrap().nameid, None).unwrap();

    let mut devices = Vec::new();
    let mut code: EventCode = base;
    while let Ok(next) = component.enumerate(code, EnumModifier::Devices) {
        devices.push(codec::decode(next).unwrap().qualified_device().unwrap());
        code = next;
    }
    assert_eq!(devices, (0..MAX_DEVICES).collect::<Vec<_>>());
    assert!(matches!(
        component.enumerate(code, EnumModifier::Devices),
        Err(Error::NoSuchEvent(_))
    ));
}

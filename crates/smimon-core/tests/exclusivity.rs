mod common;

use std::sync::Barrier;
use std::thread;
use std::time::Duration;

use smimon_core::{Error, StubLibrary};

use common::{codes, component};

#[test]
fn overlapping_open_conflicts_without_side_effects() {
    let (_lib, component) = component(StubLibrary::builder().gpus(3));

    let first = component
        .open(&codes(&component, &["perf_level:device=0", "perf_level:device=1"]))
        .expect("first open");
    assert_eq!(component.busy_devices(), 0b011);

    let err = component
        .open(&codes(&component, &["perf_level:device=1", "perf_level:device=2"]))
        .expect_err("device 1 is taken");
    assert_eq!(err, Error::Conflict { mask: 0b010 });
    assert_eq!(component.busy_devices(), 0b011, "device 2 must not be acquired");

    drop(first);
    let third = component
        .open(&codes(&component, &["perf_level:device=1", "perf_level:device=2"]))
        .expect("open after release");
    assert_eq!(third.owned_devices(), 0b110);
}

#[test]
fn disjoint_devices_open_concurrently() {
    let (_lib, component) = component(StubLibrary::builder().gpus(2));
    let a = component.open(&codes(&component, &["perf_level:device=0"])).expect("a");
    let b = component.open(&codes(&component, &["perf_level:device=1"])).expect("b");
    assert_eq!(a.owned_devices() | b.owned_devices(), component.busy_devices());
}

#[test]
fn system_events_take_no_device() {
    let (_lib, component) = component(StubLibrary::builder().gpus(1));
    let a = component.open(&codes(&component, &["lib_version_major"])).expect("a");
    let b = component.open(&codes(&component, &["lib_version_minor"])).expect("b");
    assert_eq!(a.owned_devices(), 0);
    assert_eq!(b.owned_devices(), 0);
}

#[test]
fn second_thread_sees_conflict_while_first_holds() {
    let (_lib, component) = component(StubLibrary::builder().gpus(1));
    let events = codes(&component, &["temp_current:device=0:sensor=0"]);
    let held = Barrier::new(2);

    thread::scope(|s| {
        s.spawn(|| {
            let mut context = component.open(&events).expect("holder opens");
            held.wait();
            thread::sleep(Duration::from_millis(100));
            context.close().expect("holder closes");
        });
        s.spawn(|| {
            held.wait();
            let err = component.open(&events).expect_err("device 0 is held");
            assert!(matches!(err, Error::Conflict { .. }));
        });
    });

    assert_eq!(component.busy_devices(), 0);
    component.open(&events).expect("free again");
}

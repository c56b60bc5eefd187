mod common;

use std::sync::Arc;

use parking_lot::Mutex;
use smimon_core::{Component, EnumModifier, Error, EventCode, EventHooks, HookEvent, Status, StubLibrary};

use common::{codes, component};

#[test]
fn first_event_has_a_well_formed_name() {
    let (_lib, component) = component(StubLibrary::builder().gpus(1));
    let first = component
        .enumerate(EventCode::from_raw(0), EnumModifier::First)
        .expect("first event");
    assert_eq!(first.raw() & 0xfff, 0);

    let name = component.code_to_name(first).expect("name");
    assert!(!name.is_empty());
    assert!(!name.chars().any(char::is_control));
    assert!(name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | ':' | '=')));
}

#[test]
fn temperature_read_cycle_releases_devices() {
    let (_lib, component) = component(StubLibrary::builder().gpus(2));
    let events = codes(&component, &["temp_current:device=0:sensor=0"]);

    let mut context = component.open(&events).expect("open");
    assert_eq!(component.busy_devices(), 0b01);

    context.start().expect("start");
    context.read().expect("read");
    let millidegrees = context.values()[0];
    assert!((1_000..150_000).contains(&millidegrees), "implausible temperature {millidegrees}");

    context.stop().expect("stop");
    context.close().expect("close");
    assert_eq!(component.busy_devices(), 0);
}

#[test]
fn close_is_idempotent_and_drop_releases() {
    let (_lib, component) = component(StubLibrary::builder().gpus(1));
    let events = codes(&component, &["perf_level:device=0"]);

    let mut context = component.open(&events).expect("open");
    context.close().expect("close");
    context.close().expect("second close");
    assert!(!context.is_open());

    let dropped = component.open(&events).expect("reopen");
    assert_eq!(component.busy_devices(), 0b1);
    drop(dropped);
    assert_eq!(component.busy_devices(), 0);
}

#[test]
fn read_requires_running() {
    let (_lib, component) = component(StubLibrary::builder().gpus(1));
    let mut context = component
        .open(&codes(&component, &["perf_level:device=0"]))
        .expect("open");
    assert!(matches!(context.read(), Err(Error::InvalidArgument(_))));
    context.start().expect("start");
    context.stop().expect("stop");
    assert!(matches!(context.read(), Err(Error::InvalidArgument(_))));
}

#[test]
fn batch_read_is_best_effort() {
    let (lib, component) = component(StubLibrary::builder().gpus(1));
    let events = codes(
        &component,
        &["temp_current:device=0:sensor=0", "perf_level:device=0", "process_count:device=0"],
    );
    let mut context = component.open(&events).expect("open");
    context.start().expect("start");

    lib.fail("perf_level", Some(0));
    let err = context.read().expect_err("forced failure");
    assert_eq!(err.status(), Status::Misc);

    let values = context.values();
    assert_eq!(values.len(), 3);
    assert!(values[0] > 0);
    assert_eq!(values[1], 0);
    assert_eq!(values[2], 3);
}

#[test]
fn open_rejects_unqualified_device_events() {
    let (_lib, component) = component(StubLibrary::builder().gpus(1));
    let base = component.name_to_code("perf_level:device=0").expect("code").raw() & 0xfff;
    let err = component
        .open(&[EventCode::from_raw(base)])
        .expect_err("base code has no device");
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert_eq!(component.busy_devices(), 0);
}

#[test]
fn open_rejects_codes_outside_the_table() {
    let (_lib, component) = component(StubLibrary::builder().gpus(1));
    let err = component.open(&[EventCode::from_raw(0xfff)]).expect_err("nameid out of range");
    assert!(matches!(err, Error::NoSuchEvent(_)));
}

#[test]
fn reset_zeroes_buffer_and_cache() {
    let (_lib, component) = component(StubLibrary::builder().gpus(1));
    let events = codes(&component, &["process_count:device=0"]);
    let mut context = component.open(&events).expect("open");
    context.start().expect("start");
    context.read().expect("read");
    assert_eq!(context.values(), &[3]);

    context.reset().expect("reset");
    assert_eq!(context.values(), &[0]);
    let table = component.table().expect("table");
    assert_eq!(table.find("process_count").expect("descriptor").cached_value(), 0);
}

#[test]
fn shutdown_invalidates_open_contexts() {
    let (_lib, mut component) = component(StubLibrary::builder().gpus(1));
    let mut context = component
        .open(&codes(&component, &["perf_level:device=0"]))
        .expect("open");
    context.start().expect("start");

    component.shutdown().expect("shutdown");
    component.shutdown().expect("second shutdown");
    assert_eq!(context.read().expect_err("no live handle").status(), Status::Misc);
    context.close().expect("close");
}

#[derive(Debug, Default)]
struct Recorder {
    log: Mutex<Vec<String>>,
    fail_open_on: Option<usize>,
}

impl EventHooks for Recorder {
    fn open(&self, event: &HookEvent<'_>) -> smimon_core::Result<()> {
        self.log.lock().push(format!("open {}", event.name));
        if event.device == self.fail_open_on {
            return Err(Error::misc("open refused"));
        }
        Ok(())
    }

    fn close(&self, event: &HookEvent<'_>) -> smimon_core::Result<()> {
        self.log.lock().push(format!("close {}", event.name));
        Ok(())
    }

    fn start(&self, event: &HookEvent<'_>) -> smimon_core::Result<()> {
        self.log.lock().push(format!("start {}", event.name));
        Ok(())
    }

    fn stop(&self, event: &HookEvent<'_>) -> smimon_core::Result<()> {
        self.log.lock().push(format!("stop {}", event.name));
        Err(Error::misc("stop reported"))
    }
}

fn hooked(recorder: &Arc<Recorder>) -> (Arc<StubLibrary>, Component) {
    let (lib, mut component) = component(StubLibrary::builder().gpus(2));
    for name in ["perf_level", "process_count"] {
        component
            .set_hooks(name, Some(recorder.clone() as Arc<dyn EventHooks>))
            .expect("set hooks");
    }
    (lib, component)
}

#[test]
fn hooks_run_through_the_lifecycle() {
    let recorder = Arc::new(Recorder::default());
    let (_lib, component) = hooked(&recorder);
    let mut context = component
        .open(&codes(&component, &["perf_level:device=0", "process_count:device=0"]))
        .expect("open");
    context.start().expect("start");
    assert!(context.stop().is_err(), "first stop error is reported");
    assert!(!context.is_running());
    context.close().expect("close");

    let log = recorder.log.lock().clone();
    assert_eq!(
        log,
        vec![
            "open perf_level",
            "open process_count",
            "start perf_level",
            "start process_count",
            "stop perf_level",
            "stop process_count",
            "close perf_level",
            "close process_count",
        ]
    );
}

#[test]
fn failed_open_hook_rolls_back() {
    let recorder = Arc::new(Recorder {
        fail_open_on: Some(1),
        ..Recorder::default()
    });
    let (_lib, component) = hooked(&recorder);
    let err = component
        .open(&codes(&component, &["perf_level:device=0", "process_count:device=1"]))
        .expect_err("second open hook fails");
    assert!(matches!(err, Error::Misc(_)));
    assert_eq!(component.busy_devices(), 0);
    assert_eq!(
        recorder.log.lock().clone(),
        vec!["open perf_level", "open process_count", "close perf_level"]
    );
}

#[test]
fn hooks_cannot_change_under_open_contexts() {
    let recorder = Arc::new(Recorder::default());
    let (_lib, mut component) = hooked(&recorder);
    let context = component
        .open(&codes(&component, &["perf_level:device=0"]))
        .expect("open");
    assert!(matches!(
        component.set_hooks("perf_level", None),
        Err(Error::InvalidArgument(_))
    ));
    drop(context);
    component.set_hooks("perf_level", None).expect("detach");
}

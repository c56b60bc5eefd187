#![allow(dead_code)]

use std::sync::Arc;

use smimon_core::vendor::StubBuilder;
use smimon_core::{Component, EventCode, SmiConfig, StubLibrary};

/// Initialized component over a stub, plus the stub for inspection.
pub fn component(builder: StubBuilder) -> (Arc<StubLibrary>, Component) {
    let lib = Arc::new(builder.build());
    let mut component = Component::with_library(lib.clone(), SmiConfig::default());
    component.init().expect("component init");
    (lib, component)
}

pub fn codes(component: &Component, names: &[&str]) -> Vec<EventCode> {
    names
        .iter()
        .map(|name| component.name_to_code(name).unwrap_or_else(|e| panic!("{name}: {e}")))
        .collect()
}

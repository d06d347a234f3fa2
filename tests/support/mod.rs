//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use solvra_runtime::object::{Address, NominalBuilder, ObjectBuilder};
use solvra_runtime::segment::{MemoryLoader, SegmentManager};
use solvra_runtime::SegmentObject;

/// Near index of a descriptor address.
pub fn near(address: Address) -> u32 {
    address.descriptor_offset().expect("near address")
}

/// Manager whose loader serves `objects`; the first one is loaded as segment 0.
pub fn manager_with(objects: Vec<(&str, SegmentObject)>) -> (SegmentManager, u32) {
    let loader = MemoryLoader::new();
    let first = objects.first().map(|(location, _)| location.to_string());
    for (location, object) in objects {
        loader.insert_object(location, object);
    }
    let mut manager = SegmentManager::new(Arc::new(loader));
    let main = manager
        .get_or_load_segment(&first.expect("at least one object"))
        .expect("main segment");
    (manager, main)
}

/// Base (1 member, 1 method) <- Mid (+1 member) <- Leaf (+1 member, overrides Base.speak).
pub struct Hierarchy {
    pub object: SegmentObject,
    pub base: Address,
    pub mid: Address,
    pub leaf: Address,
    pub fields: [Address; 3],
    pub speak: Address,
    pub leaf_speak: Address,
}

pub fn hierarchy() -> Hierarchy {
    let mut builder = ObjectBuilder::new();
    let x = builder.add_field("x");
    let y = builder.add_field("y");
    let z = builder.add_field("z");
    let speak = builder.add_call("Base.speak", &[0x10]);
    let leaf_speak = builder.add_call("Leaf.speak", &[0x20]);
    let base = builder.add_class(NominalBuilder::new("Base").member(x).method(speak));
    let mid = builder.add_class(NominalBuilder::new("Mid").extends(base).member(y));
    let leaf = builder.add_class(
        NominalBuilder::new("Leaf")
            .extends(mid)
            .member(z)
            .override_method(leaf_speak, speak),
    );
    Hierarchy {
        object: builder.build(),
        base,
        mid,
        leaf,
        fields: [x, y, z],
        speak,
        leaf_speak,
    }
}

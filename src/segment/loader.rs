//==================================================
// File: segment/loader.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Segment object sources
// Objective: Supply segment objects and native trap plugins by module location
//==================================================

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use crate::object::SegmentObject;
use crate::traps::NativePlugin;
use crate::{SolvraError, SolvraResult};

/// File extension of serialized segment objects.
pub const SEGMENT_EXTENSION: &str = "sgo";

/// Source of segment objects. Implementations must be shareable across the runtime.
pub trait SegmentLoader: Send + Sync {
    /// Load the object for `location`, failing with `MissingObject` when it does not exist.
    fn load_object(&self, location: &str) -> SolvraResult<SegmentObject>;

    /// Native traps backing `location`, if it has any.
    fn load_plugin(&self, _location: &str) -> Option<NativePlugin> {
        None
    }
}

/// Loader over objects registered in memory. Used by embedders and tests.
#[derive(Debug, Default)]
pub struct MemoryLoader {
    objects: Mutex<HashMap<String, SegmentObject>>,
    plugins: Mutex<HashMap<String, NativePlugin>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_object(&self, location: impl Into<String>, object: SegmentObject) {
        self.objects.lock().insert(location.into(), object);
    }

    pub fn insert_plugin(&self, location: impl Into<String>, plugin: NativePlugin) {
        self.plugins.lock().insert(location.into(), plugin);
    }

    pub fn with_object(self, location: impl Into<String>, object: SegmentObject) -> Self {
        self.insert_object(location, object);
        self
    }
}

impl SegmentLoader for MemoryLoader {
    fn load_object(&self, location: &str) -> SolvraResult<SegmentObject> {
        self.objects
            .lock()
            .get(location)
            .cloned()
            .ok_or_else(|| SolvraError::MissingObject(location.to_string()))
    }

    fn load_plugin(&self, location: &str) -> Option<NativePlugin> {
        self.plugins.lock().get(location).cloned()
    }
}

/// Loader reading `<search path>/<location>.sgo`, first match wins.
#[derive(Debug, Default)]
pub struct DirectoryLoader {
    search_paths: Vec<PathBuf>,
    plugins: Mutex<HashMap<String, NativePlugin>>,
}

impl DirectoryLoader {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self {
            search_paths,
            plugins: Mutex::new(HashMap::new()),
        }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Register native traps for `location`; objects on disk cannot carry them.
    pub fn register_plugin(&self, location: impl Into<String>, plugin: NativePlugin) {
        self.plugins.lock().insert(location.into(), plugin);
    }

    pub fn locate(&self, location: &str) -> Option<PathBuf> {
        self.search_paths
            .iter()
            .map(|dir| object_path(dir, location))
            .find(|path| path.is_file())
    }
}

fn object_path(dir: &Path, location: &str) -> PathBuf {
    dir.join(format!("{location}.{SEGMENT_EXTENSION}"))
}

impl SegmentLoader for DirectoryLoader {
    fn load_object(&self, location: &str) -> SolvraResult<SegmentObject> {
        let path = self
            .locate(location)
            .ok_or_else(|| SolvraError::MissingObject(location.to_string()))?;
        debug!(target: "solvra_runtime::loader", path = %path.display(), "reading segment");
        let bytes = fs::read(&path)?;
        Ok(SegmentObject::from_bytes(&bytes)?)
    }

    fn load_plugin(&self, location: &str) -> Option<NativePlugin> {
        self.plugins.lock().get(location).cloned()
    }
}


//==================================================
// End of file
//==================================================

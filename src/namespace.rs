use rhai::{Dynamic, Map, Scope};

use crate::error::ProbeError;
use crate::introspect::{self, MemberName};

/// Top-level names visible to the console: everything plugins exported plus host globals.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    globals: Map,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(globals: Map) -> Self {
        Self { globals }
    }

    pub fn set(&mut self, name: &str, value: Dynamic) -> Option<Dynamic> {
        self.globals.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<&Dynamic> {
        self.globals.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.globals.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.globals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.globals.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.globals.keys().map(|key| key.as_str())
    }

    /// Copies every member of a map-valued export into the namespace. Returns the names merged.
    pub fn merge_exports(&mut self, exports: &Dynamic) -> Vec<String> {
        let Some(map) = exports.read_lock::<Map>() else {
            return Vec::new();
        };
        let mut merged = Vec::with_capacity(map.len());
        for (name, value) in map.iter() {
            self.globals.insert(name.clone(), value.clone());
            merged.push(name.to_string());
        }
        merged
    }

    pub fn visible_members(&self) -> Result<Vec<MemberName>, ProbeError> {
        Ok(introspect::map_members(&self.globals))
    }

    /// Scope with every global bound as a variable, for evaluating console input.
    pub fn to_scope(&self) -> Scope<'static> {
        let mut scope = Scope::new();
        for (name, value) in self.globals.iter() {
            scope.push_dynamic(name.as_str(), value.clone());
        }
        scope
    }
}

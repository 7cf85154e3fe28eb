use std::fmt;

use rhai::{Dynamic, Map};

use crate::error::ProbeError;
use crate::foreign::{ForeignHandle, MemberKind};

/// Members every foreign object inherits from the host base type. Never offered as completions.
pub const BASE_OBJECT_MEMBERS: &[&str] =
    &["equals", "getClass", "class", "hashCode", "notify", "notifyAll", "toString", "wait", "clone", "finalize"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberName {
    pub name: String,
    pub callable: bool,
}

impl MemberName {
    pub fn new(name: impl Into<String>, callable: bool) -> Self {
        Self { name: name.into(), callable }
    }
}

/// Callable members render with a trailing `()`.
impl fmt::Display for MemberName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.callable {
            write!(f, "{}()", self.name)
        } else {
            f.write_str(&self.name)
        }
    }
}

pub enum ValueClass<'a> {
    Native(&'a Dynamic),
    Foreign(ForeignHandle),
}

pub fn classify(value: &Dynamic) -> ValueClass<'_> {
    match value.read_lock::<ForeignHandle>() {
        Some(handle) => ValueClass::Foreign((*handle).clone()),
        None => ValueClass::Native(value),
    }
}

/// Visible members of a value, sorted by their rendered form.
pub fn visible_members(value: &Dynamic) -> Result<Vec<MemberName>, ProbeError> {
    let mut members = match classify(value) {
        ValueClass::Foreign(handle) => foreign_members(&handle)?,
        ValueClass::Native(value) => native_members(value),
    };
    sort_members(&mut members);
    Ok(members)
}

pub fn map_members(map: &Map) -> Vec<MemberName> {
    let mut members: Vec<MemberName> = map
        .iter()
        .filter(|(key, _)| !key.starts_with('_'))
        .map(|(key, value)| MemberName::new(key.as_str(), value.is_fnptr()))
        .collect();
    sort_members(&mut members);
    members
}

/// Reads one member. `None` when the value has no such member or cannot have members.
pub fn member(value: &Dynamic, name: &str) -> Option<Dynamic> {
    match classify(value) {
        ValueClass::Foreign(handle) => handle.get(name),
        ValueClass::Native(value) => value.read_lock::<Map>().and_then(|map| map.get(name).cloned()),
    }
}

fn native_members(value: &Dynamic) -> Vec<MemberName> {
    if value.is_array() || value.is_blob() {
        return Vec::new();
    }
    match value.read_lock::<Map>() {
        Some(map) => map_members(&map),
        None => Vec::new(),
    }
}

fn foreign_members(handle: &ForeignHandle) -> Result<Vec<MemberName>, ProbeError> {
    let mut members = Vec::new();
    for key in handle.keys() {
        if BASE_OBJECT_MEMBERS.contains(&key.as_str()) {
            continue;
        }
        match handle.probe(&key) {
            Ok(kind) => members.push(MemberName::new(key, kind == MemberKind::Callable)),
            Err(err) if err.is_benign() => {
                tracing::trace!(target: "script", "skipping {}.{key}: {err}", handle.type_name());
            }
            Err(err) => return Err(err),
        }
    }
    Ok(members)
}

fn sort_members(members: &mut [MemberName]) {
    members.sort_by_cached_key(|member| member.to_string());
}

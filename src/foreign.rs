use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rhai::Dynamic;

use crate::error::ProbeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Callable,
    Value,
}

/// An object owned by the host whose members are discovered through its own enumeration
/// channel rather than script-level reflection.
pub trait ForeignObject: Send + Sync {
    fn type_name(&self) -> &str;

    /// Every key the object exposes, including members inherited from the host base type.
    fn keys(&self) -> Vec<String>;

    fn probe(&self, member: &str) -> Result<MemberKind, ProbeError>;

    fn get(&self, member: &str) -> Option<Dynamic>;
}

/// Script-visible wrapper for a [`ForeignObject`]. Its presence inside a `Dynamic` is what
/// marks the value as foreign.
#[derive(Clone)]
pub struct ForeignHandle(Arc<dyn ForeignObject>);

impl ForeignHandle {
    pub fn new(object: impl ForeignObject + 'static) -> Self {
        Self(Arc::new(object))
    }

    pub fn into_dynamic(self) -> Dynamic {
        Dynamic::from(self)
    }

    pub fn type_name(&self) -> &str {
        self.0.type_name()
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.keys()
    }

    pub fn probe(&self, member: &str) -> Result<MemberKind, ProbeError> {
        self.0.probe(member)
    }

    pub fn get(&self, member: &str) -> Option<Dynamic> {
        self.0.get(member)
    }
}

impl fmt::Debug for ForeignHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ForeignHandle<{}>", self.0.type_name())
    }
}

enum ReflectedMember {
    Method,
    Property(Dynamic),
    Detached(String),
    Broken(String),
}

/// Table-driven [`ForeignObject`] for hosts that describe their objects up front.
pub struct ReflectedObject {
    type_name: String,
    members: BTreeMap<String, ReflectedMember>,
}

impl ReflectedObject {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self { type_name: type_name.into(), members: BTreeMap::new() }
    }

    /// Adds the members every host object inherits from the host base type.
    pub fn with_base_members(mut self) -> Self {
        for name in ["equals", "getClass", "hashCode", "notify", "notifyAll", "toString", "wait"] {
            self.members.insert(name.to_string(), ReflectedMember::Method);
        }
        self.members.insert("class".to_string(), ReflectedMember::Property(Dynamic::from(self.type_name.clone())));
        self
    }

    pub fn method(mut self, name: impl Into<String>) -> Self {
        self.members.insert(name.into(), ReflectedMember::Method);
        self
    }

    pub fn property(mut self, name: impl Into<String>, value: Dynamic) -> Self {
        self.members.insert(name.into(), ReflectedMember::Property(value));
        self
    }

    /// A member whose inspection fails because the owning entity is not attached.
    pub fn detached(mut self, name: impl Into<String>, reason: impl Into<String>) -> Self {
        self.members.insert(name.into(), ReflectedMember::Detached(reason.into()));
        self
    }

    /// A member whose inspection fails for a reason enumeration cannot recover from.
    pub fn broken(mut self, name: impl Into<String>, reason: impl Into<String>) -> Self {
        self.members.insert(name.into(), ReflectedMember::Broken(reason.into()));
        self
    }

    pub fn into_handle(self) -> ForeignHandle {
        ForeignHandle::new(self)
    }
}

impl ForeignObject for ReflectedObject {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn keys(&self) -> Vec<String> {
        self.members.keys().cloned().collect()
    }

    fn probe(&self, member: &str) -> Result<MemberKind, ProbeError> {
        match self.members.get(member) {
            Some(ReflectedMember::Method) => Ok(MemberKind::Callable),
            Some(ReflectedMember::Property(value)) if value.is_fnptr() => Ok(MemberKind::Callable),
            Some(ReflectedMember::Property(_)) => Ok(MemberKind::Value),
            Some(ReflectedMember::Detached(reason)) => Err(ProbeError::detached(member, reason.clone())),
            Some(ReflectedMember::Broken(reason)) => Err(ProbeError::unclassified(member, reason.clone())),
            None => Err(ProbeError::unclassified(member, format!("no member on {}", self.type_name))),
        }
    }

    fn get(&self, member: &str) -> Option<Dynamic> {
        match self.members.get(member)? {
            ReflectedMember::Method => Some(Dynamic::UNIT),
            ReflectedMember::Property(value) => Some(value.clone()),
            ReflectedMember::Detached(_) | ReflectedMember::Broken(_) => None,
        }
    }
}

//! Identities
//!
//! Value types naming actors, actor systems and the channels that connect them.
//! All of them are immutable and compare by exact value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Unique actor identifier within one actor system
///
/// The generation comes from a system-wide counter, so two actors spawned with
/// the same name at different times never share an identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId {
    name: Arc<str>,
    generation: u64,
}

impl ActorId {
    pub fn new(name: impl Into<Arc<str>>, generation: u64) -> Self {
        Self {
            name: name.into(),
            generation,
        }
    }

    /// Identity of the no-target reference
    pub fn none() -> Self {
        Self::new("<none>", 0)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_none(&self) -> bool {
        self.generation == 0 && &*self.name == "<none>"
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.generation)
    }
}

/// Identity of an actor system
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SystemId {
    name: Arc<str>,
    id: Uuid,
}

impl SystemId {
    /// Create a fresh identity for a system with the given name
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            id: Uuid::new_v4(),
        }
    }

    /// Rebuild a known identity, e.g. one announced by a remote peer
    pub fn from_parts(name: impl Into<Arc<str>>, id: Uuid) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }

    /// Identity of the system behind the no-target reference
    pub fn none() -> Self {
        Self::from_parts("<no-system>", Uuid::nil())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uuid(&self) -> Uuid {
        self.id
    }

    pub fn is_none(&self) -> bool {
        self.id.is_nil()
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.id.simple())
    }
}

/// Identity of a delivery channel: a channel kind plus an instance name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId {
    kind: Arc<str>,
    name: Arc<str>,
}

impl ChannelId {
    pub const LOCAL_KIND: &'static str = "local";
    pub const NONE_KIND: &'static str = "none";

    pub fn new(kind: impl Into<Arc<str>>, name: impl Into<Arc<str>>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Channel used for in-process delivery
    pub fn local() -> Self {
        Self::new(Self::LOCAL_KIND, "direct")
    }

    /// Channel of the no-target reference
    pub fn none() -> Self {
        Self::new(Self::NONE_KIND, "")
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

/// Opaque key/value description of a channel (address, port, ...)
pub type ChannelProperties = BTreeMap<String, String>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_id_equality_is_exact() {
        let a = ActorId::new("worker", 1);
        let b = ActorId::new("worker", 2);
        assert_ne!(a, b);
        assert_eq!(a, ActorId::new("worker", 1));
        assert_eq!(a.to_string(), "worker#1");
    }

    #[test]
    fn test_sentinels() {
        assert!(ActorId::none().is_none());
        assert!(!ActorId::new("x", 0).is_none());
        assert!(SystemId::none().is_none());
        assert_eq!(ChannelId::none().kind(), ChannelId::NONE_KIND);
    }

    #[test]
    fn test_system_id_fresh_per_instance() {
        let a = SystemId::new("pricing");
        let b = SystemId::new("pricing");
        assert_ne!(a, b);
        assert_eq!(SystemId::from_parts("pricing", a.uuid()), a);
        assert!(a.to_string().starts_with("pricing@"));
    }
}

//! Typed subscriptions
//!
//! An actor subscribes to payload types; a published message is copied to
//! every subscriber of its payload type whose policy matches the message's
//! origin.

use crate::message::TypeTag;
use crate::reference::ActorRef;
use dashmap::DashMap;
use std::any::{Any, TypeId};

/// Which origins a subscription accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionPolicy {
    /// Messages created in this system
    Local,
    /// Messages created in another system
    Remote,
    /// Both
    Full,
}

impl SubscriptionPolicy {
    pub fn matches(&self, local_origin: bool) -> bool {
        match self {
            Self::Local => local_origin,
            Self::Remote => !local_origin,
            Self::Full => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypedSubscription {
    pub policy: SubscriptionPolicy,
    pub tag: TypeTag,
}

impl TypedSubscription {
    pub fn new<T: Any>(policy: SubscriptionPolicy) -> Self {
        Self {
            policy,
            tag: TypeTag::of::<T>(),
        }
    }

    pub fn local<T: Any>() -> Self {
        Self::new::<T>(SubscriptionPolicy::Local)
    }

    pub fn remote<T: Any>() -> Self {
        Self::new::<T>(SubscriptionPolicy::Remote)
    }

    pub fn full<T: Any>() -> Self {
        Self::new::<T>(SubscriptionPolicy::Full)
    }
}

/// System-wide payload type → subscribers index
#[derive(Debug, Default)]
pub(crate) struct SubscriberIndex {
    by_type: DashMap<TypeId, Vec<(ActorRef, SubscriptionPolicy)>>,
}

impl SubscriberIndex {
    /// Register `subscriber`; a second subscription to the same type replaces the policy
    pub(crate) fn add(&self, subscriber: &ActorRef, subscriptions: &[TypedSubscription]) {
        for subscription in subscriptions {
            let mut entries = self.by_type.entry(subscription.tag.id()).or_default();
            match entries.iter_mut().find(|(actor, _)| actor == subscriber) {
                Some(entry) => entry.1 = subscription.policy,
                None => entries.push((subscriber.clone(), subscription.policy)),
            }
        }
    }

    pub(crate) fn remove(&self, subscriber: &ActorRef, subscriptions: &[TypedSubscription]) {
        for subscription in subscriptions {
            let type_id = subscription.tag.id();
            if let Some(mut entries) = self.by_type.get_mut(&type_id) {
                entries.retain(|(actor, _)| actor != subscriber);
            }
            self.by_type.remove_if(&type_id, |_, entries| entries.is_empty());
        }
    }

    /// Subscribers of `tag` accepting a message of the given origin
    pub(crate) fn matching(&self, tag: TypeTag, local_origin: bool) -> Vec<ActorRef> {
        self.by_type
            .get(&tag.id())
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(_, policy)| policy.matches(local_origin))
                    .map(|(actor, _)| actor.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

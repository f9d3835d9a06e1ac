//! Routing table
//!
//! Remote system routes keyed by `(system identity, channel identity)`.

use crate::identity::{ChannelId, SystemId};
use crate::reference::SystemRef;
use dashmap::DashMap;
use std::time::SystemTime;
use tracing::debug;

type RouteKey = (SystemId, ChannelId);

/// A registered route
#[derive(Debug, Clone)]
pub struct Route {
    pub system_ref: SystemRef,
    pub registered_at: SystemTime,
}

#[derive(Debug, Default)]
pub struct RoutingTable {
    routes: DashMap<RouteKey, Route>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the route for the reference's system and channel
    pub fn register(&self, system_ref: SystemRef) -> Option<SystemRef> {
        let key = (system_ref.system_id().clone(), system_ref.channel_id().clone());
        debug!(system = %key.0, channel = %key.1, "Registering route");
        self.routes
            .insert(
                key,
                Route {
                    system_ref,
                    registered_at: SystemTime::now(),
                },
            )
            .map(|previous| previous.system_ref)
    }

    /// Remove one route; absent routes are ignored
    pub fn unregister(&self, system: &SystemId, channel: &ChannelId) -> Option<SystemRef> {
        let removed = self
            .routes
            .remove(&(system.clone(), channel.clone()))
            .map(|(_, route)| route.system_ref);
        if removed.is_some() {
            debug!(%system, %channel, "Unregistered route");
        }
        removed
    }

    pub fn find(&self, system: &SystemId, channel: &ChannelId) -> Option<SystemRef> {
        self.routes
            .get(&(system.clone(), channel.clone()))
            .map(|route| route.system_ref.clone())
    }

    /// Any route to `system`, whatever the channel
    pub fn find_any(&self, system: &SystemId) -> Option<SystemRef> {
        self.routes
            .iter()
            .find(|entry| &entry.key().0 == system)
            .map(|entry| entry.system_ref.clone())
    }

    /// Drop every route served by `channel`; returns the systems that lost their route
    pub fn flush_channel(&self, channel: &ChannelId) -> Vec<SystemId> {
        let keys: Vec<RouteKey> = self
            .routes
            .iter()
            .filter(|entry| &entry.key().1 == channel)
            .map(|entry| entry.key().clone())
            .collect();

        keys.into_iter()
            .filter_map(|key| self.routes.remove(&key).map(|((system, _), _)| system))
            .collect()
    }

    pub fn routes_to(&self, system: &SystemId) -> Vec<Route> {
        self.routes
            .iter()
            .filter(|entry| &entry.key().0 == system)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

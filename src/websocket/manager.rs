use std::collections::HashSet;
use std::fmt::Display;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::models::identity::{Identity, TenantId};
use crate::models::websocket::ServerEvent;
use crate::store::keys::ChatScope;

pub type ConnectionId = Uuid;

/// Broadcast group. Every variant carries its tenant, so a group can only
/// ever reach connections of that tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Group {
    User(TenantId, String),
    Tenant(TenantId),
    Admin(TenantId),
    Chat(TenantId, ChatScope),
}

impl Group {
    pub fn tenant(&self) -> &TenantId {
        match self {
            Group::User(t, _) | Group::Tenant(t) | Group::Admin(t) | Group::Chat(t, _) => t,
        }
    }

    pub fn task(tenant: &TenantId, task_id: &str) -> Self {
        Group::Chat(tenant.clone(), ChatScope::Task(task_id.to_string()))
    }

    pub fn room(tenant: &TenantId, room_id: Uuid) -> Self {
        Group::Chat(tenant.clone(), ChatScope::Room(room_id))
    }
}

impl Display for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Group::User(t, user) => write!(f, "{t}:{user}"),
            Group::Tenant(t) => write!(f, "{t}"),
            Group::Admin(t) => write!(f, "{t}:admin"),
            Group::Chat(t, scope) => write!(f, "{t}:{scope}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserConnection {
    pub identity: Arc<Identity>,
    pub sender: UnboundedSender<ServerEvent>,
}

type IdentityKey = (TenantId, String);

/// Live connections, the identity→connections map and group membership.
///
/// No method holds a guard on one map while locking another.
#[derive(Clone, Default)]
pub struct WebSocketManager {
    connections: Arc<DashMap<ConnectionId, UserConnection>>,
    identities: Arc<DashMap<IdentityKey, HashSet<ConnectionId>>>,
    groups: Arc<DashMap<Group, HashSet<ConnectionId>>>,
    memberships: Arc<DashMap<ConnectionId, HashSet<Group>>>,
}

/// Result of dropping a connection.
#[derive(Debug)]
pub struct Unregistered {
    pub identity: Arc<Identity>,
    /// Other connections of the same identity that are still open.
    pub remaining: usize,
}

impl WebSocketManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection and places it in its personal, tenant and
    /// (for admins) admin groups.
    pub fn register(
        &self,
        identity: Arc<Identity>,
        sender: UnboundedSender<ServerEvent>,
    ) -> ConnectionId {
        let id = Uuid::new_v4();
        let tenant = identity.tenant_id.clone();

        self.connections.insert(
            id,
            UserConnection {
                identity: identity.clone(),
                sender,
            },
        );
        self.identities
            .entry((tenant.clone(), identity.user_id.clone()))
            .or_default()
            .insert(id);

        self.join(id, Group::User(tenant.clone(), identity.user_id.clone()));
        self.join(id, Group::Tenant(tenant.clone()));
        if identity.is_admin() {
            self.join(id, Group::Admin(tenant));
        }

        tracing::info!(
            connection = %id,
            user = %identity.user_id,
            tenant = %identity.tenant_id,
            "connection registered"
        );
        id
    }

    pub fn unregister(&self, id: ConnectionId) -> Option<Unregistered> {
        let (_, connection) = self.connections.remove(&id)?;
        let identity = connection.identity;

        if let Some((_, groups)) = self.memberships.remove(&id) {
            for group in groups {
                self.remove_from_group(&group, id);
            }
        }

        let key = (identity.tenant_id.clone(), identity.user_id.clone());
        let mut remaining = 0;
        if let Some(mut ids) = self.identities.get_mut(&key) {
            ids.remove(&id);
            remaining = ids.len();
        }
        self.identities.remove_if(&key, |_, ids| ids.is_empty());

        tracing::info!(
            connection = %id,
            user = %identity.user_id,
            tenant = %identity.tenant_id,
            remaining,
            "connection unregistered"
        );
        Some(Unregistered {
            identity,
            remaining,
        })
    }

    pub fn identity(&self, id: ConnectionId) -> Option<Arc<Identity>> {
        self.connections.get(&id).map(|c| c.identity.clone())
    }

    /// Adds a connection to a group of its own tenant. Returns `false` for
    /// unknown connections and for groups of another tenant.
    pub fn join(&self, id: ConnectionId, group: Group) -> bool {
        let Some(identity) = self.identity(id) else {
            return false;
        };
        if &identity.tenant_id != group.tenant() {
            tracing::warn!(
                connection = %id,
                tenant = %identity.tenant_id,
                group = %group,
                "refused cross-tenant group join"
            );
            return false;
        }

        self.groups.entry(group.clone()).or_default().insert(id);
        self.memberships.entry(id).or_default().insert(group.clone());

        // lost a race with unregister
        if !self.connections.contains_key(&id) {
            self.memberships.remove(&id);
            self.remove_from_group(&group, id);
            return false;
        }
        true
    }

    pub fn leave(&self, id: ConnectionId, group: &Group) {
        if let Some(mut groups) = self.memberships.get_mut(&id) {
            groups.remove(group);
        }
        self.remove_from_group(group, id);
    }

    fn remove_from_group(&self, group: &Group, id: ConnectionId) {
        if let Some(mut members) = self.groups.get_mut(group) {
            members.remove(&id);
        }
        self.groups.remove_if(group, |_, members| members.is_empty());
    }

    /// Removes every connection from `group` and forgets the group.
    pub fn evict_group(&self, group: &Group) -> usize {
        let Some((_, members)) = self.groups.remove(group) else {
            return 0;
        };
        for id in &members {
            if let Some(mut groups) = self.memberships.get_mut(id) {
                groups.remove(group);
            }
        }
        tracing::debug!(group = %group, evicted = members.len(), "group closed");
        members.len()
    }

    pub fn is_member(&self, id: ConnectionId, group: &Group) -> bool {
        self.groups
            .get(group)
            .is_some_and(|members| members.contains(&id))
    }

    fn group_connections(&self, group: &Group) -> Vec<ConnectionId> {
        self.groups
            .get(group)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Distinct user ids with at least one connection in `group`.
    pub fn users_in_group(&self, group: &Group) -> HashSet<String> {
        self.group_connections(group)
            .into_iter()
            .filter_map(|id| self.identity(id))
            .map(|identity| identity.user_id.clone())
            .collect()
    }

    pub fn user_in_group(&self, group: &Group, user_id: &str) -> bool {
        self.group_connections(group)
            .into_iter()
            .filter_map(|id| self.identity(id))
            .any(|identity| identity.user_id == user_id)
    }

    pub fn is_online(&self, tenant: &TenantId, user_id: &str) -> bool {
        self.identities
            .get(&(tenant.clone(), user_id.to_string()))
            .is_some_and(|ids| !ids.is_empty())
    }

    /// Sends `event` to every connection in `group`, skipping connections of
    /// `exclude_user`. Returns how many connections accepted it.
    pub fn broadcast(&self, group: &Group, event: ServerEvent, exclude_user: Option<&str>) -> usize {
        let mut delivered = 0;
        for id in self.group_connections(group) {
            let Some(connection) = self.connections.get(&id).map(|c| c.clone()) else {
                continue;
            };
            if exclude_user.is_some_and(|user| connection.identity.user_id == user) {
                continue;
            }
            if connection.sender.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                tracing::debug!(connection = %id, group = %group, "dropped event for closed connection");
            }
        }
        delivered
    }

    pub fn send_to_connection(&self, id: ConnectionId, event: ServerEvent) -> bool {
        let Some(sender) = self.connections.get(&id).map(|c| c.sender.clone()) else {
            return false;
        };
        sender.send(event).is_ok()
    }

    /// Sends to every connection of one identity through its personal group.
    pub fn send_to_user(&self, tenant: &TenantId, user_id: &str, event: ServerEvent) -> usize {
        self.broadcast(&Group::User(tenant.clone(), user_id.to_string()), event, None)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

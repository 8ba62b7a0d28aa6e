//! Fixtures shared by the unit tests: an `AppState` over in-memory stores and
//! fake connections backed by unbounded channels.

use tokio::sync::mpsc::{self, UnboundedReceiver};

use crate::app_state::AppState;
use crate::config::Config;
use crate::models::identity::{Identity, TenantId, ADMIN_ROLE};
use crate::models::websocket::ServerEvent;
use crate::store::Stores;
use crate::websocket::manager::ConnectionId;
use crate::websocket::session::Session;

pub const TEST_SECRET: &str = "test-secret";

pub fn identity(tenant: &str, user: &str) -> Identity {
    Identity {
        user_id: user.to_string(),
        name: format!("{user} (name)"),
        role: "staff".to_string(),
        tenant_id: TenantId::new(tenant),
        permissions: Vec::new(),
    }
}

pub fn admin(tenant: &str, user: &str) -> Identity {
    Identity {
        role: ADMIN_ROLE.to_string(),
        ..identity(tenant, user)
    }
}

pub struct TestApp {
    pub state: AppState,
    pub stores: Stores,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_stores(Stores::in_memory())
    }

    pub fn with_stores(stores: Stores) -> Self {
        let state = AppState::new(Config::new(TEST_SECRET), stores.clone());
        Self { state, stores }
    }
}

/// Opens a session the way the gateway does, so presence and the offline
/// flush run too.
pub async fn open_session(
    app: &TestApp,
    identity: Identity,
) -> (Session, UnboundedReceiver<ServerEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let session = Session::open(app.state.clone(), identity, tx).await;
    (session, rx)
}

pub async fn connect(
    app: &TestApp,
    identity: Identity,
) -> (ConnectionId, UnboundedReceiver<ServerEvent>) {
    let (session, rx) = open_session(app, identity).await;
    (session.connection(), rx)
}

/// Everything queued on the receiver right now.
pub fn drain_events(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

//! Connection state tracking. The tracker is the single source of truth the
//! wizard checks before advancing; it consumes both pushed socket events and
//! polled status fetches and collapses the agent's state vocabulary down to
//! "connected or not".

use chrono::{DateTime, Utc};
use strum_macros::Display;

use crate::{
    api::ConnectionRecord,
    channel::{SocketMessage, ENDPOINT_CONNECTIONS},
};

/// The agent's terminal success designator. Exactly one external value,
/// matched case-sensitively; every other state string means "in progress".
pub const EXTERNAL_STATE_ACTIVE: &str = "active";
const EXTERNAL_STATE_RESPONSE: &str = "response";

/// Internal connection vocabulary. `Skipped` is the alternate terminal
/// branch taken when the visitor explicitly bypasses connecting.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    None,
    Invited,
    Responded,
    Active,
    Skipped,
}

impl ConnectionState {
    fn from_external(state: &str) -> Self {
        match state {
            EXTERNAL_STATE_ACTIVE => Self::Active,
            EXTERNAL_STATE_RESPONSE => Self::Responded,
            // Failed or abandoned agent states are deliberately unmodeled;
            // anything that is not the completed designator counts as
            // still pending.
            _ => Self::Invited,
        }
    }

    fn rank(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Invited => 1,
            Self::Responded => 2,
            Self::Active | Self::Skipped => 3,
        }
    }
}

/// Tracks the peer connection for one flow attempt. Created empty when the
/// flow starts, populated as events arrive, cleared on completion or reset.
#[derive(Clone, Debug, Default)]
pub struct ConnectionTracker {
    connection_id: Option<String>,
    state: ConnectionState,
    is_deep_link: bool,
    connection_date: Option<DateTime<Utc>>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_id(&self) -> Option<&str> {
        self.connection_id.as_deref()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn connection_date(&self) -> Option<DateTime<Utc>> {
        self.connection_date
    }

    pub fn is_deep_link(&self) -> bool {
        self.is_deep_link
    }

    /// The one predicate consumers gate on.
    pub fn is_usable(&self) -> bool {
        self.state == ConnectionState::Active
    }

    /// The visitor opened the wallet through a mobile deep link rather than
    /// scanning a QR code; issuance picks its path based on this.
    pub fn mark_deep_link(&mut self) {
        self.is_deep_link = true;
    }

    /// Visitor explicitly bypassed connecting.
    pub fn skip(&mut self) {
        if self.state != ConnectionState::Active {
            self.state = ConnectionState::Skipped;
        }
    }

    /// Apply a pushed event. Events for other subsystems are ignored here.
    pub fn handle_message(&mut self, msg: &SocketMessage) {
        if msg.endpoint != ENDPOINT_CONNECTIONS {
            return;
        }
        trace!(
            "ConnectionTracker::handle_message >>> state: {}, connection_id: {:?}",
            msg.state,
            msg.connection_id
        );
        if let Some(id) = msg.connection_id.as_deref() {
            self.observe_connection_id(id);
        }
        self.apply_external(&msg.state);
    }

    /// Apply a polled status fetch; used to reconcile events that were
    /// emitted before the channel subscription existed.
    pub fn handle_status(&mut self, record: &ConnectionRecord) {
        trace!(
            "ConnectionTracker::handle_status >>> state: {}, connection_id: {}",
            record.state,
            record.connection_id
        );
        self.observe_connection_id(&record.connection_id);
        self.apply_external(&record.state);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn observe_connection_id(&mut self, id: &str) {
        match self.connection_id.as_deref() {
            Some(known) if known == id => {}
            Some(known) => {
                // The newest invitation is authoritative; a new id replaces
                // the previous attempt wholesale.
                debug!("Connection id changed from {} to {}", known, id);
                self.connection_id = Some(id.to_string());
                self.state = ConnectionState::None;
                self.connection_date = Some(Utc::now());
            }
            None => {
                self.connection_id = Some(id.to_string());
                self.connection_date = Some(Utc::now());
            }
        }
    }

    fn apply_external(&mut self, external: &str) {
        let next = ConnectionState::from_external(external);
        if self.state == ConnectionState::Active {
            // Once active the tracker settles; repeated `active` is a no-op
            // and a regression attempt is an error to log, never to apply.
            if next != ConnectionState::Active {
                error!(
                    "Ignoring connection state regression to '{}' for {:?}",
                    external, self.connection_id
                );
            }
            return;
        }
        if next.rank() < self.state.rank() {
            debug!(
                "Out-of-order connection event '{}' in state {}; not applied",
                external, self.state
            );
            return;
        }
        if next != self.state {
            info!(
                "Connection {:?} transitions {} -> {}",
                self.connection_id, self.state, next
            );
            self.state = next;
        }
    }
}

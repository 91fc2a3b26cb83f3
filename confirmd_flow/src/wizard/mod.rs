//! Linear wizard over the confirmed-person steps. The controller owns the
//! connection tracker, the issued-credential set and the person information
//! (single source of truth; child views get references, not copies), and
//! gates forward progress on them.

mod person;

use std::time::Duration;

use strum_macros::Display;

pub use self::person::{DocumentImage, PersonInformation};
use crate::{
    connection::ConnectionTracker,
    credential::IssuedCredentials,
};

/// Success state stays visible this long before the controller advances off
/// the connect step on its own.
pub const AUTO_ADVANCE_DELAY: Duration = Duration::from_secs(2);

/// The fixed step order of the confirmed-person flow. The controller only
/// ever moves one step at a time along this order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum WizardStep {
    SetupStart,
    PersonInformation,
    ConnectWallet,
    AcceptCredential,
    SetupCompleted,
}

const STEP_ORDER: [WizardStep; 5] = [
    WizardStep::SetupStart,
    WizardStep::PersonInformation,
    WizardStep::ConnectWallet,
    WizardStep::AcceptCredential,
    WizardStep::SetupCompleted,
];

impl WizardStep {
    fn index(self) -> usize {
        STEP_ORDER.iter().position(|s| *s == self).unwrap_or(0)
    }

    fn succ(self) -> Option<Self> {
        STEP_ORDER.get(self.index() + 1).copied()
    }

    fn pred(self) -> Option<Self> {
        self.index().checked_sub(1).map(|i| STEP_ORDER[i])
    }
}

/// Where the visitor is routed when the terminal step finishes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CompletionRoute {
    /// Normal completion; onward to the dashboard-equivalent view.
    Dashboard,
    /// Completion without a connection id means something upstream was
    /// skipped or failed; back to the start.
    Start,
}

#[derive(Debug)]
pub struct WizardController {
    step: WizardStep,
    credential_name: String,
    connection: ConnectionTracker,
    issued: IssuedCredentials,
    person: PersonInformation,
}

impl WizardController {
    pub fn new(credential_name: &str) -> Self {
        Self {
            step: WizardStep::SetupStart,
            credential_name: credential_name.to_string(),
            connection: ConnectionTracker::new(),
            issued: IssuedCredentials::new(),
            person: PersonInformation::default(),
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn credential_name(&self) -> &str {
        &self.credential_name
    }

    pub fn connection(&self) -> &ConnectionTracker {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut ConnectionTracker {
        &mut self.connection
    }

    pub fn issued(&self) -> &IssuedCredentials {
        &self.issued
    }

    pub fn issued_mut(&mut self) -> &mut IssuedCredentials {
        &mut self.issued
    }

    pub fn person(&self) -> &PersonInformation {
        &self.person
    }

    pub fn person_mut(&mut self) -> &mut PersonInformation {
        &mut self.person
    }

    /// Completion predicate of the current step.
    pub fn can_advance(&self) -> bool {
        match self.step {
            WizardStep::SetupStart => true,
            WizardStep::PersonInformation => self.person.is_complete(),
            WizardStep::ConnectWallet => self.connection.is_usable(),
            WizardStep::AcceptCredential => self.issued.contains(&self.credential_name),
            WizardStep::SetupCompleted => false,
        }
    }

    /// Advance one step if the completion predicate holds; otherwise a
    /// no-op.
    pub fn next(&mut self) -> WizardStep {
        if !self.can_advance() {
            debug!("Forward blocked at {}; predicate not met", self.step);
            return self.step;
        }
        if let Some(next) = self.step.succ() {
            info!("Wizard step {} -> {}", self.step, next);
            self.step = next;
        }
        self.step
    }

    /// Back one step; allowed anywhere except the first step.
    pub fn prev(&mut self) -> WizardStep {
        if let Some(prev) = self.step.pred() {
            info!("Wizard step {} -> {}", self.step, prev);
            self.step = prev;
        }
        self.step
    }

    /// Visitor bypasses connecting; the connect step is left without the
    /// usual gate.
    pub fn skip_connection(&mut self) -> WizardStep {
        if self.step == WizardStep::ConnectWallet {
            self.connection.skip();
            if let Some(next) = self.step.succ() {
                self.step = next;
            }
        }
        self.step
    }

    /// True when the controller is sitting on the connect step with a usable
    /// connection; the caller is expected to hold [`AUTO_ADVANCE_DELAY`] and
    /// then call [`Self::next`] without user input.
    pub fn wants_auto_advance(&self) -> bool {
        self.step == WizardStep::ConnectWallet && self.connection.is_usable()
    }

    /// Auto-advance off the connect step after the success state has been
    /// visible for a moment. The one place a transition is not
    /// user-initiated.
    pub async fn auto_advance(&mut self) -> WizardStep {
        if self.wants_auto_advance() {
            tokio::time::sleep(AUTO_ADVANCE_DELAY).await;
            self.next();
        }
        self.step
    }

    /// Back to the first step with all flow state discarded. Used on
    /// explicit abandon, unrecoverable error, and stale-session
    /// invalidation.
    pub fn reset(&mut self) {
        info!("Wizard reset from {}", self.step);
        self.step = WizardStep::SetupStart;
        self.connection.clear();
        self.issued.clear();
        self.person = PersonInformation::default();
    }

    /// Terminal-step completion. Clears connection and credential state and
    /// says where to route the visitor.
    pub fn finish(&mut self) -> CompletionRoute {
        let route = if self.connection.connection_id().is_some() {
            CompletionRoute::Dashboard
        } else {
            warn!("Wizard completed without a connection id; routing to start");
            CompletionRoute::Start
        };
        self.connection.clear();
        self.issued.clear();
        route
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{SocketMessage, ENDPOINT_CONNECTIONS};

    const CRED: &str = "ConfirmedPerson";

    fn active_msg(id: &str) -> SocketMessage {
        SocketMessage::new(ENDPOINT_CONNECTIONS, "active", Some(id))
    }

    fn controller_at_connect() -> WizardController {
        let mut wizard = WizardController::new(CRED);
        wizard.next();
        *wizard.person_mut() = PersonInformation::demo_person();
        wizard.next();
        assert_eq!(wizard.step(), WizardStep::ConnectWallet);
        wizard
    }

    mod forward_gating {
        use super::*;

        #[test]
        fn person_information_gates_on_mandatory_fields() {
            let mut wizard = WizardController::new(CRED);
            wizard.next();
            assert_eq!(wizard.step(), WizardStep::PersonInformation);

            wizard.next();
            assert_eq!(wizard.step(), WizardStep::PersonInformation);

            *wizard.person_mut() = PersonInformation::demo_person();
            wizard.next();
            assert_eq!(wizard.step(), WizardStep::ConnectWallet);
        }

        #[test]
        fn connect_step_blocks_until_usable_then_advances_exactly_one() {
            let mut wizard = controller_at_connect();

            wizard.next();
            assert_eq!(wizard.step(), WizardStep::ConnectWallet);

            wizard.connection_mut().handle_message(&active_msg("c1"));
            wizard.next();
            assert_eq!(wizard.step(), WizardStep::AcceptCredential);
        }

        #[test]
        fn accept_step_gates_on_recorded_acceptance() {
            let mut wizard = controller_at_connect();
            wizard.connection_mut().handle_message(&active_msg("c1"));
            wizard.next();

            wizard.next();
            assert_eq!(wizard.step(), WizardStep::AcceptCredential);

            wizard.issued_mut().record("confirmed_person");
            wizard.next();
            assert_eq!(wizard.step(), WizardStep::SetupCompleted);
        }

        #[test]
        fn terminal_step_never_advances() {
            let mut wizard = controller_at_connect();
            wizard.connection_mut().handle_message(&active_msg("c1"));
            wizard.next();
            wizard.issued_mut().record(CRED);
            wizard.next();

            wizard.next();
            assert_eq!(wizard.step(), WizardStep::SetupCompleted);
        }
    }

    mod backward_motion {
        use super::*;

        #[test]
        fn prev_is_blocked_only_at_first_step() {
            let mut wizard = WizardController::new(CRED);
            wizard.prev();
            assert_eq!(wizard.step(), WizardStep::SetupStart);

            wizard.next();
            wizard.prev();
            assert_eq!(wizard.step(), WizardStep::SetupStart);
        }
    }

    mod auto_advance {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn advances_after_delay_once_usable() {
            let mut wizard = controller_at_connect();
            wizard.connection_mut().handle_message(&active_msg("c1"));
            assert!(wizard.wants_auto_advance());

            let step = wizard.auto_advance().await;
            assert_eq!(step, WizardStep::AcceptCredential);
        }

        #[tokio::test]
        async fn does_nothing_while_pending() {
            let mut wizard = controller_at_connect();
            assert!(!wizard.wants_auto_advance());
            let step = wizard.auto_advance().await;
            assert_eq!(step, WizardStep::ConnectWallet);
        }
    }

    mod skip {
        use super::*;

        #[test]
        fn skip_bypasses_the_connect_gate() {
            let mut wizard = controller_at_connect();
            wizard.skip_connection();
            assert_eq!(wizard.step(), WizardStep::AcceptCredential);
            assert!(!wizard.connection().is_usable());
        }
    }

    mod reset {
        use super::*;

        #[test]
        fn reset_restores_initial_state_from_anywhere() {
            let mut wizard = controller_at_connect();
            wizard.connection_mut().handle_message(&active_msg("c1"));
            wizard.next();
            wizard.issued_mut().record(CRED);

            wizard.reset();
            assert_eq!(wizard.step(), WizardStep::SetupStart);
            assert_eq!(wizard.connection().connection_id(), None);
            assert!(!wizard.connection().is_usable());
            assert!(wizard.issued().is_empty());
            assert!(!wizard.person().is_complete());
        }
    }

    mod completion {
        use super::*;

        #[test]
        fn finish_with_connection_routes_to_dashboard_and_clears() {
            let mut wizard = controller_at_connect();
            wizard.connection_mut().handle_message(&active_msg("c1"));
            wizard.next();
            wizard.issued_mut().record(CRED);
            wizard.next();

            assert_eq!(wizard.finish(), CompletionRoute::Dashboard);
            assert_eq!(wizard.connection().connection_id(), None);
            assert!(wizard.issued().is_empty());
        }

        #[test]
        fn finish_without_connection_routes_to_start() {
            let mut wizard = WizardController::new(CRED);
            assert_eq!(wizard.finish(), CompletionRoute::Start);
        }
    }
}

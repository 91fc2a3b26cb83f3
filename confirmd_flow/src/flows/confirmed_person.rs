use std::sync::Arc;

use crate::{
    api::{CreateInviteParams, Invitation, IssuerBackend},
    channel::{EventChannel, SocketMessage},
    credential::{IssuanceAttempt, IssuanceOrchestrator},
    errors::error::{FlowError, FlowErrorKind, FlowResult},
    wizard::{CompletionRoute, WizardController},
};

/// Name under which the credential is issued and tracked.
pub const CONFIRMED_PERSON_CREDENTIAL: &str = "ConfirmedPerson";
/// Label the issuer presents to the wallet.
pub const ISSUER_LABEL: &str = "ConfirmDID";
/// Goal code tagging invitations minted by this flow.
pub const ISSUE_GOAL_CODE: &str = "aries.vc.issue";
/// Flow tag for backend bookkeeping.
pub const FLOW_TYPE_CONFIRMED_PERSON: &str = "confirmed-person-flow";
/// Branding image passed through to the wallet.
pub const ISSUER_IMAGE_URL: &str = "https://confirmedid.com/logo.png";
/// URL scheme that opens the wallet app directly.
pub const WALLET_SCHEME: &str = "confirmdwallet";

/// What a handled socket message meant to the flow, for drivers that want to
/// react (refresh a view, kick off auto-advance) without re-inspecting the
/// envelope.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlowSignal {
    /// Nothing the flow cares about.
    None,
    /// The connection just became usable.
    ConnectionUsable,
    /// The outstanding credential was just accepted.
    CredentialAccepted,
}

/// The confirmed-person flow: wizard, invitation handling, issuance and the
/// staleness check, against a pluggable backend.
#[derive(Debug)]
pub struct ConfirmedPersonFlow<B> {
    backend: Arc<B>,
    wizard: WizardController,
    orchestrator: IssuanceOrchestrator<B>,
    invitation: Option<Invitation>,
}

impl<B: IssuerBackend> ConfirmedPersonFlow<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            wizard: WizardController::new(CONFIRMED_PERSON_CREDENTIAL),
            orchestrator: IssuanceOrchestrator::new(Arc::clone(&backend)),
            backend,
            invitation: None,
        }
    }

    pub fn wizard(&self) -> &WizardController {
        &self.wizard
    }

    pub fn wizard_mut(&mut self) -> &mut WizardController {
        &mut self.wizard
    }

    pub fn invitation(&self) -> Option<&Invitation> {
        self.invitation.as_ref()
    }

    /// Mint a fresh invitation for the connect step. Any previous invitation
    /// and in-flight connection state is discarded; the newest invitation is
    /// authoritative.
    pub async fn start_connection(&mut self) -> FlowResult<&Invitation> {
        info!("ConfirmedPersonFlow::start_connection");
        self.wizard.connection_mut().clear();
        self.wizard.issued_mut().clear();
        self.orchestrator.reset_attempt();

        let params = CreateInviteParams::builder()
            .my_label(ISSUER_LABEL)
            .image_url(ISSUER_IMAGE_URL)
            .goal_code(ISSUE_GOAL_CODE)
            .flow_type(FLOW_TYPE_CONFIRMED_PERSON)
            .build();
        let invitation = self.backend.create_invitation(params).await?;
        Ok(self.invitation.insert(invitation))
    }

    /// The wallet deep link for the current invitation; marks the connection
    /// as deep-link so issuance takes the variant path.
    pub fn open_deep_link(&mut self) -> Option<String> {
        let link = self
            .invitation
            .as_ref()
            .map(|inv| inv.deep_link(WALLET_SCHEME));
        if link.is_some() {
            self.wizard.connection_mut().mark_deep_link();
        }
        link
    }

    /// Best-effort one-shot poll to reconcile state the channel may have
    /// missed (subscription races, channel loss). Returns the connection id
    /// once one is known.
    pub async fn resolve_connection(&mut self) -> FlowResult<Option<String>> {
        let record = if let Some(id) = self.wizard.connection().connection_id() {
            self.backend.connection_status(id).await
        } else if let Some(invitation) = &self.invitation {
            self.backend
                .connection_by_invitation(&invitation.invitation_msg_id)
                .await
        } else {
            return Ok(None);
        };

        match record {
            Ok(record) => {
                self.wizard.connection_mut().handle_status(&record);
                Ok(Some(record.connection_id))
            }
            Err(err) => {
                // The peer may simply not have responded yet.
                debug!("Connection poll yielded nothing usable: {}", err.msg());
                Ok(None)
            }
        }
    }

    /// (Re-)subscribe the shared channel to the authoritative connection id.
    pub async fn subscribe<C: EventChannel>(&self, channel: &mut C) -> FlowResult<()> {
        match self.wizard.connection().connection_id() {
            Some(id) => channel.subscribe(id).await,
            None => Err(FlowError::from_msg(
                FlowErrorKind::NotReady,
                "No connection id to subscribe with yet",
            )),
        }
    }

    /// Route one pushed event into the trackers.
    pub fn handle_message(&mut self, msg: &SocketMessage) -> FlowSignal {
        let was_usable = self.wizard.connection().is_usable();
        self.wizard.connection_mut().handle_message(msg);
        if !was_usable && self.wizard.connection().is_usable() {
            return FlowSignal::ConnectionUsable;
        }

        let (orchestrator, issued) = (&self.orchestrator, self.wizard.issued_mut());
        if orchestrator.handle_message(msg, issued) {
            return FlowSignal::CredentialAccepted;
        }
        FlowSignal::None
    }

    /// Push the credential offer for the collected person information. At
    /// most one offer goes out per connection; re-triggers are deduplicated
    /// by the orchestrator's attempt token.
    pub async fn issue_credential(&mut self) -> FlowResult<IssuanceAttempt> {
        let Some(connection_id) = self.wizard.connection().connection_id().map(str::to_string)
        else {
            return Err(FlowError::from_msg(
                FlowErrorKind::NotReady,
                "Cannot issue a credential without a connection",
            ));
        };
        let template = self
            .wizard
            .person()
            .to_credential_template(self.wizard.credential_name());
        let deep_link = self.wizard.connection().is_deep_link();
        self.orchestrator
            .issue(&connection_id, &template, deep_link)
            .await
    }

    /// User-triggered retry after a failed attempt: clears the idempotency
    /// guard and re-attempts end to end.
    pub async fn retry_issuance(&mut self) -> FlowResult<IssuanceAttempt> {
        self.orchestrator.reset_attempt();
        self.issue_credential().await
    }

    /// Wait (bounded) for the acceptance confirmation; see the orchestrator
    /// for the timeout semantics.
    pub async fn wait_for_acceptance<C: EventChannel>(&mut self, channel: &mut C) -> FlowResult<()> {
        let (orchestrator, issued) = (&self.orchestrator, self.wizard.issued_mut());
        orchestrator.wait_for_acceptance(channel, issued).await
    }

    /// Demo-environment housekeeping: when the server was reset after this
    /// connection was made, all local state is stale and silently discarded.
    /// Returns true when a reset happened. Not an error surface.
    pub async fn check_staleness(&mut self) -> FlowResult<bool> {
        let Some(connection_date) = self.wizard.connection().connection_date() else {
            return Ok(false);
        };
        let last_reset = self.backend.last_server_reset().await?;
        if connection_date < last_reset {
            info!(
                "Local connection ({}) predates server reset ({}); resetting flow",
                connection_date, last_reset
            );
            self.abandon();
            return Ok(true);
        }
        Ok(false)
    }

    /// Explicit abandon or unrecoverable error: everything back to the
    /// start.
    pub fn abandon(&mut self) {
        self.wizard.reset();
        self.orchestrator.reset_attempt();
        self.invitation = None;
    }

    /// Terminal-step completion; clears flow state and yields the route.
    pub fn finish(&mut self) -> CompletionRoute {
        self.invitation = None;
        self.orchestrator.reset_attempt();
        self.wizard.finish()
    }
}

use std::{sync::Arc, time::Duration};

use uuid::Uuid;

use super::template::{CredentialTemplate, IssuedCredentials};
use crate::{
    api::{CredentialOffer, CredentialProposal, IssuerBackend},
    channel::{EventChannel, SocketMessage, ENDPOINT_ISSUE_CREDENTIAL},
    errors::error::{FlowError, FlowErrorKind, FlowResult},
};

/// Lifecycle point the agent reports once the peer holds the credential.
pub const STATE_CREDENTIAL_ISSUED: &str = "credential_issued";

/// The deep-link path retries the full offer send this many times.
pub const OFFER_MAX_ATTEMPTS: u32 = 3;
/// Fixed backoff between deep-link offer attempts.
pub const OFFER_RETRY_DELAY: Duration = Duration::from_secs(1);
/// Bound on waiting for the `credential_issued` confirmation; past it the
/// visitor has to start the flow over.
pub const ACCEPTANCE_TIMEOUT: Duration = Duration::from_secs(10);

/// First-class idempotency token for one issuance attempt. Holding one means
/// an offer has been sent (or is in flight) for the connection; repeated
/// triggers are deduplicated against it rather than against a closure flag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuanceAttempt {
    id: Uuid,
    connection_id: String,
    credential_name: String,
}

impl IssuanceAttempt {
    fn new(connection_id: &str, credential_name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            connection_id: connection_id.to_string(),
            credential_name: credential_name.to_string(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn credential_name(&self) -> &str {
        &self.credential_name
    }
}

/// Drives one credential issuance end to end: resolve the credential
/// definition, push the offer over the path matching how the visitor
/// connected, then watch for the acceptance confirmation.
#[derive(Debug)]
pub struct IssuanceOrchestrator<B> {
    backend: Arc<B>,
    attempt: Option<IssuanceAttempt>,
}

impl<B: IssuerBackend> IssuanceOrchestrator<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            attempt: None,
        }
    }

    pub fn attempt(&self) -> Option<&IssuanceAttempt> {
        self.attempt.as_ref()
    }

    /// Clear the idempotency guard so an explicit user retry can re-attempt
    /// end to end.
    pub fn reset_attempt(&mut self) {
        self.attempt = None;
    }

    /// Issue `template` to the peer on `connection_id`. At most one offer is
    /// sent per connection; a re-trigger while an attempt exists returns the
    /// existing token without touching the backend.
    pub async fn issue(
        &mut self,
        connection_id: &str,
        template: &CredentialTemplate,
        deep_link: bool,
    ) -> FlowResult<IssuanceAttempt> {
        if let Some(attempt) = &self.attempt {
            if attempt.connection_id() == connection_id {
                debug!(
                    "Issuance already attempted for connection {}; deduplicating",
                    connection_id
                );
                return Ok(attempt.clone());
            }
        }

        // The token is recorded before the first await so a re-entrant
        // trigger arriving mid-flight is deduplicated too.
        let attempt = IssuanceAttempt::new(connection_id, template.name());
        self.attempt = Some(attempt.clone());

        let result = self.issue_inner(connection_id, template, deep_link).await;
        if result.is_err() {
            self.attempt = None;
        }
        result.map(|()| attempt)
    }

    async fn issue_inner(
        &self,
        connection_id: &str,
        template: &CredentialTemplate,
        deep_link: bool,
    ) -> FlowResult<()> {
        info!(
            "IssuanceOrchestrator::issue >>> connection_id: {}, credential: {}, deep_link: {}",
            connection_id,
            template.name(),
            deep_link
        );

        let cred_def_id = self.backend.get_or_create_cred_def(template).await?;
        let offer = CredentialOffer {
            connection_id: connection_id.to_string(),
            cred_def_id,
            credential_proposal: CredentialProposal::new(template.attributes().to_vec()),
        };

        if deep_link {
            self.send_offer_with_retry(&offer).await?;
        } else {
            self.backend.offer_credential(&offer).await?;
        }
        Ok(())
    }

    async fn send_offer_with_retry(&self, offer: &CredentialOffer) -> FlowResult<()> {
        for attempt_no in 1..=OFFER_MAX_ATTEMPTS {
            match self.backend.offer_credential_deep_link(offer).await {
                Ok(_) => return Ok(()),
                Err(err) => {
                    warn!(
                        "Deep-link offer attempt {}/{} failed: {}",
                        attempt_no,
                        OFFER_MAX_ATTEMPTS,
                        err.msg()
                    );
                    if attempt_no < OFFER_MAX_ATTEMPTS {
                        tokio::time::sleep(OFFER_RETRY_DELAY).await;
                    }
                }
            }
        }
        Err(FlowError::from_msg(
            FlowErrorKind::IssuanceExhausted,
            format!(
                "Deep-link credential offer failed after {OFFER_MAX_ATTEMPTS} attempts for \
                 connection {}",
                offer.connection_id
            ),
        ))
    }

    /// Apply a pushed event; returns true when it confirmed acceptance of
    /// the outstanding attempt's credential.
    pub fn handle_message(&self, msg: &SocketMessage, issued: &mut IssuedCredentials) -> bool {
        if msg.endpoint != ENDPOINT_ISSUE_CREDENTIAL || msg.state != STATE_CREDENTIAL_ISSUED {
            return false;
        }
        let Some(attempt) = &self.attempt else {
            debug!("Credential-issued event with no outstanding attempt; ignoring");
            return false;
        };
        info!(
            "Credential '{}' accepted by the peer on connection {}",
            attempt.credential_name(),
            attempt.connection_id()
        );
        issued.record(attempt.credential_name());
        true
    }

    /// Wait for the acceptance confirmation, bounded by
    /// [`ACCEPTANCE_TIMEOUT`]. On timeout the whole flow has to restart;
    /// there is no partial retry at this level.
    pub async fn wait_for_acceptance<C: EventChannel>(
        &self,
        channel: &mut C,
        issued: &mut IssuedCredentials,
    ) -> FlowResult<()> {
        if self.attempt.is_none() {
            return Err(FlowError::from_msg(
                FlowErrorKind::NotReady,
                "Cannot wait for acceptance before an offer was attempted",
            ));
        }

        let wait = async {
            while let Some(msg) = channel.recv().await {
                if self.handle_message(&msg, issued) {
                    return Ok(());
                }
            }
            Err(FlowError::from_msg(
                FlowErrorKind::ChannelClosed,
                "Event channel closed while waiting for credential acceptance",
            ))
        };

        match tokio::time::timeout(ACCEPTANCE_TIMEOUT, wait).await {
            Ok(result) => result,
            Err(_) => Err(FlowError::from_msg(
                FlowErrorKind::IssuanceTimeout,
                format!(
                    "No credential_issued confirmation within {}s",
                    ACCEPTANCE_TIMEOUT.as_secs()
                ),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::{
        api::{ConnectionRecord, CreateInviteParams, CredentialExchangeRecord, Invitation},
        channel::InMemoryEventChannel,
        credential::CredentialAttribute,
    };

    /// Backend stub that counts offer calls and fails a configurable number
    /// of times.
    #[derive(Default)]
    struct StubBackend {
        offers: Mutex<u32>,
        deep_offers: Mutex<u32>,
        failures_remaining: Mutex<u32>,
    }

    impl StubBackend {
        fn failing(times: u32) -> Self {
            Self {
                failures_remaining: Mutex::new(times),
                ..Self::default()
            }
        }

        fn take_failure(&self) -> bool {
            let mut remaining = self.failures_remaining.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                true
            } else {
                false
            }
        }

        fn offer_count(&self) -> u32 {
            *self.offers.lock().unwrap()
        }

        fn deep_offer_count(&self) -> u32 {
            *self.deep_offers.lock().unwrap()
        }
    }

    #[async_trait]
    impl IssuerBackend for StubBackend {
        async fn create_invitation(&self, _params: CreateInviteParams) -> FlowResult<Invitation> {
            unimplemented!("not exercised here")
        }

        async fn connection_by_invitation(&self, _id: &str) -> FlowResult<ConnectionRecord> {
            unimplemented!("not exercised here")
        }

        async fn connection_status(&self, _id: &str) -> FlowResult<ConnectionRecord> {
            unimplemented!("not exercised here")
        }

        async fn get_or_create_cred_def(&self, _t: &CredentialTemplate) -> FlowResult<String> {
            Ok("credDef1".to_string())
        }

        async fn offer_credential(&self, _o: &CredentialOffer) -> FlowResult<serde_json::Value> {
            *self.offers.lock().unwrap() += 1;
            if self.take_failure() {
                return Err(FlowError::from_msg(FlowErrorKind::PostFailed, "boom"));
            }
            Ok(serde_json::json!({"state": "offer_sent"}))
        }

        async fn offer_credential_deep_link(
            &self,
            _o: &CredentialOffer,
        ) -> FlowResult<serde_json::Value> {
            *self.deep_offers.lock().unwrap() += 1;
            if self.take_failure() {
                return Err(FlowError::from_msg(FlowErrorKind::PostFailed, "boom"));
            }
            Ok(serde_json::json!({"state": "offer_sent"}))
        }

        async fn credential_exchanges(
            &self,
            _id: &str,
        ) -> FlowResult<Vec<CredentialExchangeRecord>> {
            Ok(vec![])
        }

        async fn last_server_reset(&self) -> FlowResult<DateTime<Utc>> {
            Ok(Utc::now())
        }
    }

    fn template() -> CredentialTemplate {
        CredentialTemplate::builder()
            .name("ConfirmedPerson")
            .version("2.0")
            .attributes(vec![CredentialAttribute::new("family_name", "Doe")])
            .build()
    }

    mod single_issuance {
        use super::*;

        #[tokio::test]
        async fn repeated_triggers_send_one_offer() {
            let backend = Arc::new(StubBackend::default());
            let mut orchestrator = IssuanceOrchestrator::new(Arc::clone(&backend));

            let first = orchestrator.issue("c1", &template(), false).await.unwrap();
            let second = orchestrator.issue("c1", &template(), false).await.unwrap();

            assert_eq!(first.id(), second.id());
            assert_eq!(backend.offer_count(), 1);
        }

        #[tokio::test]
        async fn user_retry_after_reset_sends_again() {
            let backend = Arc::new(StubBackend::default());
            let mut orchestrator = IssuanceOrchestrator::new(Arc::clone(&backend));

            let first = orchestrator.issue("c1", &template(), false).await.unwrap();
            orchestrator.reset_attempt();
            let second = orchestrator.issue("c1", &template(), false).await.unwrap();

            assert_ne!(first.id(), second.id());
            assert_eq!(backend.offer_count(), 2);
        }

        #[tokio::test]
        async fn failed_attempt_clears_the_guard() {
            let backend = Arc::new(StubBackend::failing(1));
            let mut orchestrator = IssuanceOrchestrator::new(Arc::clone(&backend));

            assert!(orchestrator.issue("c1", &template(), false).await.is_err());
            assert!(orchestrator.attempt().is_none());

            orchestrator.issue("c1", &template(), false).await.unwrap();
            assert_eq!(backend.offer_count(), 2);
        }
    }

    mod retry_policy {
        use super::*;

        #[tokio::test]
        async fn standard_path_fails_after_one_attempt() {
            let backend = Arc::new(StubBackend::failing(u32::MAX));
            let mut orchestrator = IssuanceOrchestrator::new(Arc::clone(&backend));

            let err = orchestrator
                .issue("c1", &template(), false)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), FlowErrorKind::PostFailed);
            assert_eq!(backend.offer_count(), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn deep_link_path_makes_exactly_three_attempts() {
            let backend = Arc::new(StubBackend::failing(u32::MAX));
            let mut orchestrator = IssuanceOrchestrator::new(Arc::clone(&backend));

            let err = orchestrator
                .issue("c1", &template(), true)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), FlowErrorKind::IssuanceExhausted);
            assert_eq!(backend.deep_offer_count(), 3);
            assert_eq!(backend.offer_count(), 0);
        }

        #[tokio::test(start_paused = true)]
        async fn deep_link_path_recovers_on_later_attempt() {
            let backend = Arc::new(StubBackend::failing(2));
            let mut orchestrator = IssuanceOrchestrator::new(Arc::clone(&backend));

            orchestrator.issue("c1", &template(), true).await.unwrap();
            assert_eq!(backend.deep_offer_count(), 3);
        }
    }

    mod acceptance {
        use super::*;

        #[tokio::test]
        async fn credential_issued_event_records_acceptance() {
            let backend = Arc::new(StubBackend::default());
            let mut orchestrator = IssuanceOrchestrator::new(backend);
            orchestrator.issue("c1", &template(), false).await.unwrap();

            let mut issued = IssuedCredentials::new();
            let msg =
                SocketMessage::new(ENDPOINT_ISSUE_CREDENTIAL, STATE_CREDENTIAL_ISSUED, None);
            assert!(orchestrator.handle_message(&msg, &mut issued));
            assert!(issued.contains("ConfirmedPerson"));
        }

        #[tokio::test]
        async fn unrelated_events_do_not_record_acceptance() {
            let backend = Arc::new(StubBackend::default());
            let mut orchestrator = IssuanceOrchestrator::new(backend);
            orchestrator.issue("c1", &template(), false).await.unwrap();

            let mut issued = IssuedCredentials::new();
            let msg = SocketMessage::new("connections", "active", Some("c1"));
            assert!(!orchestrator.handle_message(&msg, &mut issued));
            let msg = SocketMessage::new(ENDPOINT_ISSUE_CREDENTIAL, "offer_sent", None);
            assert!(!orchestrator.handle_message(&msg, &mut issued));
            assert!(issued.is_empty());
        }

        #[tokio::test(start_paused = true)]
        async fn waiting_times_out_without_confirmation() {
            let backend = Arc::new(StubBackend::default());
            let mut orchestrator = IssuanceOrchestrator::new(backend);
            orchestrator.issue("c1", &template(), false).await.unwrap();

            // Sender kept alive so the channel pends instead of closing.
            let (_tx, mut channel) = InMemoryEventChannel::pair();
            let mut issued = IssuedCredentials::new();
            let err = orchestrator
                .wait_for_acceptance(&mut channel, &mut issued)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), FlowErrorKind::IssuanceTimeout);
        }

        #[tokio::test]
        async fn waiting_resolves_on_confirmation() {
            let backend = Arc::new(StubBackend::default());
            let mut orchestrator = IssuanceOrchestrator::new(backend);
            orchestrator.issue("c1", &template(), false).await.unwrap();

            let (tx, mut channel) = InMemoryEventChannel::pair();
            tx.send(SocketMessage::new(
                ENDPOINT_ISSUE_CREDENTIAL,
                STATE_CREDENTIAL_ISSUED,
                None,
            ))
            .unwrap();

            let mut issued = IssuedCredentials::new();
            orchestrator
                .wait_for_acceptance(&mut channel, &mut issued)
                .await
                .unwrap();
            assert!(issued.contains("confirmed_person"));
        }
    }
}

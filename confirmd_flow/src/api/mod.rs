//! Typed surface of the demo backend (JSON over HTTP, `/demo` prefix) plus
//! helpers for presenting an invitation to the visitor.

mod http;
mod types;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use self::{
    http::HttpIssuerBackend,
    types::{
        ConnectionRecord, CreateInviteParams, CredentialExchangeRecord, CredentialOffer,
        CredentialProposal, Invitation, CREDENTIAL_PREVIEW_TYPE,
    },
};
use crate::errors::error::FlowResult;

/// Everything the flow needs from the issuance backend. The HTTP
/// implementation is [`HttpIssuerBackend`]; tests substitute an in-memory
/// one.
#[async_trait]
pub trait IssuerBackend: Send + Sync {
    /// Mint a fresh out-of-band invitation. The newest invitation is always
    /// authoritative; callers drop any previously held one.
    async fn create_invitation(&self, params: CreateInviteParams) -> FlowResult<Invitation>;

    /// One-shot connection lookup by the invitation message id, used before
    /// the agent has told us the connection id.
    async fn connection_by_invitation(&self, invitation_msg_id: &str)
        -> FlowResult<ConnectionRecord>;

    /// One-shot connection status fetch, used to reconcile state when socket
    /// events were missed.
    async fn connection_status(&self, connection_id: &str) -> FlowResult<ConnectionRecord>;

    /// Resolve or provision a credential definition for the template. May
    /// take several seconds on first use while the schema propagates.
    async fn get_or_create_cred_def(
        &self,
        template: &crate::credential::CredentialTemplate,
    ) -> FlowResult<String>;

    /// Push a credential offer to the connected peer (standard path).
    async fn offer_credential(&self, offer: &CredentialOffer) -> FlowResult<serde_json::Value>;

    /// Push a credential offer via the deep-link variant path.
    async fn offer_credential_deep_link(
        &self,
        offer: &CredentialOffer,
    ) -> FlowResult<serde_json::Value>;

    /// Credential-exchange records known for a connection.
    async fn credential_exchanges(
        &self,
        connection_id: &str,
    ) -> FlowResult<Vec<CredentialExchangeRecord>>;

    /// Timestamp of the last demo-environment wipe, for the staleness check.
    async fn last_server_reset(&self) -> FlowResult<DateTime<Utc>>;
}

//! Credential templates and the issuance orchestrator.

mod issuance;
mod template;

pub use self::{
    issuance::{
        IssuanceAttempt, IssuanceOrchestrator, ACCEPTANCE_TIMEOUT, OFFER_MAX_ATTEMPTS,
        OFFER_RETRY_DELAY, STATE_CREDENTIAL_ISSUED,
    },
    template::{CredentialAttribute, CredentialTemplate, IssuedCredentials},
};

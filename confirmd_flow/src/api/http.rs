use async_trait::async_trait;
use chrono::{DateTime, Utc};
use url::Url;

use super::{
    types::{ConnectionRecord, CreateInviteParams, CredentialExchangeRecord, CredentialOffer},
    Invitation, IssuerBackend,
};
use crate::{credential::CredentialTemplate, errors::error::FlowResult};

#[derive(Deserialize)]
struct CredDefResponse {
    credential_definition_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LastResetResponse {
    last_reset: DateTime<Utc>,
}

/// Reqwest-backed client for the demo backend's `/demo` surface.
#[derive(Clone, Debug)]
pub struct HttpIssuerBackend {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpIssuerBackend {
    pub fn new(base_url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    fn endpoint(&self, path: &str) -> FlowResult<Url> {
        Ok(self.base_url.join(path)?)
    }
}

#[async_trait]
impl IssuerBackend for HttpIssuerBackend {
    async fn create_invitation(&self, params: CreateInviteParams) -> FlowResult<Invitation> {
        trace!(
            "HttpIssuerBackend::create_invitation >>> goal_code: {:?}, flow_type: {:?}",
            params.goal_code,
            params.flow_type
        );
        let response = self
            .client
            .post(self.endpoint("demo/connections/createInvite")?)
            .json(&params)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn connection_by_invitation(
        &self,
        invitation_msg_id: &str,
    ) -> FlowResult<ConnectionRecord> {
        trace!(
            "HttpIssuerBackend::connection_by_invitation >>> invitation_msg_id: {}",
            invitation_msg_id
        );
        let response = self
            .client
            .get(self.endpoint(&format!("demo/connections/invitationId/{invitation_msg_id}"))?)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn connection_status(&self, connection_id: &str) -> FlowResult<ConnectionRecord> {
        trace!(
            "HttpIssuerBackend::connection_status >>> connection_id: {}",
            connection_id
        );
        let response = self
            .client
            .get(self.endpoint(&format!(
                "demo/connections/getConnectionStatus/{connection_id}"
            ))?)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn get_or_create_cred_def(&self, template: &CredentialTemplate) -> FlowResult<String> {
        info!(
            "HttpIssuerBackend::get_or_create_cred_def >>> name: {}, version: {}",
            template.name(),
            template.version()
        );
        // First use may register and propagate a schema; this call can take
        // several seconds.
        let response = self
            .client
            .post(self.endpoint("demo/credentials/getOrCreateCredDef")?)
            .json(template)
            .send()
            .await?
            .error_for_status()?;
        let parsed: CredDefResponse = response.json().await?;
        Ok(parsed.credential_definition_id)
    }

    async fn offer_credential(&self, offer: &CredentialOffer) -> FlowResult<serde_json::Value> {
        info!(
            "HttpIssuerBackend::offer_credential >>> connection_id: {}, cred_def_id: {}",
            offer.connection_id, offer.cred_def_id
        );
        let response = self
            .client
            .post(self.endpoint("demo/credentials/offerCredential")?)
            .json(offer)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn offer_credential_deep_link(
        &self,
        offer: &CredentialOffer,
    ) -> FlowResult<serde_json::Value> {
        info!(
            "HttpIssuerBackend::offer_credential_deep_link >>> connection_id: {}, cred_def_id: {}",
            offer.connection_id, offer.cred_def_id
        );
        let response = self
            .client
            .post(self.endpoint("demo/deeplink/offerCredential")?)
            .json(offer)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn credential_exchanges(
        &self,
        connection_id: &str,
    ) -> FlowResult<Vec<CredentialExchangeRecord>> {
        trace!(
            "HttpIssuerBackend::credential_exchanges >>> connection_id: {}",
            connection_id
        );
        let response = self
            .client
            .get(self.endpoint(&format!("demo/credentials/connId/{connection_id}"))?)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn last_server_reset(&self) -> FlowResult<DateTime<Utc>> {
        let response = self
            .client
            .get(self.endpoint("demo/server/last-reset")?)
            .send()
            .await?
            .error_for_status()?;
        let parsed: LastResetResponse = response.json().await?;
        Ok(parsed.last_reset)
    }
}

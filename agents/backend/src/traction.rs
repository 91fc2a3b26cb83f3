//! Authenticated client for the Traction tenant API. Token acquisition is
//! lazy; a 401 on any call triggers exactly one re-authentication and
//! retry before the error is surfaced.

use std::time::Duration;

use confirmd_flow::{
    api::{ConnectionRecord, CreateInviteParams, CredentialOffer, Invitation},
    credential::CredentialTemplate,
};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use url::Url;

use crate::{config::Config, error::BackendError};

/// Freshly created schemas take a moment to propagate on the ledger before
/// a credential definition can reference them.
const SCHEMA_SETTLE_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub struct TractionClient {
    http: reqwest::Client,
    base_url: Url,
    tenant_id: String,
    api_key: String,
    token: RwLock<Option<String>>,
}

impl TractionClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.traction_base_url.clone(),
            tenant_id: config.traction_tenant_id.clone(),
            api_key: config.traction_api_key.clone(),
            token: RwLock::new(None),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.base_url
            .join(path)
            .map_err(|err| BackendError::TractionResponse(format!("Bad endpoint {path}: {err}")))
    }

    async fn authenticate(&self) -> Result<String, BackendError> {
        info!("TractionClient::authenticate >>> tenant: {}", self.tenant_id);
        let url = self.endpoint(&format!("multitenancy/tenant/{}/token", self.tenant_id))?;
        let response: Value = self
            .http
            .post(url)
            .json(&json!({ "api_key": self.api_key }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let token = response
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| BackendError::Auth("Token response carried no token".to_string()))?
            .to_string();
        *self.token.write().await = Some(token.clone());
        Ok(token)
    }

    async fn bearer(&self) -> Result<String, BackendError> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }
        self.authenticate().await
    }

    /// One authenticated request; re-authenticates and retries once on 401.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, BackendError> {
        let url = self.endpoint(path)?;
        let mut token = self.bearer().await?;
        for attempt in 0..2 {
            trace!("TractionClient::request >>> {} {}", method, path);
            let mut builder = self
                .http
                .request(method.clone(), url.clone())
                .bearer_auth(&token);
            if let Some(body) = body {
                builder = builder.json(body);
            }
            let response = builder.send().await?;
            if response.status() == StatusCode::UNAUTHORIZED && attempt == 0 {
                debug!("Traction token expired; re-authenticating");
                token = self.authenticate().await?;
                continue;
            }
            return Ok(response.error_for_status()?.json().await?);
        }
        unreachable!("second attempt always returns")
    }

    /// Mint an out-of-band invitation for one wallet. Invitations are
    /// single-use; the browser requests a fresh one per attempt.
    pub async fn create_invitation(
        &self,
        params: &CreateInviteParams,
    ) -> Result<Invitation, BackendError> {
        let body = json!({
            "accept": ["didcomm/aip1", "didcomm/aip2;env=rfc19"],
            "alias": "connection",
            "goal": "To Issue a Credentials",
            "goal_code": params.goal_code,
            "handshake_protocols": [
                "https://didcomm.org/didexchange/1.0",
                "https://didcomm.org/connections/1.0",
            ],
            "my_label": params.my_label,
            "image_url": params.image_url,
            "protocol_version": "1.1",
            "use_public_did": false,
        });
        let response = self
            .request(
                Method::POST,
                "out-of-band/create-invitation?multi_use=false",
                Some(&body),
            )
            .await?;

        let invitation_url = response
            .get("invitation_url")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                BackendError::TractionResponse("Invitation carried no invitation_url".to_string())
            })?
            .parse()
            .map_err(|err| {
                BackendError::TractionResponse(format!("Unparseable invitation_url: {err}"))
            })?;
        let invitation_msg_id = response
            .get("invi_msg_id")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                BackendError::TractionResponse("Invitation carried no invi_msg_id".to_string())
            })?
            .to_string();
        Ok(Invitation {
            invitation_url,
            invitation_msg_id,
        })
    }

    /// Connection lookup by the invitation message id; present once the
    /// wallet has accepted the invitation.
    pub async fn connection_by_invitation(
        &self,
        invitation_msg_id: &str,
    ) -> Result<ConnectionRecord, BackendError> {
        let response = self
            .request(
                Method::GET,
                &format!("connections?invitation_msg_id={invitation_msg_id}"),
                None,
            )
            .await?;
        let record = response
            .get("results")
            .and_then(Value::as_array)
            .and_then(|results| results.first())
            .cloned()
            .ok_or_else(|| {
                BackendError::NotFound(format!(
                    "No connection for invitation {invitation_msg_id}"
                ))
            })?;
        serde_json::from_value(record)
            .map_err(|err| BackendError::TractionResponse(err.to_string()))
    }

    pub async fn connection_status(
        &self,
        connection_id: &str,
    ) -> Result<ConnectionRecord, BackendError> {
        let response = self
            .request(Method::GET, &format!("connections/{connection_id}"), None)
            .await?;
        serde_json::from_value(response)
            .map_err(|err| BackendError::TractionResponse(err.to_string()))
    }

    /// Resolve the credential definition for a template, provisioning the
    /// schema and definition on first use.
    pub async fn get_or_create_cred_def(
        &self,
        template: &CredentialTemplate,
    ) -> Result<String, BackendError> {
        let schema_id = self.get_or_create_schema(template).await?;

        let created: Value = self
            .request(
                Method::GET,
                &format!("credential-definitions/created?schema_id={schema_id}"),
                None,
            )
            .await?;
        if let Some(id) = first_id(&created, "credential_definition_ids") {
            debug!("Credential definition exists: {}", id);
            return Ok(id);
        }

        info!(
            "TractionClient::get_or_create_cred_def >>> provisioning for schema {}",
            schema_id
        );
        let body = json!({
            "revocation_registry_size": 25,
            "schema_id": schema_id,
            "support_revocation": true,
            "tag": template.name(),
        });
        let response = self
            .request(Method::POST, "credential-definitions", Some(&body))
            .await?;
        response
            .pointer("/sent/credential_definition_id")
            .or_else(|| response.get("credential_definition_id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                BackendError::TractionResponse(
                    "Credential definition response carried no id".to_string(),
                )
            })
    }

    async fn get_or_create_schema(
        &self,
        template: &CredentialTemplate,
    ) -> Result<String, BackendError> {
        let created: Value = self
            .request(
                Method::GET,
                &format!(
                    "schemas/created?schema_name={}&schema_version={}",
                    template.name(),
                    template.version()
                ),
                None,
            )
            .await?;
        if let Some(id) = first_id(&created, "schema_ids") {
            debug!("Schema exists: {}", id);
            return Ok(id);
        }

        info!(
            "TractionClient::get_or_create_schema >>> publishing {} v{}",
            template.name(),
            template.version()
        );
        let attributes: Vec<&str> = template
            .attributes()
            .iter()
            .map(|attr| attr.name.as_str())
            .collect();
        let body = json!({
            "attributes": attributes,
            "schema_name": template.name(),
            "schema_version": template.version(),
        });
        let response = self.request(Method::POST, "schemas", Some(&body)).await?;
        let schema_id = response
            .pointer("/sent/schema_id")
            .or_else(|| response.get("schema_id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                BackendError::TractionResponse("Schema response carried no schema_id".to_string())
            })?;

        // Let the ledger catch up before referencing the schema.
        tokio::time::sleep(SCHEMA_SETTLE_DELAY).await;
        Ok(schema_id)
    }

    pub async fn offer_credential(&self, offer: &CredentialOffer) -> Result<Value, BackendError> {
        info!(
            "TractionClient::offer_credential >>> connection_id: {}, cred_def_id: {}",
            offer.connection_id, offer.cred_def_id
        );
        let body = json!({
            "auto_remove": false,
            "connection_id": offer.connection_id,
            "cred_def_id": offer.cred_def_id,
            "credential_proposal": offer.credential_proposal,
            "trace": false,
        });
        self.request(Method::POST, "issue-credential/send", Some(&body))
            .await
    }

    /// Liveness of the agent behind the proxy.
    pub async fn ready(&self) -> bool {
        match self.request(Method::GET, "status/ready", None).await {
            Ok(_) => true,
            Err(err) => {
                warn!("Agent readiness probe failed: {}", err);
                false
            }
        }
    }

    pub async fn credential_exchanges(
        &self,
        connection_id: &str,
    ) -> Result<Value, BackendError> {
        self.request(
            Method::GET,
            &format!("issue-credential/records?connection_id={connection_id}"),
            None,
        )
        .await
    }
}

fn first_id(response: &Value, field: &str) -> Option<String> {
    response
        .get(field)
        .and_then(Value::as_array)
        .and_then(|ids| ids.first())
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_id_takes_the_first_entry() {
        let response = json!({ "schema_ids": ["s1", "s2"] });
        assert_eq!(first_id(&response, "schema_ids"), Some("s1".to_string()));
    }

    #[test]
    fn first_id_handles_absent_and_empty_lists() {
        assert_eq!(first_id(&json!({}), "schema_ids"), None);
        assert_eq!(first_id(&json!({ "schema_ids": [] }), "schema_ids"), None);
    }
}

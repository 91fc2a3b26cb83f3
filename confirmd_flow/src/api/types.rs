use typed_builder::TypedBuilder;
use url::Url;

use crate::{
    credential::CredentialAttribute,
    errors::error::{FlowError, FlowErrorKind, FlowResult},
};

/// `@type` tag the agent expects on a credential preview.
pub const CREDENTIAL_PREVIEW_TYPE: &str = "issue-credential/1.0/credential-preview";

/// Parameters for `POST /demo/connections/createInvite`. The goal code tags
/// which product flow the invitation serves; it affects backend bookkeeping
/// only, not protocol semantics.
#[derive(Clone, Debug, Default, Serialize, Deserialize, TypedBuilder)]
pub struct CreateInviteParams {
    #[builder(default, setter(strip_option, into))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_label: Option<String>,
    #[builder(default, setter(strip_option, into))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[builder(default, setter(strip_option, into))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal_code: Option<String>,
    #[builder(default, setter(strip_option, into))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_type: Option<String>,
}

/// Backend-issued out-of-band invitation bundle. Opaque to the flow apart
/// from the URL (QR / deep link) and the message id used for the one-shot
/// connection lookup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Invitation {
    pub invitation_url: Url,
    pub invitation_msg_id: String,
}

impl Invitation {
    /// Wallet deep link for the invitation, e.g.
    /// `confirmdwallet://aries_connection_invitation?oob=...`.
    pub fn deep_link(&self, wallet_scheme: &str) -> String {
        format!(
            "{}://aries_connection_invitation?{}",
            wallet_scheme,
            self.invitation_url.query().unwrap_or_default()
        )
    }

    /// Render the invitation URL as a QR code SVG.
    pub fn qr_svg(&self) -> FlowResult<String> {
        let qr = fast_qr::QRBuilder::new(self.invitation_url.as_str())
            .build()
            .map_err(|err| {
                FlowError::from_msg(
                    FlowErrorKind::ParsingError,
                    format!("Cannot encode invitation URL as QR: {err:?}"),
                )
            })?;
        Ok(fast_qr::convert::svg::SvgBuilder::default().to_str(&qr))
    }
}

/// Connection status object returned by the backend lookups. Extra agent
/// fields are ignored.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub connection_id: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invitation_msg_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub their_label: Option<String>,
}

/// Credential preview sent along with an offer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CredentialProposal {
    #[serde(rename = "@type")]
    pub msg_type: String,
    pub attributes: Vec<CredentialAttribute>,
}

impl CredentialProposal {
    pub fn new(attributes: Vec<CredentialAttribute>) -> Self {
        Self {
            msg_type: CREDENTIAL_PREVIEW_TYPE.to_string(),
            attributes,
        }
    }
}

/// Body of `POST /demo/credentials/offerCredential` (and the deep-link
/// variant, which shares the shape).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CredentialOffer {
    pub connection_id: String,
    pub cred_def_id: String,
    pub credential_proposal: CredentialProposal,
}

/// Credential-exchange record as reported by the backend; only the state and
/// ids matter to the flow.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CredentialExchangeRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_exchange_id: Option<String>,
    pub connection_id: String,
    pub state: String,
}

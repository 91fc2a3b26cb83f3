use axum::{
    extract::{Path, State, WebSocketUpgrade},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use confirmd_flow::{
    api::{CreateInviteParams, CredentialOffer, Invitation},
    credential::CredentialTemplate,
};
use serde_json::{json, Value};
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer};

use crate::{error::BackendError, socket, AppState};

const ANDROID_STORE_URL: &str =
    "https://play.google.com/store/apps/details?id=com.confirmd.wallet";
const APPLE_STORE_URL: &str = "https://apps.apple.com/app/confirmd-wallet/id1587380443";

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/demo/connections/createInvite", post(create_invitation))
        .route(
            "/demo/connections/invitationId/:invitation_msg_id",
            get(connection_by_invitation),
        )
        .route(
            "/demo/connections/getConnectionStatus/:connection_id",
            get(connection_status),
        )
        .route(
            "/demo/credentials/getOrCreateCredDef",
            post(get_or_create_cred_def),
        )
        .route("/demo/credentials/offerCredential", post(offer_credential))
        .route("/demo/deeplink/offerCredential", post(offer_credential))
        .route("/demo/credentials/connId/:connection_id", get(credential_exchanges))
        .route("/demo/server/last-reset", get(last_reset))
        .route("/demo/server/ready", get(server_ready))
        .route("/demo/agent/ready", get(agent_ready))
        .route("/demo/webhooks/topic/:topic", post(receive_webhook))
        .route("/demo/socket", get(socket_upgrade))
        .route("/demo/qr", get(wallet_store_redirect))
        .layer(CatchPanicLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn create_invitation(
    State(state): State<AppState>,
    Json(params): Json<CreateInviteParams>,
) -> Result<Json<Invitation>, BackendError> {
    Ok(Json(state.traction.create_invitation(&params).await?))
}

async fn connection_by_invitation(
    State(state): State<AppState>,
    Path(invitation_msg_id): Path<String>,
) -> Result<Json<Value>, BackendError> {
    let record = state
        .traction
        .connection_by_invitation(&invitation_msg_id)
        .await?;
    Ok(Json(json!(record)))
}

async fn connection_status(
    State(state): State<AppState>,
    Path(connection_id): Path<String>,
) -> Result<Json<Value>, BackendError> {
    let record = state.traction.connection_status(&connection_id).await?;
    Ok(Json(json!(record)))
}

async fn get_or_create_cred_def(
    State(state): State<AppState>,
    Json(template): Json<CredentialTemplate>,
) -> Result<Json<Value>, BackendError> {
    let id = state.traction.get_or_create_cred_def(&template).await?;
    Ok(Json(json!({ "credential_definition_id": id })))
}

/// Push an offer to the peer. The deep-link path shares this handler: the
/// transport difference is client-side (retries), not in the agent call.
async fn offer_credential(
    State(state): State<AppState>,
    Json(offer): Json<CredentialOffer>,
) -> Result<Json<Value>, BackendError> {
    Ok(Json(state.traction.offer_credential(&offer).await?))
}

async fn credential_exchanges(
    State(state): State<AppState>,
    Path(connection_id): Path<String>,
) -> Result<Json<Value>, BackendError> {
    Ok(Json(
        state.traction.credential_exchanges(&connection_id).await?,
    ))
}

/// The demo environment is wiped by redeploying, so process start time is
/// the last-reset marker clients compare their connection date against.
async fn last_reset(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "lastReset": state.started_at.to_rfc3339() }))
}

async fn server_ready() -> Json<Value> {
    Json(json!({ "ready": true }))
}

async fn agent_ready(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "ready": state.traction.ready().await }))
}

/// Agent webhook sink. Whatever the topic, the body is collapsed into the
/// relay envelope and fanned out to subscribed browsers.
async fn receive_webhook(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    trace!("receive_webhook >>> topic: {}", topic);
    if let Some(msg) = socket::webhook_to_message(&topic, &body) {
        state.sockets.publish(&msg);
    }
    Json(json!({}))
}

async fn socket_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| socket::handle_socket(socket, state.sockets))
}

/// Mobile visitors land here from the printed QR; send them to the right
/// app store for the wallet.
async fn wallet_store_redirect(headers: HeaderMap) -> Response {
    let user_agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    match store_url_for(user_agent) {
        Some(url) => Redirect::temporary(url).into_response(),
        None => Json(json!({ "error": "Scan this code with a mobile device" })).into_response(),
    }
}

fn store_url_for(user_agent: &str) -> Option<&'static str> {
    if user_agent.contains("Android") {
        Some(ANDROID_STORE_URL)
    } else if ["iPhone", "iPad", "iPod"]
        .iter()
        .any(|needle| user_agent.contains(needle))
    {
        Some(APPLE_STORE_URL)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn android_user_agents_go_to_play_store() {
        let ua = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36";
        assert_eq!(store_url_for(ua), Some(ANDROID_STORE_URL));
    }

    #[test]
    fn apple_user_agents_go_to_app_store() {
        for device in ["iPhone", "iPad", "iPod"] {
            let ua = format!("Mozilla/5.0 ({device}; CPU OS 17_0 like Mac OS X)");
            assert_eq!(store_url_for(&ua), Some(APPLE_STORE_URL));
        }
    }

    #[test]
    fn desktop_user_agents_get_no_redirect() {
        let ua = "Mozilla/5.0 (X11; Linux x86_64) Firefox/127.0";
        assert_eq!(store_url_for(ua), None);
    }
}

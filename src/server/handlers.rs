//! HTTP endpoints called by the broker's auth plugin.
//!
//! Allow is `200` with an empty body, deny is `401` with a plain-text reason.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, error};

use crate::auth::{AccessType, AuthDecision, Gatekeeper};

/// Body of `/mosquitto-auth-user`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UserPacket {
    pub username: String,
    pub password: String,
}

/// Body of `/mosquitto-auth-acl`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AclPacket {
    pub acc: i64,
    #[serde(rename = "clientid")]
    pub client_id: String,
    pub topic: String,
    pub username: String,
}

/// Body of `/mosquitto-auth-superuser`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SuperuserPacket {
    pub username: String,
}

pub fn router(gatekeeper: Gatekeeper) -> Router {
    Router::new()
        .route(
            "/mosquitto-auth-user",
            post(authenticate_user).fallback(method_not_allowed),
        )
        .route(
            "/mosquitto-auth-acl",
            post(authorize_acl).fallback(method_not_allowed),
        )
        .route(
            "/mosquitto-auth-superuser",
            post(authenticate_superuser).fallback(method_not_allowed),
        )
        .route("/health", get(health))
        .with_state(gatekeeper)
}

async fn authenticate_user(State(gatekeeper): State<Gatekeeper>, body: Bytes) -> Response {
    let packet: UserPacket = match decode(&body) {
        Ok(packet) => packet,
        Err(response) => return response,
    };

    debug!("Authenticating user {}", packet.username);
    respond(gatekeeper.authenticate(&packet.username, &packet.password).await)
}

async fn authorize_acl(State(gatekeeper): State<Gatekeeper>, body: Bytes) -> Response {
    let packet: AclPacket = match decode(&body) {
        Ok(packet) => packet,
        Err(response) => return response,
    };

    let access = AccessType::from(packet.acc);
    debug!(
        "Acl request for user {}, topic: {}, client: {}, access type: {}",
        packet.username, packet.topic, packet.client_id, access
    );

    match gatekeeper.authorize(&packet.username, &packet.topic, access).await {
        Ok(decision) => respond(decision),
        Err(e) => {
            error!(
                "Directory query failed for user <{}> and topic <{}>: {e}",
                packet.username, packet.topic
            );
            (
                StatusCode::UNAUTHORIZED,
                format!(
                    "Authorization for <{}> could not be completed",
                    packet.username
                ),
            )
                .into_response()
        }
    }
}

/// The body is only read for logging; the answer is always deny.
async fn authenticate_superuser(State(gatekeeper): State<Gatekeeper>, body: Bytes) -> Response {
    let username = serde_json::from_slice::<SuperuserPacket>(&body)
        .map(|packet| packet.username)
        .unwrap_or_default();
    respond(gatekeeper.authorize_superuser(&username))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn method_not_allowed() -> Response {
    (StatusCode::METHOD_NOT_ALLOWED, "Only POST method is allowed").into_response()
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, Response> {
    serde_json::from_slice(body)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()).into_response())
}

fn respond(decision: AuthDecision) -> Response {
    if decision.allowed {
        StatusCode::OK.into_response()
    } else {
        (StatusCode::UNAUTHORIZED, decision.reason).into_response()
    }
}

//! NFT Bounty server
//!
//! Thin HTTP mapping of the redemption core: every business decision lives
//! in the engine, the fraud guard and the transfer service.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::Caller;
use crate::error::ClaimError;
use crate::redeem::RedemptionEngine;
use crate::store::{Bounty, LedgerStore, Nft};
use crate::transfer;

pub struct AppState {
    pub engine: RedemptionEngine,
    pub store: Arc<LedgerStore>,
    pub started_at: std::time::Instant,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/bounties", get(bounties_handler))
        .route("/bounty/claim", post(claim_handler))
        .route("/nft/send", post(send_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

impl IntoResponse for ClaimError {
    fn into_response(self) -> Response {
        let status = match &self {
            ClaimError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ClaimError::CooldownActive => StatusCode::TOO_MANY_REQUESTS,
            ClaimError::InvalidOrInactiveBounty
            | ClaimError::NftNotFound
            | ClaimError::RecipientNotFound => StatusCode::NOT_FOUND,
            ClaimError::QuotaExceeded
            | ClaimError::AlreadyClaimed
            | ClaimError::IpAlreadyClaimed
            | ClaimError::NoAvailableNft => StatusCode::CONFLICT,
            ClaimError::NoIpOnRecord | ClaimError::NotOwner => StatusCode::FORBIDDEN,
            ClaimError::Contention => StatusCode::SERVICE_UNAVAILABLE,
            ClaimError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if let ClaimError::Storage(e) = &self {
            error!("storage error: {e}");
        }
        let body = Json(serde_json::json!({
            "code": self.code(),
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

#[derive(Debug, Serialize)]
struct HealthResponse {
    healthy: bool,
    uptime_secs: u64,
    version: String,
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        healthy: true,
        uptime_secs: state.started_at.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Public listing of active bounties. The claim code is only revealed for
/// bounties explicitly marked public.
#[derive(Debug, Serialize)]
struct BountyView {
    id: Uuid,
    track_id: Uuid,
    public: bool,
    public_code: Option<String>,
    random: bool,
    max_claim: Option<i64>,
    claim_count: i64,
}

impl From<Bounty> for BountyView {
    fn from(bounty: Bounty) -> Self {
        let public_code = bounty.is_public.then(|| bounty.claim_code.clone());
        Self {
            id: bounty.id,
            track_id: bounty.track_id,
            public: bounty.is_public,
            public_code,
            random: bounty.is_random,
            max_claim: bounty.max_claim,
            claim_count: bounty.claim_count,
        }
    }
}

async fn bounties_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<BountyView>>, ClaimError> {
    let bounties = state.store.list_active_bounties()?;
    Ok(Json(bounties.into_iter().map(BountyView::from).collect()))
}

#[derive(Debug, Deserialize)]
struct ClaimRequest {
    claim_code: String,
}

async fn claim_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(request): Json<ClaimRequest>,
) -> Result<Json<Nft>, ClaimError> {
    tracing::debug!(
        "claim attempt by {} (source ip {:?})",
        caller.user_id,
        caller.source_ip
    );
    let nft = state.engine.claim(&caller, &request.claim_code)?;
    Ok(Json(nft))
}

#[derive(Debug, Deserialize)]
struct SendRequest {
    nft_id: Uuid,
    new_owner_id: Uuid,
}

async fn send_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(request): Json<SendRequest>,
) -> Result<Json<Nft>, ClaimError> {
    let nft = transfer::send_nft(&state.store, &caller, request.nft_id, request.new_owner_id)?;
    Ok(Json(nft))
}

/// Run the server
pub async fn run_server(host: &str, port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let router = create_router(state);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("NFT bounty server listening on {addr}");
    axum::serve(listener, router).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::NewBounty;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state() -> (Arc<AppState>, Uuid, Uuid) {
        let store = Arc::new(LedgerStore::in_memory().unwrap());
        let user = store.create_user("collector").unwrap();
        store.attach_ip(user.id, "203.0.113.7").unwrap();
        let recipient = store.create_user("friend").unwrap();
        let track = store.create_track("Midnight Echo", "Velvet Fox").unwrap();
        for n in 1..=3 {
            store.insert_nft(track.id, n).unwrap();
        }
        store
            .create_bounty(NewBounty {
                claim_code: "deadbeefcafe0123".to_string(),
                track_id: track.id,
                is_active: true,
                is_public: true,
                is_random: false,
                max_claim: Some(3),
            })
            .unwrap();

        let engine = RedemptionEngine::new(store.clone(), &Config::default());
        let state = Arc::new(AppState {
            engine,
            store,
            started_at: std::time::Instant::now(),
        });
        (state, user.id, recipient.id)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_claim_endpoint_round_trip() {
        let (state, user, recipient) = test_state();
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/bounty/claim")
                    .header("content-type", "application/json")
                    .header("x-user-id", user.to_string())
                    .body(Body::from(r#"{"claim_code":"deadbeefcafe0123"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let nft = body_json(response).await;
        assert_eq!(nft["number"], 1);
        assert_eq!(nft["owner_id"], user.to_string());

        // The fresh owner can pass the collectible on.
        let send = serde_json::json!({
            "nft_id": nft["id"],
            "new_owner_id": recipient,
        });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/nft/send")
                    .header("content-type", "application/json")
                    .header("x-user-id", user.to_string())
                    .body(Body::from(send.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let sent = body_json(response).await;
        assert_eq!(sent["owner_id"], recipient.to_string());
    }

    #[tokio::test]
    async fn test_claim_requires_identity() {
        let (state, _, _) = test_state();
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/bounty/claim")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"claim_code":"deadbeefcafe0123"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["code"], "UNAUTHENTICATED");
    }

    #[tokio::test]
    async fn test_wrong_code_maps_to_not_found() {
        let (state, user, _) = test_state();
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/bounty/claim")
                    .header("content-type", "application/json")
                    .header("x-user-id", user.to_string())
                    .body(Body::from(r#"{"claim_code":"0000000000000000"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["code"], "INVALID_OR_INACTIVE_BOUNTY");
    }

    #[tokio::test]
    async fn test_bounty_listing_reveals_public_codes_only() {
        let (state, _, _) = test_state();
        let track = state.store.create_track("Silent Harbor", "Neon Orchid").unwrap();
        state
            .store
            .create_bounty(NewBounty {
                claim_code: "secret0000000000".to_string(),
                track_id: track.id,
                is_active: true,
                is_public: false,
                is_random: false,
                max_claim: None,
            })
            .unwrap();
        let app = create_router(state);

        let response = app
            .oneshot(Request::builder().uri("/bounties").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let listing = body.as_array().unwrap();
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0]["public_code"], "deadbeefcafe0123");
        assert!(listing[1]["public_code"].is_null());
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _, _) = test_state();
        let app = create_router(state);
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["healthy"], true);
    }
}

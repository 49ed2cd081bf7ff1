//! REST API Endpoints
//!
//! Health, status, root, and proof endpoints for the mint front end.

use crate::state::{AppState, LookupCounts};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use whitelist_proof::proof::{hash_serde, hash_vec_serde};
use whitelist_proof::{format_hash, verify_membership, Address, RootStatus};

/// Run the API server
pub async fn run_server(listen: String, state: AppState) -> anyhow::Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&listen).await?;
    tracing::info!(address = %listen, "API server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/root", get(root))
        .route("/proof/{address}", get(get_proof))
        .route("/verify", post(verify))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    root_status: &'static str,
}

/// Health check endpoint
async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let healthy = state.is_healthy();
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if healthy { "healthy" } else { "degraded" },
        root_status: state.root_status().as_str(),
    };

    (status_code, Json(response))
}

/// Status response
#[derive(Serialize)]
struct StatusResponse {
    local_root: String,
    onchain_root: Option<String>,
    root: RootStatus,
    members: usize,
    tree_depth: usize,
    odd_node_policy: String,
    uptime_secs: u64,
    lookups: LookupCounts,
    last_error: Option<String>,
}

/// Status endpoint
async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let tree = state.tree();
    Json(StatusResponse {
        local_root: format_hash(&state.local_root()),
        onchain_root: state.onchain_root().as_ref().map(format_hash),
        root: state.root_status(),
        members: tree.len(),
        tree_depth: tree.depth(),
        odd_node_policy: tree.policy().to_string(),
        uptime_secs: state.uptime_secs(),
        lookups: state.lookup_counts(),
        last_error: state.last_error(),
    })
}

/// Root response
#[derive(Serialize)]
struct RootResponse {
    #[serde(with = "hash_serde")]
    root: [u8; 32],
}

/// Locally built whitelist root
async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        root: state.local_root(),
    })
}

/// Proof response, shaped for `mint(bytes32[])`
#[derive(Debug, Serialize)]
struct ProofResponse {
    address: Address,
    #[serde(with = "hash_serde")]
    leaf: [u8; 32],
    leaf_index: usize,
    #[serde(with = "hash_vec_serde")]
    proof: Vec<[u8; 32]>,
    #[serde(with = "hash_serde")]
    root: [u8; 32],
    /// Agreement of `root` with the contract
    root_status: RootStatus,
}

/// Get the membership proof for an address
///
/// Answers 409 while the contract holds a different root.
async fn get_proof(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<ProofResponse>, StatusCode> {
    let address = Address::parse(&address).map_err(|_| StatusCode::BAD_REQUEST)?;

    let root_status = state.root_status();
    if root_status.is_mismatch() {
        tracing::warn!(%address, "Refusing proof while whitelist root disagrees with contract");
        return Err(StatusCode::CONFLICT);
    }

    let proof = state.prove(&address).ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(ProofResponse {
        address,
        leaf: proof.leaf,
        leaf_index: proof.leaf_index,
        proof: proof.siblings(),
        root: state.local_root(),
        root_status,
    }))
}

/// Verify request
#[derive(Debug, Deserialize)]
struct VerifyRequest {
    address: Address,
    #[serde(with = "hash_vec_serde")]
    proof: Vec<[u8; 32]>,
    /// Defaults to the local root
    #[serde(default, with = "optional_hash")]
    root: Option<[u8; 32]>,
}

/// Verify response
#[derive(Debug, Serialize)]
struct VerifyResponse {
    valid: bool,
    #[serde(with = "hash_serde")]
    root: [u8; 32],
}

/// Check a proof without touching the tree
async fn verify(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Json<VerifyResponse> {
    let root = request.root.unwrap_or_else(|| state.local_root());
    let valid = verify_membership(&request.address, &request.proof, &root);
    Json(VerifyResponse { valid, root })
}

mod optional_hash {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<[u8; 32]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|s| whitelist_proof::parse_hash(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use whitelist_proof::MembershipTree;

    fn aa_address(last: u8) -> Address {
        let mut bytes = [0xAA; 20];
        bytes[19] = last;
        Address::from_bytes(bytes)
    }

    fn test_state() -> AppState {
        let list = [aa_address(1), aa_address(2), aa_address(3)];
        AppState::new(Arc::new(MembershipTree::build(&list).unwrap()))
    }

    // Basic test that router creation works
    #[test]
    fn test_create_router() {
        let _router = create_router(test_state());
    }

    #[tokio::test]
    async fn test_health_response_healthy() {
        let state = test_state();
        let (status_code, Json(response)) = health(State(state)).await;

        assert_eq!(status_code, StatusCode::OK);
        assert_eq!(response.status, "healthy");
        assert_eq!(response.root_status, "unknown");
    }

    #[tokio::test]
    async fn test_health_response_degraded() {
        let state = test_state();
        state.set_onchain_root(Some([0u8; 32]));

        let (status_code, Json(response)) = health(State(state)).await;

        assert_eq!(status_code, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.status, "degraded");
        assert_eq!(response.root_status, "mismatch");
    }

    #[tokio::test]
    async fn test_status_response() {
        let state = test_state();
        state.set_onchain_root(Some(state.local_root()));

        let Json(response) = status(State(state.clone())).await;

        assert_eq!(response.local_root, format_hash(&state.local_root()));
        assert_eq!(response.onchain_root, Some(format_hash(&state.local_root())));
        assert_eq!(response.root, RootStatus::Match);
        assert_eq!(response.members, 3);
        assert_eq!(response.tree_depth, 2);
        assert_eq!(response.odd_node_policy, "duplicate");
    }

    #[tokio::test]
    async fn test_root_response() {
        let state = test_state();
        let Json(response) = root(State(state.clone())).await;
        assert_eq!(response.root, state.local_root());
    }

    #[tokio::test]
    async fn test_get_proof_member() {
        let state = test_state();
        let Json(response) = get_proof(
            State(state.clone()),
            Path("0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA02".to_string()),
        )
        .await
        .unwrap();

        assert_eq!(response.address, aa_address(2));
        assert_eq!(response.leaf_index, 1);
        assert_eq!(response.root_status, RootStatus::Unknown);
        assert!(verify_membership(&aa_address(2), &response.proof, &response.root));
        assert_eq!(state.lookup_counts().proofs_served, 1);
    }

    #[tokio::test]
    async fn test_get_proof_reports_matching_root() {
        let state = test_state();
        state.set_onchain_root(Some(state.local_root()));

        let Json(response) = get_proof(State(state), Path(aa_address(1).to_string()))
            .await
            .unwrap();
        assert_eq!(response.root_status, RootStatus::Match);
    }

    #[tokio::test]
    async fn test_get_proof_refused_on_root_mismatch() {
        let state = test_state();
        state.set_onchain_root(Some([0x55; 32]));

        let result = get_proof(State(state.clone()), Path(aa_address(2).to_string())).await;

        assert_eq!(result.unwrap_err(), StatusCode::CONFLICT);
        // Refused before lookup, so nothing was counted as served
        assert_eq!(state.lookup_counts().proofs_served, 0);
    }

    #[tokio::test]
    async fn test_get_proof_not_whitelisted() {
        let state = test_state();
        let result = get_proof(State(state.clone()), Path(aa_address(4).to_string())).await;

        assert_eq!(result.unwrap_err(), StatusCode::NOT_FOUND);
        assert_eq!(state.lookup_counts().not_found, 1);
    }

    #[tokio::test]
    async fn test_get_proof_bad_address() {
        let result = get_proof(State(test_state()), Path("0x1234".to_string())).await;
        assert_eq!(result.unwrap_err(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_verify_with_local_root() {
        let state = test_state();
        let proof = state.tree().prove(&aa_address(3)).unwrap();

        let request: VerifyRequest = serde_json::from_value(serde_json::json!({
            "address": aa_address(3).to_string(),
            "proof": proof.hex_siblings(),
        }))
        .unwrap();
        let Json(response) = verify(State(state.clone()), Json(request)).await;
        assert!(response.valid);
        assert_eq!(response.root, state.local_root());

        // Same proof, wrong address
        let request: VerifyRequest = serde_json::from_value(serde_json::json!({
            "address": aa_address(4).to_string(),
            "proof": proof.hex_siblings(),
        }))
        .unwrap();
        let Json(response) = verify(State(state), Json(request)).await;
        assert!(!response.valid);
    }

    #[tokio::test]
    async fn test_verify_against_explicit_root() {
        let state = test_state();
        let proof = state.tree().prove(&aa_address(1)).unwrap();

        let request: VerifyRequest = serde_json::from_value(serde_json::json!({
            "address": aa_address(1).to_string(),
            "proof": proof.hex_siblings(),
            "root": format_hash(&[0x55; 32]),
        }))
        .unwrap();
        let Json(response) = verify(State(state), Json(request)).await;
        assert!(!response.valid);
        assert_eq!(response.root, [0x55; 32]);
    }
}

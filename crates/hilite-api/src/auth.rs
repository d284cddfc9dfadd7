//! Authenticated-identity extraction.
//!
//! Token verification itself happens in the fronting auth layer; by the
//! time a request reaches this service, that layer has injected the
//! verified identity and the user's current plan as headers. The plan is
//! re-read on every request — it is never taken from anything the client
//! could have cached or forged into a token payload.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use hilite_models::PlanTier;

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the verified user id.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the user's current plan id.
pub const USER_PLAN_HEADER: &str = "x-user-plan";

/// The authenticated caller and their plan snapshot for this request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub plan: PlanTier,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::unauthorized("Missing authenticated identity"))?
            .to_string();

        // Unknown or absent plan ids resolve to the most restrictive tier.
        let plan = parts
            .headers
            .get(USER_PLAN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(PlanTier::from_str)
            .unwrap_or_default();

        Ok(Self { user_id, plan })
    }
}

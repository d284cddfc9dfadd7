//! Plan feature summary handler.

use axum::Json;

use hilite_models::PlanFeatures;

use crate::auth::AuthUser;

/// Get the caller's plan capabilities.
///
/// GET /api/plan/features
///
/// The editor uses this to gate colors, animations, and quality options
/// before a render is ever submitted.
pub async fn plan_features(user: AuthUser) -> Json<PlanFeatures> {
    Json(PlanFeatures::for_tier(user.plan))
}

//! Caller identity middleware for protected routes.
//!
//! The service sits behind an API gateway that authenticates callers
//! and forwards their identity as headers:
//!
//! - `x-actor-id` - the caller's user ID (UUID, required)
//! - `x-actor-role` - `participant`, `faculty`, or `admin`
//!   (optional, defaults to `participant`)
//!
//! `require_actor` validates the headers and injects an [`Actor`] into
//! request extensions for downstream handlers. The service performs no
//! authentication itself; a missing or malformed identity is rejected
//! with 401 before any handler runs.

use crate::errors::RcError;
use crate::models::{Actor, ActorRole};
use axum::{extract::Request, middleware::Next, response::IntoResponse};
use common::types::UserId;
use tracing::instrument;
use uuid::Uuid;

/// Header carrying the caller's user ID.
pub const ACTOR_ID_HEADER: &str = "x-actor-id";

/// Header carrying the caller's role.
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// Extract the gateway-asserted identity from request headers.
fn extract_actor(req: &Request) -> Result<Actor, RcError> {
    let raw_id = req
        .headers()
        .get(ACTOR_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "rc.middleware.actor", "Missing x-actor-id header");
            RcError::InvalidActor("Missing x-actor-id header".to_string())
        })?;

    let id = Uuid::parse_str(raw_id).map_err(|_| {
        tracing::debug!(target: "rc.middleware.actor", "Malformed x-actor-id header");
        RcError::InvalidActor("x-actor-id must be a UUID".to_string())
    })?;

    let role = match req
        .headers()
        .get(ACTOR_ROLE_HEADER)
        .and_then(|h| h.to_str().ok())
    {
        Some(raw_role) => raw_role.parse::<ActorRole>().map_err(|_| {
            tracing::debug!(target: "rc.middleware.actor", "Unknown x-actor-role header");
            RcError::InvalidActor(format!("Unknown actor role: {raw_role}"))
        })?,
        None => ActorRole::Participant,
    };

    Ok(Actor::new(UserId(id), role))
}

/// Identity middleware for API routes.
///
/// # Response
///
/// - Returns 401 Unauthorized if the identity headers are missing or
///   malformed
/// - Continues to the next handler with [`Actor`] in extensions
///   otherwise
#[instrument(skip_all, name = "rc.middleware.actor")]
pub async fn require_actor(mut req: Request, next: Next) -> Result<impl IntoResponse, RcError> {
    let actor = extract_actor(&req)?;
    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}

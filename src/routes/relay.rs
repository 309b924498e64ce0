//! Relay Routes
//!
//! Endpoints (all `GET`, parameters in the query string):
//! - `/?url=` - Start a session for a source URL
//! - `/upload?session=&chunk=&folder=` - Relay one chunk
//! - `/progress?session=` - Report progress, completing when ready
//! - `/clear?session=` - Abort and delete a session
//! - `/debug?session=` - Dump the stored session

use axum::{
    extract::{Query, State},
    Json,
};

use crate::error::{RelayError, Result};
use crate::state::AppState;
use crate::upload::{
    ChunkQuery, ChunkRelayed, ChunkRequest, ClearOutcome, CreateSessionQuery, ProgressReport,
    SessionCreated, SessionQuery, SessionSnapshot,
};

/// Start a session
pub async fn create_session(
    State(state): State<AppState>,
    Query(query): Query<CreateSessionQuery>,
) -> Result<Json<SessionCreated>> {
    let url = query
        .url
        .filter(|u| !u.is_empty())
        .ok_or(RelayError::MissingParameter("url"))?;

    Ok(Json(state.upload().create_session(&url).await?))
}

/// Relay one chunk
pub async fn relay_chunk(
    State(state): State<AppState>,
    Query(query): Query<ChunkQuery>,
) -> Result<Json<ChunkRelayed>> {
    let request = ChunkRequest::try_from(query)?;
    Ok(Json(state.upload().relay_chunk(request).await?))
}

/// Report progress
pub async fn progress(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<ProgressReport>> {
    let session_id = query.session_id()?;
    Ok(Json(state.upload().progress(session_id).await?))
}

/// Clear a session
pub async fn clear(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<ClearOutcome>> {
    let session_id = query.session_id()?;
    Ok(Json(state.upload().clear_session(session_id).await?))
}

/// Dump a session
pub async fn debug(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<SessionSnapshot>> {
    let session_id = query.session_id()?;
    Ok(Json(state.upload().inspect(session_id).await?))
}

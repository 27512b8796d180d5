use serde::Deserialize;

use super::*;

#[derive(Deserialize)]
pub struct DeleteQuery {
    id: Option<String>,
}

/// Soft-delete one of the requester's own recent comments.
pub async fn comment(
    headers: HeaderMap,
    State(state): State<AppState>,
    ReqPath(path): ReqPath<String>,
    Query(query): Query<DeleteQuery>,
) -> StoreResult<Response> {
    let store = comment_store(&state)?;
    let requester = auth::require_identity(&headers, &state)?;

    let Some(id) = query.id.filter(|id| !id.is_empty()) else {
        return Ok((StatusCode::BAD_REQUEST, "missing comment id").into_response());
    };
    let path = ContentPath::parse(&path)?;

    store.soft_delete(&path, &id, &requester).await?;
    tracing::info!(%path, %requester, %id, "comment deleted");

    Ok(StatusCode::NO_CONTENT.into_response())
}

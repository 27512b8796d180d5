use chrono::Utc;
use maud::Markup;

use super::*;

/// The player page for a media file, with its comments.
pub async fn view(
    headers: HeaderMap,
    State(state): State<AppState>,
    ReqPath(path): ReqPath<String>,
) -> StoreResult<Markup> {
    let path = ContentPath::parse(&path)?;
    let comments = match &state.comments {
        Some(store) => Some(store.list_visible(&path).await?),
        None => None,
    };
    let user = auth::identity(&headers, &state);

    Ok(html::pages::view(
        &path,
        comments.as_deref(),
        user.as_ref(),
        Utc::now(),
    ))
}

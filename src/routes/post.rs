use axum::extract::rejection::FormRejection;
use serde::Deserialize;

use super::*;

#[derive(Deserialize)]
pub struct CommentForm {
    /// A form without the field posts an empty comment.
    #[serde(default)]
    content: String,
}

/// Add a comment to a file's thread and go back to its page.
pub async fn comment(
    headers: HeaderMap,
    State(state): State<AppState>,
    ReqPath(path): ReqPath<String>,
    form: Result<Form<CommentForm>, FormRejection>,
) -> StoreResult<Response> {
    let store = comment_store(&state)?;
    let author = auth::require_identity(&headers, &state)?;
    let path = ContentPath::parse(&path)?;

    let Form(form) = match form {
        Ok(form) => form,
        Err(rejection) => return Ok(rejection.into_response()),
    };

    let comment = store.append(&path, &author, form.content).await?;
    tracing::info!(%path, %author, id = ?comment.id, "comment added");

    Ok(Redirect::to(&format!("/view/{}", html::encode_path(path.as_str()))).into_response())
}

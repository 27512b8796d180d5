use std::{io, path::Path};

use axum::body::Body;
use axum::extract::Request;
use tokio::fs;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use super::*;
use crate::html::pages::ListEntry;

pub async fn root(State(state): State<AppState>, request: Request) -> StoreResult<Response> {
    browse(&state, ContentPath::root(), request).await
}

pub async fn files(
    State(state): State<AppState>,
    ReqPath(path): ReqPath<String>,
    request: Request,
) -> StoreResult<Response> {
    browse(&state, ContentPath::parse(&path)?, request).await
}

/// Hidden entries (the comment store, if it lives inside the content tree,
/// among them) are neither listed nor served.
fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// List a directory or serve a file from the content tree.
async fn browse(state: &AppState, path: ContentPath, request: Request) -> StoreResult<Response> {
    if path.segments().any(is_hidden) {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }

    let location = path.under(&state.config.data);
    let metadata = match fs::metadata(&location).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Ok(StatusCode::NOT_FOUND.into_response());
        }
        Err(e) => return Err(e.into()),
    };

    if !metadata.is_dir() {
        return Ok(serve_file(&location, &path, request).await);
    }

    let mut entries = Vec::new();
    let mut dir = fs::read_dir(&location).await?;
    while let Some(entry) = dir.next_entry().await? {
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if is_hidden(&name) {
            continue;
        }
        let is_dir = entry.file_type().await.is_ok_and(|t| t.is_dir());
        entries.push(ListEntry {
            name,
            is_dir,
            comments: 0,
        });
    }

    // Counts are read without locking; a comment being written right now may
    // or may not be included.
    let counts = match &state.comments {
        Some(store) => store.count_visible(&path).await?,
        None => Default::default(),
    };
    for entry in entries.iter_mut().filter(|e| !e.is_dir) {
        entry.comments = counts.get(&entry.name).copied().unwrap_or(0);
    }

    // Directories first, then by name.
    entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));

    let user = auth::identity(request.headers(), state);
    Ok(html::pages::list(&path, &entries, user.as_ref()).into_response())
}

/// Stream a file, honoring range and conditional requests, with the content
/// type the player expects.
async fn serve_file(location: &Path, path: &ContentPath, request: Request) -> Response {
    let response = match ServeFile::new(location).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    let mut response = response.map(Body::new);

    if response.status().is_success() {
        match HeaderValue::try_from(html::media_type(path.as_str())) {
            Ok(value) => {
                response.headers_mut().insert(header::CONTENT_TYPE, value);
            }
            Err(error) => tracing::warn!(%path, %error, "unusable content type"),
        }
    }
    response
}

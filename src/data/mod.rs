use std::{
    fmt::{self, Display},
    path::{Path, PathBuf},
};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

pub use comments::{Comment, CommentStore};
pub use locks::PathLocks;
pub use migrate::{migrate, MigrationReport};

/// Comment threads persisted next to the content tree.
pub mod comments;

/// Per-path mutual exclusion for read-modify-write cycles.
pub mod locks;

/// Startup backfill of comment ids.
pub mod migrate;

/// Why a delete was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// The requester did not write the comment.
    NotAuthor,

    /// The grace window after creation has passed.
    WindowExpired,
}

impl Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Denial::NotAuthor => f.write_str("not the author"),
            Denial::WindowExpired => f.write_str("delete window expired"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The thread or the comment does not exist (or was already deleted).
    #[error("comment not found")]
    NotFound,

    #[error("forbidden: {0}")]
    Forbidden(Denial),

    /// A mutation was attempted without a signed-in identity.
    #[error("login required")]
    Unauthorized,

    #[error("invalid content path")]
    InvalidPath,

    #[error("comment storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not decode comment data: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = match &self {
            StoreError::NotFound => StatusCode::NOT_FOUND,
            StoreError::Forbidden(_) => StatusCode::FORBIDDEN,
            StoreError::Unauthorized => StatusCode::UNAUTHORIZED,
            StoreError::InvalidPath => StatusCode::BAD_REQUEST,
            StoreError::Io(_) | StoreError::Decode(_) => {
                tracing::error!(error = %self, "comment store failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}

/// A normalized path into the content tree, relative to its root.
///
/// Routes strip their own prefix (`/files/`, `/view/`, `/comment/`) and hand
/// the remainder here, so every route derives the same storage key for the
/// same piece of content. The empty path is the content root.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContentPath(String);

impl ContentPath {
    pub fn root() -> Self {
        ContentPath(String::new())
    }

    pub fn parse(raw: &str) -> StoreResult<Self> {
        let mut segments = Vec::new();
        for segment in raw.split('/') {
            match segment {
                "" => continue,
                "." | ".." => return Err(StoreError::InvalidPath),
                s if s.contains('\\') || s.contains('\0') => return Err(StoreError::InvalidPath),
                s => segments.push(s),
            }
        }
        Ok(ContentPath(segments.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// The last segment, or `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        self.segments().last()
    }

    /// This path appended to `root`.
    pub fn under(&self, root: &Path) -> PathBuf {
        self.segments().fold(root.to_path_buf(), |path, s| path.join(s))
    }
}

impl Display for ContentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_normalize_slashes() {
        let path = ContentPath::parse("/music//album/song.mp3/").unwrap();
        assert_eq!(path.as_str(), "music/album/song.mp3");
        assert_eq!(path.file_name(), Some("song.mp3"));
        assert_eq!(
            path.under(Path::new("/srv/comments")),
            PathBuf::from("/srv/comments/music/album/song.mp3")
        );

        assert!(ContentPath::parse("/").unwrap().is_root());
        assert_eq!(ContentPath::root().file_name(), None);
    }

    #[test]
    fn paths_cannot_escape_the_root() {
        for raw in ["..", "a/../b", "./a", "a\\..\\b", "a\0b"] {
            assert!(
                matches!(ContentPath::parse(raw), Err(StoreError::InvalidPath)),
                "{raw:?} should be rejected"
            );
        }
    }
}

use std::{
    collections::HashMap,
    ffi::OsStr,
    future::Future,
    io,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tokio::{fs, io::AsyncWriteExt};

use super::*;
use crate::session::Identity;
use crate::token;

/// How long after creation the author may still delete a comment.
pub const GRACE_PERIOD_SECS: i64 = 5 * 60;

/// Prefix of the scratch files a thread is written to before being renamed
/// into place.
const TMP_PREFIX: &str = ".tmp-";

fn grace_period() -> TimeDelta {
    TimeDelta::seconds(GRACE_PERIOD_SECS)
}

/// A single comment on a piece of content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Opaque random id. Comments written before ids existed have none until
    /// the startup migration assigns one.
    #[serde(rename = "ID", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// The identity of the user who wrote the comment.
    #[serde(rename = "User")]
    pub author: String,

    /// The comment text, stored as written.
    #[serde(rename = "Content")]
    pub body: String,

    /// When the comment was created.
    #[serde(rename = "When")]
    pub created: DateTime<Utc>,

    /// Set once when the author removes the comment. Deleted comments stay on
    /// disk but are never shown or counted.
    #[serde(rename = "Deleted", default, skip_serializing_if = "is_false")]
    pub deleted: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Comment {
    pub fn visible(&self) -> bool {
        !self.deleted
    }

    /// Whether `identity` could delete this comment at `now`.
    pub fn deletable_by(&self, identity: &Identity, now: DateTime<Utc>) -> bool {
        self.visible()
            && self.id.is_some()
            && self.author == identity.as_str()
            && now - self.created < grace_period()
    }
}

/// The on-disk form of a thread: every comment on one piece of content,
/// newest first.
#[derive(Default, Serialize, Deserialize)]
pub(super) struct ThreadFile {
    #[serde(rename = "Comments", default, deserialize_with = "null_as_empty")]
    pub(super) comments: Vec<Comment>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Comment>, D::Error> {
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

impl ThreadFile {
    /// Read the thread at `path`. Returns `None` if there is no file.
    pub(super) async fn load(path: &Path) -> StoreResult<Option<Self>> {
        match fs::read(path).await {
            Ok(bytes) => Self::decode(&bytes).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn decode(bytes: &[u8]) -> StoreResult<Self> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Replace the thread at `path`.
    ///
    /// The data is written to a sibling scratch file first and renamed over
    /// the target, so readers see either the old thread or the new one.
    pub(super) async fn save(&self, path: &Path) -> StoreResult<()> {
        static SEQ: AtomicU64 = AtomicU64::new(0);

        let data = serde_json::to_vec(self)?;
        let parent = path.parent().unwrap_or(Path::new("."));
        let tmp_path = parent.join(format!(
            "{TMP_PREFIX}{}-{}-{}",
            std::process::id(),
            SEQ.fetch_add(1, Ordering::Relaxed),
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        ));

        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(&data).await?;
        file.sync_data().await?;
        drop(file);

        if let Err(e) = fs::rename(&tmp_path, path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        Ok(())
    }

    pub(super) fn visible(&self) -> impl Iterator<Item = &Comment> {
        self.comments.iter().filter(|c| c.visible())
    }
}

/// Whether a directory entry is a scratch file left by [`ThreadFile::save`].
pub(super) fn is_temp_file(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with(TMP_PREFIX)
}

/// Run a mutation to completion on its own task.
///
/// The caller's future may be dropped (a client hanging up), but the spawned
/// task keeps going, so a lock is never abandoned halfway through a write.
async fn detached<T, F>(task: F) -> StoreResult<T>
where
    T: Send + 'static,
    F: Future<Output = StoreResult<T>> + Send + 'static,
{
    match tokio::spawn(task).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(io::Error::other(e).into()),
    }
}

/// File-backed comment threads, one file per piece of content, mirroring the
/// content tree under a separate root.
#[derive(Clone)]
pub struct CommentStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    root: PathBuf,
    locks: PathLocks,
}

impl CommentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        CommentStore {
            inner: Arc::new(StoreInner {
                root: root.into(),
                locks: PathLocks::new(),
            }),
        }
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub(super) fn locks(&self) -> &PathLocks {
        &self.inner.locks
    }

    fn thread_path(&self, path: &ContentPath) -> StoreResult<PathBuf> {
        if path.is_root() {
            return Err(StoreError::InvalidPath);
        }
        Ok(path.under(&self.inner.root))
    }

    /// Add a comment by `author` to the top of the thread for `path`.
    pub async fn append(
        &self,
        path: &ContentPath,
        author: &Identity,
        body: String,
    ) -> StoreResult<Comment> {
        let file = self.thread_path(path)?;
        let author = author.as_str().to_owned();
        let store = self.clone();

        detached(async move {
            if let Some(parent) = file.parent() {
                fs::create_dir_all(parent).await?;
            }

            let _guard = store.locks().acquire(&file).await;
            let mut thread = ThreadFile::load(&file).await?.unwrap_or_default();

            let mut id = token::comment_id();
            while thread.comments.iter().any(|c| c.id.as_ref() == Some(&id)) {
                id = token::comment_id();
            }

            let comment = Comment {
                id: Some(id),
                author,
                body,
                created: Utc::now(),
                deleted: false,
            };
            thread.comments.insert(0, comment.clone());
            thread.save(&file).await?;

            Ok(comment)
        })
        .await
    }

    /// Hide comment `id` on `path`, if `requester` wrote it less than
    /// [`GRACE_PERIOD_SECS`] ago.
    pub async fn soft_delete(
        &self,
        path: &ContentPath,
        id: &str,
        requester: &Identity,
    ) -> StoreResult<()> {
        self.soft_delete_at(path, id, requester, Utc::now()).await
    }

    pub(crate) async fn soft_delete_at(
        &self,
        path: &ContentPath,
        id: &str,
        requester: &Identity,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let file = self.thread_path(path)?;
        let id = id.to_owned();
        let requester = requester.clone();
        let store = self.clone();

        detached(async move {
            let _guard = store.locks().acquire(&file).await;
            let Some(mut thread) = ThreadFile::load(&file).await? else {
                return Err(StoreError::NotFound);
            };

            let comment = thread
                .comments
                .iter_mut()
                .find(|c| c.id.as_ref() == Some(&id))
                .ok_or(StoreError::NotFound)?;

            if comment.deleted {
                return Err(StoreError::NotFound);
            }
            if comment.author != requester.as_str() {
                return Err(StoreError::Forbidden(Denial::NotAuthor));
            }
            if now - comment.created >= grace_period() {
                return Err(StoreError::Forbidden(Denial::WindowExpired));
            }

            comment.deleted = true;
            thread.save(&file).await
        })
        .await
    }

    /// The visible comments on `path`, newest first.
    ///
    /// Reads without taking the path lock; a concurrent writer's change may
    /// or may not be reflected.
    pub async fn list_visible(&self, path: &ContentPath) -> StoreResult<Vec<Comment>> {
        let file = self.thread_path(path)?;
        let thread = ThreadFile::load(&file).await?.unwrap_or_default();
        Ok(thread.visible().cloned().collect())
    }

    /// Visible comment counts for every thread directly inside directory `dir`,
    /// keyed by file name.
    ///
    /// Threads that cannot be read are logged and left out.
    pub async fn count_visible(&self, dir: &ContentPath) -> StoreResult<HashMap<String, usize>> {
        let dir_path = dir.under(&self.inner.root);
        let mut counts = HashMap::new();

        let mut entries = match fs::read_dir(&dir_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(counts),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            if is_temp_file(&file_name) {
                continue;
            }
            if !entry.file_type().await.is_ok_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.path();
            let Some(name) = file_name.to_str() else {
                tracing::warn!(path = %path.display(), "skipping comment thread with a non-UTF-8 name");
                continue;
            };

            match ThreadFile::load(&path).await {
                Ok(Some(thread)) => {
                    counts.insert(name.to_owned(), thread.visible().count());
                }
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "skipping unreadable comment thread");
                }
            }
        }

        Ok(counts)
    }
}

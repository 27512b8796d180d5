use std::path::PathBuf;

use tokio::fs;

use super::comments::{is_temp_file, ThreadFile};
use super::*;
use crate::token;

/// What a migration pass did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Thread files looked at.
    pub scanned: usize,

    /// Thread files written back because they gained ids.
    pub rewritten: usize,

    /// Comments that were given an id.
    pub assigned: usize,

    /// Thread files or directories that could not be read or decoded.
    pub skipped: usize,
}

/// Give every comment under the store's root an id.
///
/// Only threads that actually gained ids are written, so running this twice
/// changes nothing the second time. Unreadable threads and directories are
/// logged and skipped; only an unreadable root is an error. Each thread is
/// rewritten under its path lock, so the pass is safe to run against a live
/// store.
pub async fn migrate(store: &CommentStore) -> StoreResult<MigrationReport> {
    let mut report = MigrationReport::default();
    let mut pending: Vec<PathBuf> = vec![store.root().to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) if dir == store.root() => return Err(e.into()),
            Err(error) => {
                tracing::warn!(path = %dir.display(), %error, "migrate: skipping unreadable directory");
                report.skipped += 1;
                continue;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(error) => {
                    tracing::warn!(path = %dir.display(), %error, "migrate: directory listing cut short");
                    report.skipped += 1;
                    break;
                }
            };
            if is_temp_file(&entry.file_name()) {
                continue;
            }
            let file_type = match entry.file_type().await {
                Ok(file_type) => file_type,
                Err(error) => {
                    tracing::warn!(path = %entry.path().display(), %error, "migrate: skipping entry");
                    report.skipped += 1;
                    continue;
                }
            };
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                report.scanned += 1;
                migrate_thread(store, entry.path(), &mut report).await;
            }
        }
    }

    Ok(report)
}

async fn migrate_thread(store: &CommentStore, path: PathBuf, report: &mut MigrationReport) {
    let _guard = store.locks().acquire(&path).await;

    let mut thread = match ThreadFile::load(&path).await {
        Ok(Some(thread)) => thread,
        // Removed since the directory was listed.
        Ok(None) => return,
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "migrate: skipping unreadable thread");
            report.skipped += 1;
            return;
        }
    };

    let mut assigned = 0;
    for comment in thread.comments.iter_mut().filter(|c| c.id.is_none()) {
        comment.id = Some(token::comment_id());
        assigned += 1;
    }
    if assigned == 0 {
        return;
    }

    match thread.save(&path).await {
        Ok(()) => {
            tracing::info!(path = %path.display(), assigned, "migrate: assigned comment ids");
            report.rewritten += 1;
            report.assigned += assigned;
        }
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "migrate: could not rewrite thread");
            report.skipped += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs as std_fs;

    use crate::session::Identity;

    use super::*;

    const LEGACY: &str = r#"{"Comments":[
        {"User":"a@x.com","Content":"one","When":"2024-01-02T03:04:05Z"},
        {"ID":"feedface00000000","User":"b@x.com","Content":"two","When":"2024-01-01T00:00:00Z"},
        {"User":"c@x.com","Content":"three","When":"2023-12-31T00:00:00Z","Deleted":true}
    ]}"#;

    #[tokio::test]
    async fn assigns_missing_ids_once() {
        let dir = tempfile::tempdir().unwrap();
        std_fs::create_dir_all(dir.path().join("album")).unwrap();
        std_fs::write(dir.path().join("album/old.mp3"), LEGACY).unwrap();
        let store = CommentStore::new(dir.path());

        let report = migrate(&store).await.unwrap();
        assert_eq!(
            report,
            MigrationReport {
                scanned: 1,
                rewritten: 1,
                assigned: 2,
                skipped: 0,
            }
        );

        let raw: serde_json::Value =
            serde_json::from_str(&std_fs::read_to_string(dir.path().join("album/old.mp3")).unwrap())
                .unwrap();
        let comments = raw["Comments"].as_array().unwrap();
        assert!(comments.iter().all(|c| c["ID"].is_string()));
        assert_eq!(comments[1]["ID"], "feedface00000000");
        assert_eq!(comments[2]["Deleted"], true);

        let migrated = std_fs::read(dir.path().join("album/old.mp3")).unwrap();
        let again = migrate(&store).await.unwrap();
        assert_eq!(again.rewritten, 0);
        assert_eq!(again.assigned, 0);
        assert_eq!(std_fs::read(dir.path().join("album/old.mp3")).unwrap(), migrated);
    }

    #[tokio::test]
    async fn migrated_comments_can_be_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let store = CommentStore::new(dir.path());
        let song = ContentPath::parse("song.mp3").unwrap();
        let a = Identity::new("a@x.com");
        std_fs::write(
            dir.path().join("song.mp3"),
            format!(
                r#"{{"Comments":[{{"User":"a@x.com","Content":"hi","When":"{}"}}]}}"#,
                chrono::Utc::now().to_rfc3339()
            ),
        )
        .unwrap();

        migrate(&store).await.unwrap();
        let comments = store.list_visible(&song).await.unwrap();
        let id = comments[0].id.clone().unwrap();
        store.soft_delete(&song, &id, &a).await.unwrap();
        assert!(store.list_visible(&song).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_threads_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std_fs::write(dir.path().join("bad.mp3"), "garbage").unwrap();
        std_fs::write(dir.path().join("old.mp3"), LEGACY).unwrap();
        let store = CommentStore::new(dir.path());

        let report = migrate(&store).await.unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.rewritten, 1);
        assert_eq!(std_fs::read_to_string(dir.path().join("bad.mp3")).unwrap(), "garbage");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn runs_alongside_live_writers() {
        let dir = tempfile::tempdir().unwrap();
        std_fs::write(dir.path().join("song.mp3"), LEGACY).unwrap();
        let store = CommentStore::new(dir.path());
        let song = ContentPath::parse("song.mp3").unwrap();

        let writers: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                let song = song.clone();
                tokio::spawn(async move {
                    let author = Identity::new(format!("user{i}@x.com"));
                    store.append(&song, &author, format!("live {i}")).await
                })
            })
            .collect();
        let migration = {
            let store = store.clone();
            tokio::spawn(async move { migrate(&store).await })
        };

        for writer in writers {
            writer.await.unwrap().unwrap();
        }
        let report = migration.await.unwrap().unwrap();
        assert_eq!(report.skipped, 0);

        let thread = ThreadFile::load(&dir.path().join("song.mp3"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(thread.comments.len(), 3 + 16);
        let ids: std::collections::HashSet<_> = thread
            .comments
            .iter()
            .map(|c| c.id.clone().unwrap())
            .collect();
        assert_eq!(ids.len(), 3 + 16);
        assert_eq!(store.list_visible(&song).await.unwrap().len(), 2 + 16);
    }

    #[tokio::test]
    async fn scratch_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std_fs::write(dir.path().join("old.mp3"), LEGACY).unwrap();
        let scratch = dir.path().join(".tmp-42-0-old.mp3");
        std_fs::write(&scratch, LEGACY).unwrap();
        let torn = dir.path().join(".tmp-42-1-new.mp3");
        std_fs::write(&torn, r#"{"Comments":[{"User":"#).unwrap();
        let store = CommentStore::new(dir.path());

        let report = migrate(&store).await.unwrap();
        assert_eq!(report.scanned, 1);
        assert_eq!(report.rewritten, 1);
        assert_eq!(report.skipped, 0);
        assert_eq!(std_fs::read_to_string(&scratch).unwrap(), LEGACY);
        assert_eq!(
            std_fs::read_to_string(&torn).unwrap(),
            r#"{"Comments":[{"User":"#
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unreadable_directories_do_not_stop_the_walk() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("locked");
        std_fs::create_dir_all(dir.path().join("open")).unwrap();
        std_fs::create_dir_all(&locked).unwrap();
        std_fs::write(locked.join("old.mp3"), LEGACY).unwrap();
        std_fs::write(dir.path().join("open/old.mp3"), LEGACY).unwrap();
        std_fs::write(dir.path().join("old.mp3"), LEGACY).unwrap();
        std_fs::set_permissions(&locked, std_fs::Permissions::from_mode(0o000)).unwrap();

        // Permissions do not apply to a privileged user.
        if std_fs::read_dir(&locked).is_ok() {
            std_fs::set_permissions(&locked, std_fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let store = CommentStore::new(dir.path());
        let report = migrate(&store).await;
        std_fs::set_permissions(&locked, std_fs::Permissions::from_mode(0o755)).unwrap();

        let report = report.unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.rewritten, 2);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CommentStore::new(dir.path().join("nothing-here"));
        assert_eq!(migrate(&store).await.unwrap(), MigrationReport::default());
    }

    #[tokio::test]
    async fn up_to_date_threads_are_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let store = CommentStore::new(dir.path());
        let song = ContentPath::parse("song.mp3").unwrap();
        store
            .append(&song, &Identity::new("a@x.com"), "hi".to_owned())
            .await
            .unwrap();

        let report = migrate(&store).await.unwrap();
        assert_eq!(report.scanned, 1);
        assert_eq!(report.rewritten, 0);
    }
}

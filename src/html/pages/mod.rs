use chrono::{DateTime, Utc};

use super::*;

/// One entry of a directory listing.
pub struct ListEntry {
    pub name: String,
    pub is_dir: bool,

    /// Visible comments on this file. Always zero for directories.
    pub comments: usize,
}

/// A directory listing.
pub fn list(path: &ContentPath, entries: &[ListEntry], user: Option<&Identity>) -> Markup {
    let crumbs = breadcrumbs(path);
    let prefix = if path.is_root() {
        String::new()
    } else {
        format!("{}/", encode_path(path.as_str()))
    };

    let body = html! {
        nav.crumbs {
            a href="/files/" { "files" }
            @for crumb in &crumbs {
                @if crumb.is_last {
                    span { (crumb.name) }
                } @else {
                    a href=(crumb.url) { (crumb.name) }
                }
            }
        }
        ul.entries {
            @for entry in entries {
                li {
                    @if entry.is_dir {
                        a href={ "/files/" (prefix) (encode_path(&entry.name)) "/" } { (entry.name) "/" }
                    } @else if is_media_file(&entry.name) {
                        a href={ "/view/" (prefix) (encode_path(&entry.name)) } { (entry.name) }
                        @if entry.comments > 0 {
                            span.count { (entry.comments) " 💬" }
                        }
                    } @else {
                        a href={ "/files/" (prefix) (encode_path(&entry.name)) } { (entry.name) }
                    }
                }
            }
        }
    };

    let title = path.file_name().unwrap_or("files");
    wrappers::universal(title, user, &format!("/files/{}", path.as_str()), body)
}

/// The player page for one media file and its comments. `comments` is `None`
/// when comments are turned off.
pub fn view(
    path: &ContentPath,
    comments: Option<&[Comment]>,
    user: Option<&Identity>,
    now: DateTime<Utc>,
) -> Markup {
    let url = encode_path(path.as_str());
    let name = path.file_name().unwrap_or_default();
    let is_video = name.ends_with(".mp4") || name.ends_with(".webm");

    let body = html! {
        h1 { (name) }
        @if is_video {
            video controls src={ "/files/" (url) } {}
        } @else if is_media_file(name) {
            audio controls src={ "/files/" (url) } {}
        }
        p { a href={ "/files/" (url) } download { "Download" } }

        @if let Some(comments) = comments {
            section #comments {
                h2 { "Comments (" (comments.len()) ")" }
                @if user.is_some() {
                    form method="post" action={ "/comment/" (url) } {
                        textarea name="content" required {}
                        button type="submit" { "Post" }
                    }
                }
                @for comment in comments {
                    .comment {
                        p.meta {
                            (comment.author) " · " (comment.created.format("%Y-%m-%d %H:%M").to_string())
                            @if let (Some(user), Some(id)) = (user, &comment.id) {
                                @if comment.deletable_by(user, now) {
                                    " "
                                    button.delete data-url={ "/comment/" (url) "?id=" (id) } { "Delete" }
                                }
                            }
                        }
                        p { (comment.body) }
                    }
                }
            }
        }
        script {
            (maud::PreEscaped(r#"
document.querySelectorAll("button.delete").forEach((b) => {
  b.addEventListener("click", async () => {
    const res = await fetch(b.dataset.url, { method: "DELETE" });
    if (res.ok) location.reload(); else alert(await res.text());
  });
});
"#))
        }
    };

    wrappers::universal(name, user, &format!("/view/{}", path.as_str()), body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(author: &str, created: DateTime<Utc>) -> Comment {
        Comment {
            id: Some("0123456789abcdef".to_owned()),
            author: author.to_owned(),
            body: "<b>hi</b>".to_owned(),
            created,
            deleted: false,
        }
    }

    #[test]
    fn view_escapes_bodies_and_offers_delete_to_the_author() {
        let path = ContentPath::parse("song.mp3").unwrap();
        let now = Utc::now();
        let comments = vec![comment("a@x.com", now)];

        let page = view(&path, Some(comments.as_slice()), Some(&Identity::new("a@x.com")), now).into_string();
        assert!(page.contains("&lt;b&gt;hi&lt;/b&gt;"));
        assert!(page.contains(r#"data-url="/comment/song.mp3?id=0123456789abcdef""#));

        let page = view(&path, Some(comments.as_slice()), Some(&Identity::new("b@x.com")), now).into_string();
        assert!(!page.contains("data-url"));

        let page = view(&path, Some(comments.as_slice()), None, now).into_string();
        assert!(!page.contains("<form"));
        assert!(page.contains("/login?redirect=/view/song.mp3"));
    }

    #[test]
    fn view_without_comments_has_no_thread() {
        let path = ContentPath::parse("song.mp3").unwrap();
        let page = view(&path, None, Some(&Identity::new("a@x.com")), Utc::now()).into_string();
        assert!(!page.contains("<form"));
        assert!(!page.contains(r#"id="comments""#));
        assert!(page.contains(r#"<audio controls src="/files/song.mp3">"#));
    }

    #[test]
    fn list_links_media_to_the_player() {
        let path = ContentPath::parse("music").unwrap();
        let entries = [
            ListEntry {
                name: "live".to_owned(),
                is_dir: true,
                comments: 0,
            },
            ListEntry {
                name: "a b.mp3".to_owned(),
                is_dir: false,
                comments: 3,
            },
            ListEntry {
                name: "notes.txt".to_owned(),
                is_dir: false,
                comments: 0,
            },
        ];

        let page = list(&path, &entries, None).into_string();
        assert!(page.contains(r#"href="/files/music/live/""#));
        assert!(page.contains(r#"href="/view/music/a%20b.mp3""#));
        assert!(page.contains("3 💬"));
        assert!(page.contains(r#"href="/files/music/notes.txt""#));
    }
}

use maud::{html, Markup};
use reqwest::Url;

use crate::data::*;
use crate::session::Identity;

pub mod pages;
mod wrappers;

/// A link in the trail above a listing.
#[derive(Debug, PartialEq, Eq)]
pub struct Breadcrumb {
    pub name: String,
    pub url: String,
    pub is_last: bool,
}

/// The trail of parent directories leading to `path`.
pub fn breadcrumbs(path: &ContentPath) -> Vec<Breadcrumb> {
    let segments: Vec<&str> = path.segments().collect();
    segments
        .iter()
        .enumerate()
        .map(|(i, name)| Breadcrumb {
            name: (*name).to_owned(),
            url: format!("/files/{}/", encode_path(&segments[..=i].join("/"))),
            is_last: i == segments.len() - 1,
        })
        .collect()
}

/// Percent-encode each segment of a `/`-separated path for use in a URL. A
/// leading `/` is kept.
pub fn encode_path(path: &str) -> String {
    let (lead, rest) = match path.strip_prefix('/') {
        Some(rest) => ("/", rest),
        None => ("", path),
    };

    let mut url = match Url::parse("http://localhost/") {
        Ok(url) => url,
        Err(_) => return path.to_owned(),
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.clear().extend(rest.split('/'));
    }

    let encoded = url.path();
    format!("{lead}{}", encoded.strip_prefix('/').unwrap_or(encoded))
}

const MEDIA_EXTENSIONS: [&str; 5] = [".mp4", ".mp3", ".ogg", ".webm", ".m4a"];

pub fn is_media_file(name: &str) -> bool {
    MEDIA_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

/// The content type a file is served with, based on its extension.
pub fn media_type(name: &str) -> String {
    match MEDIA_EXTENSIONS.iter().find(|ext| name.ends_with(*ext)) {
        Some(&".m4a") => "audio/aac".to_owned(),
        Some(ext) => format!("audio/{}", ext.trim_start_matches('.')),
        None => "application/octet-stream".to_owned(),
    }
}

use std::{collections::HashSet, path::PathBuf};

use clap::{Args, Parser};

use crate::session::Identity;

/// A small media and file browser with per-file comments.
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Config {
    /// Port to serve on.
    #[arg(long, env = "PORT", default_value_t = 7001)]
    pub port: u16,

    /// Directory to serve files from.
    #[arg(long, default_value = ".")]
    pub data: PathBuf,

    /// Shadow directory holding the comments for each served file. An empty
    /// value turns comments off.
    #[arg(long, default_value = ".comments")]
    pub comments: String,

    /// Comma-separated emails that may sign in. Empty means nobody.
    #[arg(long, env = "ALLOWED_EMAILS", default_value = "")]
    pub allowed_emails: String,

    #[command(flatten)]
    pub oauth: OAuthConfig,
}

impl Config {
    /// Where comment threads live, or `None` when comments are disabled.
    pub fn comments_root(&self) -> Option<PathBuf> {
        (!self.comments.is_empty()).then(|| PathBuf::from(&self.comments))
    }
}

/// Google OAuth client settings.
#[derive(Args, Debug, Clone, Default)]
pub struct OAuthConfig {
    #[arg(long, env = "GOOGLE_CLIENT_ID", default_value = "", hide_env_values = true)]
    pub client_id: String,

    #[arg(long, env = "GOOGLE_CLIENT_SECRET", default_value = "", hide_env_values = true)]
    pub client_secret: String,

    #[arg(long, env = "GOOGLE_REDIRECT_URL", default_value = "")]
    pub redirect_url: String,
}

/// The identities permitted to hold a session.
#[derive(Debug, Clone, Default)]
pub struct AllowList(HashSet<String>);

impl AllowList {
    pub fn parse(list: &str) -> Self {
        AllowList(
            list.split(',')
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    }

    pub fn allows(&self, identity: &Identity) -> bool {
        self.0.contains(identity.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Hide most of a secret for logging.
pub fn redact(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "***".to_owned();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}***{tail}")
}

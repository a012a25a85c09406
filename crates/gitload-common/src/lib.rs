pub mod token;

pub use token::Token;

pub type Result<T> = core::result::Result<T, GitloadError>;

#[derive(thiserror::Error, Debug)]
pub enum GitloadError {
    #[error("failed to encode request body: {0}")]
    Encode(String),
    #[error("{url}: {message}")]
    Transport { url: String, message: String },
    #[error("HTTP {status} response to {url}.\n{body}")]
    Status { url: String, status: String, body: String },
    #[error("error parsing response body: {message}\n{body}")]
    Decode { message: String, body: String },
    #[error("GITHUB_TOKEN must be set")]
    MissingToken,
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("git {command} failed: {message}")]
    Git { command: String, message: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Message(String),
}

impl GitloadError {
    /// Short stable label for logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            GitloadError::Encode(_) => "encode",
            GitloadError::Transport { .. } => "transport",
            GitloadError::Status { .. } => "status",
            GitloadError::Decode { .. } => "decode",
            GitloadError::MissingToken => "missing_token",
            GitloadError::Config(_) => "config",
            GitloadError::Git { .. } => "git",
            GitloadError::Io(_) => "io",
            GitloadError::Message(_) => "message",
        }
    }
}

pub mod config {
    use serde::Deserialize;
    use std::env;

    use crate::{GitloadError, Result};

    pub const DEFAULT_API_URL: &str = "https://api.github.com";
    pub const DEFAULT_API_VERSION: &str = "2022-11-28";

    /// Settings for the blob/tree/commit publisher.
    #[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
    #[serde(default)]
    pub struct PublisherConfig {
        pub api_url: String,
        pub owner: String,
        pub repo: String,
        pub api_version: String,
        pub object_count: usize,
        pub batch_size: usize,
        pub max_in_flight: usize,
        pub commit_message: String,
        pub timeout_secs: u64,
    }

    impl Default for PublisherConfig {
        fn default() -> Self {
            Self {
                api_url: DEFAULT_API_URL.into(),
                owner: "spraints".into(),
                repo: "silver-eureka".into(),
                api_version: DEFAULT_API_VERSION.into(),
                object_count: 100,
                batch_size: 10,
                max_in_flight: 32,
                commit_message: "post-lots".into(),
                timeout_secs: 30,
            }
        }
    }

    impl PublisherConfig {
        pub fn load() -> Result<Self> {
            if let Ok(path) = env::var("GITLOAD_CONFIG") {
                return Self::from_yaml_file(&path);
            }
            Ok(Self::default().overlay_env(|key| env::var(key).ok()))
        }

        pub fn from_yaml_file(path: &str) -> Result<Self> {
            let text = std::fs::read_to_string(path)?;
            serde_yaml::from_str(&text)
                .map_err(|e| GitloadError::Config(format!("{}: {}", path, e)))
        }

        /// Overlays `GITLOAD_*` values fetched through `get`. Unparseable
        /// numbers are ignored and keep the current value.
        pub fn overlay_env<F>(mut self, get: F) -> Self
        where
            F: Fn(&str) -> Option<String>,
        {
            if let Some(v) = get("GITLOAD_API_URL") { self.api_url = v; }
            if let Some(v) = get("GITLOAD_OWNER") { self.owner = v; }
            if let Some(v) = get("GITLOAD_REPO") { self.repo = v; }
            if let Some(v) = get("GITLOAD_API_VERSION") { self.api_version = v; }
            if let Some(v) = get("GITLOAD_COMMIT_MESSAGE") { self.commit_message = v; }
            if let Some(v) = get("GITLOAD_OBJECT_COUNT").and_then(|v| v.parse().ok()) { self.object_count = v; }
            if let Some(v) = get("GITLOAD_BATCH_SIZE").and_then(|v| v.parse().ok()) { self.batch_size = v; }
            if let Some(v) = get("GITLOAD_MAX_IN_FLIGHT").and_then(|v| v.parse().ok()) { self.max_in_flight = v; }
            if let Some(v) = get("GITLOAD_TIMEOUT_SECS").and_then(|v| v.parse().ok()) { self.timeout_secs = v; }
            self
        }

        pub fn validate(&self) -> Result<()> {
            if self.batch_size == 0 {
                return Err(GitloadError::Config("batch_size must be at least 1".into()));
            }
            if self.max_in_flight == 0 {
                return Err(GitloadError::Config("max_in_flight must be at least 1".into()));
            }
            if self.timeout_secs == 0 {
                return Err(GitloadError::Config("timeout_secs must be at least 1".into()));
            }
            if self.owner.is_empty() || self.repo.is_empty() {
                return Err(GitloadError::Config("owner and repo must not be empty".into()));
            }
            if self.owner.contains('/') || self.repo.contains('/') {
                return Err(GitloadError::Config(format!(
                    "owner and repo must not contain '/', got {}/{}",
                    self.owner, self.repo
                )));
            }
            Ok(())
        }

        /// `<api_url>/repos/<owner>/<repo>/git`
        pub fn git_data_url(&self) -> String {
            format!(
                "{}/repos/{}/{}/git",
                self.api_url.trim_end_matches('/'),
                self.owner,
                self.repo
            )
        }
    }

    pub const DEFAULT_TICK_URL: &str = "https://github.com/spraints/silver-eureka";
    pub const REVIEW_LAB_TICK_URL: &str = "https://spraints.review-lab.github.com/spraints/silver-eureka";
    pub const GARAGE_TICK_URL: &str = "https://garage.github.com/spraints/silver-eureka";

    /// Settings for the clone/commit/push workflow.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct TickConfig {
        pub url: String,
        pub branch: String,
        pub user: String,
        pub show_progress: bool,
        pub verbose: bool,
    }

    impl Default for TickConfig {
        fn default() -> Self {
            Self {
                url: DEFAULT_TICK_URL.into(),
                branch: "testing-123".into(),
                user: "spraints".into(),
                show_progress: false,
                verbose: false,
            }
        }
    }

}

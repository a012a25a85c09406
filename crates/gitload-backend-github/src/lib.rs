//! `GitDataApi` over GitHub's REST endpoints.

use std::time::Duration;

use gitload_backend::{CommitRecord, GitDataApi, Oid, TreeEntry};
use gitload_common::config::PublisherConfig;
use gitload_common::{GitloadError, Result, Token};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

const API_VERSION_HEADER: &str = "x-github-api-version";

#[derive(Clone)]
pub struct GitHubApi {
    client: reqwest::Client,
    base_url: String,
    token: Token,
}

#[derive(Serialize)]
struct CreateBlob<'a> { content: &'a str }

#[derive(Serialize)]
struct CreateTree<'a> { tree: &'a [TreeEntry] }

#[derive(Serialize)]
struct CreateCommit<'a> { message: &'a str, tree: &'a Oid }

#[derive(Deserialize)]
struct Created { sha: Oid }

impl GitHubApi {
    pub fn new(config: &PublisherConfig, token: Token) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let version = HeaderValue::from_str(&config.api_version)
            .map_err(|e| GitloadError::Config(format!("api_version: {}", e)))?;
        headers.insert(API_VERSION_HEADER, version);

        let client = reqwest::Client::builder()
            .user_agent(concat!("gitload/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GitloadError::Message(format!("building http client: {}", e)))?;

        Ok(Self { client, base_url: config.git_data_url(), token })
    }

    pub fn base_url(&self) -> &str { &self.base_url }

    async fn post<B, R>(&self, endpoint: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, endpoint);
        let payload = serde_json::to_vec(body).map_err(|e| GitloadError::Encode(e.to_string()))?;

        let resp = self
            .client
            .post(&url)
            .bearer_auth(self.token.expose())
            .body(payload)
            .send()
            .await
            .map_err(|e| transport(&url, e))?;

        let status = resp.status();
        let data = resp.bytes().await.map_err(|e| transport(&url, e))?;
        debug!(%url, %status, bytes = data.len(), "api response");

        if status != StatusCode::CREATED {
            return Err(GitloadError::Status {
                url,
                status: status.to_string(),
                body: String::from_utf8_lossy(&data).into_owned(),
            });
        }

        serde_json::from_slice(&data).map_err(|e| GitloadError::Decode {
            message: e.to_string(),
            body: String::from_utf8_lossy(&data).into_owned(),
        })
    }
}

fn transport(url: &str, err: reqwest::Error) -> GitloadError {
    GitloadError::Transport { url: url.to_string(), message: err.to_string() }
}

#[async_trait::async_trait]
impl GitDataApi for GitHubApi {
    async fn create_blob(&self, content: &str) -> Result<Oid> {
        let created: Created = self.post("blobs", &CreateBlob { content }).await?;
        Ok(created.sha)
    }

    async fn create_tree(&self, entries: &[TreeEntry]) -> Result<Oid> {
        let created: Created = self.post("trees", &CreateTree { tree: entries }).await?;
        Ok(created.sha)
    }

    async fn create_commit(&self, message: &str, tree: &Oid) -> Result<CommitRecord> {
        self.post("commits", &CreateCommit { message, tree }).await
    }
}

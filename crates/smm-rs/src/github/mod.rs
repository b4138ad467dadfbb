//! Minimal GitHub releases client.

use crate::{USER_AGENT, utils::ResultExt};
use reqwest::{
    Client, ClientBuilder,
    header::{self, HeaderMap, HeaderValue},
};
use serde::Deserialize;
use url::Url;

mod download_asset;
mod latest_release;

/// Owner of the SMAPI repository.
pub const SMAPI_REPO_OWNER: &str = "Pathoschild";
/// Name of the SMAPI repository.
pub const SMAPI_REPO_NAME: &str = "SMAPI";

const GITHUB_API_URL: &str = "https://api.github.com/";
/// Some mirrors in front of release assets reject unknown agents.
const DOWNLOAD_USER_AGENT: &str = "Mozilla/4.0 (compatible; MSIE 6.0; Windows NT 5.2; .NET CLR 1.0.3705;)";

#[derive(Debug, thiserror::Error)]
pub enum GitHubError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("access token is not a valid header value")]
    InvalidToken,
    #[error("download cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: Url,
}

#[derive(Debug, Clone)]
pub struct GitHubClient {
    api_url: Url,
    api: Client,
    download: Client,
}

impl GitHubClient {
    /// A client for the public GitHub API, authenticating with `token` if given.
    pub fn new(token: Option<&str>) -> Result<Self, GitHubError> {
        Self::with_api_url(Url::parse(GITHUB_API_URL).infallible(), token)
    }

    /// A client talking to a GitHub compatible API at `api_url`.
    pub fn with_api_url(mut api_url: Url, token: Option<&str>) -> Result<Self, GitHubError> {
        if !api_url.path().ends_with('/') {
            let path = format!("{}/", api_url.path());
            api_url.set_path(&path);
        }

        let mut auth = HeaderMap::new();
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| GitHubError::InvalidToken)?;
            value.set_sensitive(true);
            auth.insert(header::AUTHORIZATION, value);
        }

        let mut api_headers = auth.clone();
        api_headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        let api = ClientBuilder::default()
            .user_agent(*USER_AGENT)
            .default_headers(api_headers)
            .use_rustls_tls()
            .build()
            .inspect_err(|e| error!("Failed to initialize client: {e}"))?;

        let mut download_headers = auth;
        download_headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/octet-stream"),
        );
        let download = ClientBuilder::default()
            .user_agent(DOWNLOAD_USER_AGENT)
            .default_headers(download_headers)
            .use_rustls_tls()
            .build()
            .inspect_err(|e| error!("Failed to initialize download client: {e}"))?;

        Ok(Self {
            api_url,
            api,
            download,
        })
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }
}

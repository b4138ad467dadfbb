use super::{GitHubClient, GitHubError, Release};
use crate::utils::ResultExt;
use reqwest::StatusCode;

impl GitHubClient {
    /// Fetches the latest published release of `owner/repo`.
    ///
    /// `Ok(None)` means the repository has no release; any other failure,
    /// including rate limiting, is an error.
    #[instrument(skip(self), level = "debug")]
    pub async fn latest_release(&self, owner: &str, repo: &str) -> Result<Option<Release>, GitHubError> {
        let url = self
            .api_url
            .join(&format!("repos/{owner}/{repo}/releases/latest"))
            .infallible();

        let res = self
            .api
            .get(url)
            .send()
            .await
            .inspect_err(|e| error!("release lookup failed: {e}"))?;
        if res.status() == StatusCode::NOT_FOUND {
            info!("no release published for {owner}/{repo}");
            return Ok(None);
        }

        let release: Release = res
            .error_for_status()
            .inspect_err(|e| error!("release lookup rejected: {e}"))?
            .json()
            .await?;
        info!("latest release of {owner}/{repo} is {}", release.tag_name);
        Ok(Some(release))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path},
    };

    async fn client_for(server: &MockServer, token: Option<&str>) -> GitHubClient {
        GitHubClient::with_api_url(Url::parse(&server.uri()).unwrap(), token).unwrap()
    }

    #[tokio::test]
    async fn test_latest_release() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/Pathoschild/SMAPI/releases/latest"))
            .and(header("authorization", "Bearer secret"))
            .and(header("accept", "application/vnd.github+json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tag_name": "4.1.0",
                "assets": [
                    { "name": "readme.txt", "browser_download_url": "https://example.com/readme.txt" },
                    { "name": "SMAPI-4.1.0-installer.zip", "browser_download_url": "https://example.com/SMAPI-4.1.0-installer.zip" }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let release = client_for(&server, Some("secret"))
            .await
            .latest_release("Pathoschild", "SMAPI")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(release.tag_name, "4.1.0");
        assert_eq!(release.assets.len(), 2);
    }

    #[tokio::test]
    async fn test_not_found_is_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let release = client_for(&server, None)
            .await
            .latest_release("Pathoschild", "SMAPI")
            .await
            .unwrap();
        assert_eq!(release, None);
    }

    #[tokio::test]
    async fn test_rate_limit_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let res = client_for(&server, None)
            .await
            .latest_release("Pathoschild", "SMAPI")
            .await;
        assert!(matches!(res, Err(GitHubError::Http(_))));
    }
}

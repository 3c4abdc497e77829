use std::collections::BTreeSet;
use std::time::Duration;

use log::warn;
use reqwest::Client;
use url::Url;

use crate::auth::AccessKey;
use crate::error::{RemedyLensError, Result};

use super::types::{Build, BuildModelName};

const MAX_RETRIES: u32 = 30;
const RETRY_DELAY_SECONDS: u64 = 10;

/// REST client for the Develocity builds API.
///
/// Retries transparently on rate limiting (429), server errors and transient
/// network failures; every other failure surfaces to the caller unmodified.
pub struct DevelocityClient {
    client: Client,
    api_url: Url,
    access_key: Option<AccessKey>,
}

impl DevelocityClient {
    /// Creates a client for the given Develocity server.
    ///
    /// # Errors
    ///
    /// Returns an error if the server URL is invalid or the HTTP client
    /// cannot be constructed.
    pub fn new(base_url: &str, access_key: Option<AccessKey>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("remedylens/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RemedyLensError::Config(format!("Failed to create HTTP client: {e}")))?;

        let api_url = Url::parse(base_url)
            .map_err(|e| RemedyLensError::Config(format!("Invalid server URL: {e}")))?
            .join("api/")
            .map_err(|e| RemedyLensError::Config(format!("Invalid API base URL: {e}")))?;

        Ok(Self {
            client,
            api_url,
            access_key,
        })
    }

    fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(key) = &self.access_key {
            request.bearer_auth(key.as_str())
        } else {
            request
        }
    }

    /// Lists builds most-recent-first, optionally populated with models.
    ///
    /// `from_build` is the pagination cursor: only builds strictly older than
    /// the given id are returned.
    pub async fn list_builds(
        &self,
        query: Option<&str>,
        max_builds: usize,
        models: Option<&BTreeSet<BuildModelName>>,
        from_build: Option<&str>,
    ) -> Result<Vec<Build>> {
        let mut url = self
            .api_url
            .join("builds")
            .map_err(|e| RemedyLensError::Config(format!("Invalid builds URL: {e}")))?;

        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("maxBuilds", &max_builds.to_string());
            pairs.append_pair("reverse", "true");
            if let Some(query) = query {
                pairs.append_pair("query", query);
            }
            if let Some(from_build) = from_build {
                pairs.append_pair("fromBuild", from_build);
            }
            if let Some(models) = models {
                for model in models {
                    pairs.append_pair("models", model.as_query_param());
                }
            }
        }

        self.execute_request(url).await
    }

    /// Fetches a single build populated with the given models.
    pub async fn get_build(
        &self,
        id: &str,
        models: &BTreeSet<BuildModelName>,
    ) -> Result<Build> {
        let mut url = self
            .api_url
            .join(&format!("builds/{id}"))
            .map_err(|e| RemedyLensError::Config(format!("Invalid build URL: {e}")))?;

        {
            let mut pairs = url.query_pairs_mut();
            for model in models {
                pairs.append_pair("models", model.as_query_param());
            }
        }

        self.execute_request(url).await
    }

    /// Execute a GET request with automatic retry on network errors and rate limits.
    async fn execute_request<T>(&self, url: Url) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut retry_count = 0;
        loop {
            let request = self.auth_request(self.client.get(url.clone()));

            let response = match request.send().await {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() || e.is_request() => {
                    if retry_count >= MAX_RETRIES {
                        return Err(e.into());
                    }
                    warn!(
                        "Network error ({}), retrying in {}s ({}/{})...",
                        e,
                        RETRY_DELAY_SECONDS,
                        retry_count + 1,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(Duration::from_secs(RETRY_DELAY_SECONDS)).await;
                    retry_count += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();

            if status == 429 || status.is_server_error() {
                if retry_count >= MAX_RETRIES {
                    return Err(RemedyLensError::ApiErrorAfterRetries {
                        status: status.as_u16(),
                        retries: MAX_RETRIES,
                    });
                }

                warn!(
                    "Develocity API error (status {status}). Waiting {RETRY_DELAY_SECONDS} seconds before retry {}/{}...",
                    retry_count + 1,
                    MAX_RETRIES
                );

                tokio::time::sleep(Duration::from_secs(RETRY_DELAY_SECONDS)).await;
                retry_count += 1;
                continue;
            }

            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unable to read error response".to_string());
                return Err(RemedyLensError::Api {
                    status: status.as_u16(),
                    message: error_text,
                });
            }

            return Ok(response.json().await?);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::develocity::types::attribute_models;

    #[tokio::test]
    async fn test_list_builds_sends_expected_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/builds")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("maxBuilds".into(), "2".into()),
                mockito::Matcher::UrlEncoded("reverse".into(), "true".into()),
                mockito::Matcher::UrlEncoded("fromBuild".into(), "abc".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{"id":"b2","availableAt":2000,"buildToolType":"gradle"},
                    {"id":"b1","availableAt":1000,"buildToolType":"maven"}]"#,
            )
            .create_async()
            .await;

        let client = DevelocityClient::new(&server.url(), None).unwrap();
        let builds = client
            .list_builds(None, 2, None, Some("abc"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(builds.len(), 2);
        assert_eq!(builds[0].id, "b2");
        assert_eq!(builds[1].build_tool_type, "maven");
    }

    #[tokio::test]
    async fn test_get_build_requests_models() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/builds/b1")
            .match_query(mockito::Matcher::UrlEncoded(
                "models".into(),
                "gradle-attributes".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"b1","availableAt":1000,"buildToolType":"gradle"}"#)
            .create_async()
            .await;

        let client = DevelocityClient::new(&server.url(), None).unwrap();
        let build = client.get_build("b1", &attribute_models()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(build.id, "b1");
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/builds")
            .match_query(mockito::Matcher::Any)
            .with_status(401)
            .with_body("unauthorized")
            .expect(1)
            .create_async()
            .await;

        let client = DevelocityClient::new(&server.url(), None).unwrap();
        let result = client.list_builds(None, 10, None, None).await;

        mock.assert_async().await;
        assert!(matches!(
            result,
            Err(RemedyLensError::Api { status: 401, .. })
        ));
    }

    #[test]
    fn test_invalid_server_url_is_a_config_error() {
        let result = DevelocityClient::new("not a url", None);
        assert!(matches!(result, Err(RemedyLensError::Config(_))));
    }
}

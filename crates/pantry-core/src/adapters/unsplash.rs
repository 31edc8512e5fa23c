use std::sync::Arc;

use serde::Deserialize;

use crate::adapters::{classify_status, AdapterFuture, ImageSource, ProviderFailure};
use crate::http_client::{HttpAuth, HttpClient, HttpRequest};
use crate::ProviderId;

const UNSPLASH_BASE_URL: &str = "https://api.unsplash.com";

/// Media provider used to attach a photo to a synthesized recipe.
#[derive(Clone)]
pub struct UnsplashAdapter {
    http_client: Arc<dyn HttpClient>,
    access_key: String,
    base_url: String,
    timeout_ms: u64,
}

impl UnsplashAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, access_key: impl Into<String>) -> Self {
        Self {
            http_client,
            access_key: access_key.into(),
            base_url: UNSPLASH_BASE_URL.to_owned(),
            timeout_ms: 5_000,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    async fn search_photo(&self, query: &str) -> Result<Option<String>, ProviderFailure> {
        let provider = ProviderId::Unsplash;
        let url = format!(
            "{}/search/photos?query={}&per_page=1&orientation=landscape",
            self.base_url,
            urlencoding::encode(query)
        );
        let request = HttpRequest::get(url)
            .with_header("accept-version", "v1")
            .with_auth(&HttpAuth::ClientId(self.access_key.clone()))
            .with_timeout_ms(self.timeout_ms);

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| ProviderFailure::from_transport(provider, &e))?;

        if !response.is_success() {
            return Err(classify_unsplash_status(response.status, &response.body));
        }

        let page: PhotoSearchResponse = serde_json::from_str(&response.body).map_err(|e| {
            ProviderFailure::malformed(provider, format!("failed to parse unsplash response: {e}"))
        })?;

        Ok(page
            .results
            .into_iter()
            .find_map(|photo| photo.urls.regular.or(photo.urls.small)))
    }
}

impl ImageSource for UnsplashAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Unsplash
    }

    fn lookup<'a>(&'a self, query: &'a str) -> AdapterFuture<'a, Option<String>> {
        Box::pin(self.search_photo(query))
    }
}

/// Unsplash answers an exhausted hourly allowance with 403 "Rate Limit
/// Exceeded" (or 429 behind some proxies).
fn classify_unsplash_status(status: u16, body: &str) -> ProviderFailure {
    if status == 403 && body.to_ascii_lowercase().contains("rate limit") {
        return ProviderFailure::quota_exceeded(
            ProviderId::Unsplash,
            "unsplash hourly rate limit exceeded",
        );
    }
    classify_status(ProviderId::Unsplash, status, body)
}

#[derive(Debug, Default, Deserialize)]
struct PhotoSearchResponse {
    #[serde(default)]
    results: Vec<Photo>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    #[serde(default)]
    urls: PhotoUrls,
}

#[derive(Debug, Default, Deserialize)]
struct PhotoUrls {
    #[serde(default)]
    regular: Option<String>,
    #[serde(default)]
    small: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::FailureKind;
    use crate::http_client::testing::ScriptedHttpClient;
    use crate::http_client::HttpResponse;

    fn adapter(client: Arc<ScriptedHttpClient>) -> UnsplashAdapter {
        UnsplashAdapter::new(client, "access-1").with_base_url("https://unsplash.test")
    }

    #[tokio::test]
    async fn returns_first_regular_url() {
        let client = Arc::new(ScriptedHttpClient::new([Ok(HttpResponse::ok_json(
            r#"{"total":2,"results":[{"urls":{"regular":"https://images.test/a.jpg","small":"https://images.test/a-s.jpg"}},{"urls":{"regular":"https://images.test/b.jpg"}}]}"#,
        ))]));

        let url = adapter(Arc::clone(&client))
            .lookup("Egg Crepes")
            .await
            .expect("lookup should succeed");

        assert_eq!(url.as_deref(), Some("https://images.test/a.jpg"));
        let requests = client.recorded_requests();
        assert_eq!(
            requests[0].url,
            "https://unsplash.test/search/photos?query=Egg%20Crepes&per_page=1&orientation=landscape"
        );
        assert_eq!(
            requests[0].headers.get("authorization").map(String::as_str),
            Some("Client-ID access-1")
        );
    }

    #[tokio::test]
    async fn empty_results_are_not_an_error() {
        let client = Arc::new(ScriptedHttpClient::new([Ok(HttpResponse::ok_json(
            r#"{"total":0,"results":[]}"#,
        ))]));

        let url = adapter(client).lookup("nothing").await.expect("lookup ok");

        assert_eq!(url, None);
    }

    #[tokio::test]
    async fn rate_limit_403_is_quota_exceeded() {
        let client = Arc::new(ScriptedHttpClient::new([
            Ok(HttpResponse::new(403, "Rate Limit Exceeded")),
            Ok(HttpResponse::new(403, "Forbidden")),
        ]));
        let adapter = adapter(client);

        let limited = adapter.lookup("soup").await.expect_err("must fail");
        let forbidden = adapter.lookup("soup").await.expect_err("must fail");

        assert_eq!(limited.kind(), FailureKind::QuotaExceeded);
        assert_eq!(forbidden.kind(), FailureKind::Transient);
    }
}

//! HTTP client for the Google Business Profile API.
//!
//! Pages through list endpoints with `pageToken` and maps HTTP failures into
//! the structured [`ProviderError`] taxonomy.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::models::gmb_account::Model as GmbAccount;
use crate::provider::types::{LocationsPage, QuestionsPage, ReviewsPage};
use crate::provider::{LocationRaw, ProviderApi, ProviderError, QuestionRaw, ReviewRaw, TokenResolver};

/// Hard cap on pagination to guard against a provider that keeps returning
/// the same `nextPageToken`.
const MAX_PAGES: usize = 100;

/// Google Business Profile API client.
pub struct GbpClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenResolver>,
}

impl GbpClient {
    /// Build a client from application configuration.
    pub fn from_config(
        config: &AppConfig,
        tokens: Arc<dyn TokenResolver>,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.provider_timeout_ms))
            .user_agent("gbp-sync/0.1")
            .build()
            .map_err(|e| ProviderError::Unavailable {
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            base_url: config.provider_api_base.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    /// Build a client against an explicit base URL, mainly for tests.
    pub fn new(base_url: &str, timeout: Duration, tokens: Arc<dyn TokenResolver>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(timeout)
                .user_agent("gbp-sync/0.1")
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    /// Fetch one page of a list endpoint and decode it as `P`.
    async fn get_page<P: DeserializeOwned>(
        &self,
        account: &GmbAccount,
        path: &str,
        page_token: Option<&str>,
    ) -> Result<P, ProviderError> {
        let token = self.tokens.access_token(account).await?;
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));

        let mut request = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", token))
            .header("Accept", "application/json");

        if let Some(page_token) = page_token {
            request = request.query(&[("pageToken", page_token)]);
        }

        let response = request.send().await.map_err(|e| {
            warn!(url = %url, error = %e, "provider request failed");
            ProviderError::Unavailable {
                reason: format!("request to {} failed: {}", url, e),
            }
        })?;

        let status = response.status();
        if status == 401 || status == 403 {
            return Err(ProviderError::AuthExpired {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Unavailable {
                reason: format!("HTTP {} from {}: {}", status.as_u16(), url, body),
            });
        }

        response
            .json::<P>()
            .await
            .map_err(|e| ProviderError::Malformed {
                details: format!("failed to decode response from {}: {}", url, e),
            })
    }

    /// Drain every page of a list endpoint, collecting items with `extract`.
    async fn collect_pages<P, T, F>(
        &self,
        account: &GmbAccount,
        path: &str,
        extract: F,
    ) -> Result<Vec<T>, ProviderError>
    where
        P: DeserializeOwned,
        F: Fn(P) -> (Vec<T>, Option<String>),
    {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        for page_number in 0..MAX_PAGES {
            let page: P = self.get_page(account, path, page_token.as_deref()).await?;
            let (mut batch, next) = extract(page);

            debug!(
                path,
                page_number,
                items = batch.len(),
                has_more = next.is_some(),
                "fetched provider page"
            );
            items.append(&mut batch);

            match next {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => return Ok(items),
            }
        }

        Err(ProviderError::Malformed {
            details: format!("pagination did not terminate after {} pages of {}", MAX_PAGES, path),
        })
    }
}

#[async_trait]
impl ProviderApi for GbpClient {
    async fn fetch_locations(
        &self,
        account: &GmbAccount,
    ) -> Result<Vec<LocationRaw>, ProviderError> {
        let path = format!("accounts/{}/locations", account.google_account_id);
        self.collect_pages(account, &path, |page: LocationsPage| {
            (page.locations, page.next_page_token)
        })
        .await
    }

    async fn fetch_reviews(
        &self,
        account: &GmbAccount,
        location_resource: &str,
    ) -> Result<Vec<ReviewRaw>, ProviderError> {
        let path = format!("{}/reviews", location_resource.trim_matches('/'));
        self.collect_pages(account, &path, |page: ReviewsPage| {
            (page.reviews, page.next_page_token)
        })
        .await
    }

    async fn fetch_questions(
        &self,
        account: &GmbAccount,
        location_resource: &str,
    ) -> Result<Vec<QuestionRaw>, ProviderError> {
        let path = format!("{}/questions", location_resource.trim_matches('/'));
        self.collect_pages(account, &path, |page: QuestionsPage| {
            (page.questions, page.next_page_token)
        })
        .await
    }
}

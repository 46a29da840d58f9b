//! Provider adapter for the Google Business Profile API.
//!
//! Defines the interface the orchestrator uses to fetch remote business data,
//! plus the structured error taxonomy that drives retry and failure handling
//! downstream.

pub mod client;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::gmb_account::Model as GmbAccount;

pub use client::GbpClient;
pub use types::{LocationRaw, QuestionRaw, ReviewRaw};

/// Structured provider failures.
///
/// The orchestrator treats `AuthExpired` and `Malformed` as fatal for the
/// current run; `Unavailable` is surfaced to the queue for a later retry.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Upstream rejected our credentials (401/403).
    #[error("provider credentials rejected (HTTP {status})")]
    AuthExpired { status: u16 },

    /// Upstream is unreachable or returned a non-success status.
    #[error("provider unavailable: {reason}")]
    Unavailable { reason: String },

    /// Upstream answered but the payload could not be decoded.
    #[error("malformed provider response: {details}")]
    Malformed { details: String },
}

impl ProviderError {
    /// Whether a later attempt could plausibly succeed without operator action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Unavailable { .. })
    }
}

/// Read-only access to the remote business profile data for one account.
///
/// Implementations page through the upstream API internally and return the
/// complete result set; callers never see pagination state.
#[async_trait]
pub trait ProviderApi: Send + Sync {
    /// Fetch all locations owned by the account.
    async fn fetch_locations(&self, account: &GmbAccount)
    -> Result<Vec<LocationRaw>, ProviderError>;

    /// Fetch all reviews under the given location resource name.
    async fn fetch_reviews(
        &self,
        account: &GmbAccount,
        location_resource: &str,
    ) -> Result<Vec<ReviewRaw>, ProviderError>;

    /// Fetch all questions under the given location resource name.
    async fn fetch_questions(
        &self,
        account: &GmbAccount,
        location_resource: &str,
    ) -> Result<Vec<QuestionRaw>, ProviderError>;
}

/// Source of bearer tokens for outbound provider calls.
///
/// Kept behind a trait so deployments can plug in a real OAuth refresh flow
/// without touching the HTTP client.
#[async_trait]
pub trait TokenResolver: Send + Sync {
    async fn access_token(&self, account: &GmbAccount) -> Result<String, ProviderError>;
}

/// Token resolver backed by a single preconfigured token.
pub struct StaticTokenResolver {
    token: Option<String>,
}

impl StaticTokenResolver {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenResolver for StaticTokenResolver {
    async fn access_token(&self, _account: &GmbAccount) -> Result<String, ProviderError> {
        self.token
            .clone()
            .ok_or_else(|| ProviderError::AuthExpired { status: 401 })
    }
}

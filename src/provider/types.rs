//! Wire types for the Google Business Profile API.
//!
//! These mirror the upstream JSON shapes closely; normalization into local
//! records happens in `crate::normalization`, not here.

use serde::Deserialize;
use serde_json::Value as JsonValue;

/// Latitude/longitude pair as returned by the API.
///
/// Coordinates occasionally arrive as strings rather than numbers, so both
/// encodings are accepted here and parsed during normalization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LatLngRaw {
    pub latitude: Option<JsonValue>,
    pub longitude: Option<JsonValue>,
}

/// Postal address fragment attached to a location.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostalAddressRaw {
    #[serde(default)]
    pub address_lines: Vec<String>,
    pub locality: Option<String>,
    pub administrative_area: Option<String>,
}

/// Primary category descriptor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRaw {
    pub display_name: Option<String>,
}

/// Phone number set attached to a location.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneNumbersRaw {
    pub primary_phone: Option<String>,
}

/// One location as returned by the locations endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRaw {
    /// Full resource name, e.g. `accounts/123/locations/456`.
    pub name: Option<String>,
    pub title: Option<String>,
    pub primary_category: Option<CategoryRaw>,
    pub storefront_address: Option<PostalAddressRaw>,
    pub phone_numbers: Option<PhoneNumbersRaw>,
    pub website_uri: Option<String>,
    pub latlng: Option<LatLngRaw>,
    pub average_rating: Option<f64>,
    pub review_count: Option<i64>,
    /// Opaque provider metadata carried through verbatim.
    pub metadata: Option<JsonValue>,
}

/// Review author descriptor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewerRaw {
    pub display_name: Option<String>,
    pub profile_photo_url: Option<String>,
}

/// Owner reply attached to a review.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewReplyRaw {
    pub comment: Option<String>,
    pub update_time: Option<String>,
}

/// One review as returned by the reviews endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRaw {
    pub review_id: Option<String>,
    /// Full resource name, e.g. `accounts/1/locations/2/reviews/3`.
    pub name: Option<String>,
    pub reviewer: Option<ReviewerRaw>,
    /// Symbolic star rating: `STAR_ONE` through `STAR_FIVE`.
    pub star_rating: Option<String>,
    pub comment: Option<String>,
    pub create_time: Option<String>,
    pub update_time: Option<String>,
    pub review_reply: Option<ReviewReplyRaw>,
}

/// Question or answer author descriptor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionAuthorRaw {
    pub display_name: Option<String>,
    pub profile_photo_url: Option<String>,
    #[serde(rename = "type")]
    pub author_type: Option<String>,
}

/// One answer under a question.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRaw {
    /// Full resource name, e.g. `.../questions/q1/answers/a1`.
    pub name: Option<String>,
    pub author: Option<QuestionAuthorRaw>,
    pub text: Option<String>,
    pub create_time: Option<String>,
    pub upvote_count: Option<i64>,
}

/// One question as returned by the questions endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRaw {
    /// Full resource name, e.g. `accounts/1/locations/2/questions/q1`.
    pub name: Option<String>,
    pub author: Option<QuestionAuthorRaw>,
    pub text: Option<String>,
    pub create_time: Option<String>,
    pub upvote_count: Option<i64>,
    pub total_answer_count: Option<i64>,
    #[serde(default)]
    pub top_answers: Vec<AnswerRaw>,
}

/// Page envelope for the locations endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationsPage {
    #[serde(default)]
    pub locations: Vec<LocationRaw>,
    pub next_page_token: Option<String>,
}

/// Page envelope for the reviews endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewsPage {
    #[serde(default)]
    pub reviews: Vec<ReviewRaw>,
    pub next_page_token: Option<String>,
}

/// Page envelope for the questions endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionsPage {
    #[serde(default)]
    pub questions: Vec<QuestionRaw>,
    pub next_page_token: Option<String>,
}

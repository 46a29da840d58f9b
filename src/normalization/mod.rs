//! Payload normalization for provider records.
//!
//! Pure functions that turn raw Google Business Profile wire shapes into
//! canonical local records. Mapping here is tenant-agnostic; the orchestrator
//! stamps `user_id`/`gmb_account_id` when assembling the commit payload.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::provider::types::{LocationRaw, QuestionRaw, ReviewRaw};

/// Review status once mapped locally.
pub const REVIEW_STATUS_RESPONDED: &str = "responded";
pub const REVIEW_STATUS_PENDING: &str = "pending";

/// Question status once mapped locally.
pub const QUESTION_STATUS_ANSWERED: &str = "answered";
pub const QUESTION_STATUS_UNANSWERED: &str = "unanswered";

/// Mapping failures. A failed record is skipped and logged; it never aborts
/// the surrounding sync.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MapError {
    #[error("missing required field `{field}`")]
    MissingField { field: &'static str },
    #[error("invalid value for field `{field}`: {details}")]
    InvalidField { field: &'static str, details: String },
}

/// Symbolic star rating used by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StarRating {
    One,
    Two,
    Three,
    Four,
    Five,
}

impl StarRating {
    /// Parse the provider's `STAR_*` enum. Anything else is unrecognized.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "STAR_ONE" => Some(StarRating::One),
            "STAR_TWO" => Some(StarRating::Two),
            "STAR_THREE" => Some(StarRating::Three),
            "STAR_FOUR" => Some(StarRating::Four),
            "STAR_FIVE" => Some(StarRating::Five),
            _ => None,
        }
    }

    pub const fn as_i32(self) -> i32 {
        match self {
            StarRating::One => 1,
            StarRating::Two => 2,
            StarRating::Three => 3,
            StarRating::Four => 4,
            StarRating::Five => 5,
        }
    }
}

impl fmt::Display for StarRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i32())
    }
}

/// Canonical location record, before tenant stamping.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedLocation {
    /// Provider-local location id (last segment of the resource name).
    pub location_id: String,
    /// Full provider resource name, used to address child collections.
    pub resource_name: String,
    pub name: String,
    pub category: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub rating: f64,
    pub review_count: i32,
    pub completeness_score: i32,
    pub metadata: Option<JsonValue>,
}

/// Canonical review record, before tenant stamping.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedReview {
    pub review_id: String,
    /// Resource name of the owning location.
    pub location_resource_name: String,
    pub reviewer_name: Option<String>,
    pub reviewer_photo_url: Option<String>,
    /// 1-5, or 0 when the provider rating was missing or unrecognized.
    pub rating: i32,
    /// Set when `rating` is 0 so the record can be fixed up manually.
    pub needs_rating_review: bool,
    pub comment: Option<String>,
    pub create_time: DateTime<FixedOffset>,
    pub reply_text: Option<String>,
    pub reply_time: Option<DateTime<FixedOffset>>,
    pub has_reply: bool,
    /// `responded` or `pending`, derived from `has_reply`.
    pub status: String,
    /// Placeholder for a later sentiment pass; never set during sync.
    pub sentiment: Option<String>,
}

/// Canonical question record, before tenant stamping.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedQuestion {
    pub question_id: String,
    /// Resource name of the owning location.
    pub location_resource_name: String,
    pub author_name: Option<String>,
    pub author_photo_url: Option<String>,
    pub author_type: Option<String>,
    pub text: String,
    pub create_time: DateTime<FixedOffset>,
    pub answer_id: Option<String>,
    pub answer_text: Option<String>,
    pub answer_author: Option<String>,
    pub answer_time: Option<DateTime<FixedOffset>>,
    pub upvote_count: i32,
    pub total_answer_count: i32,
    /// `answered` or `unanswered`, derived from top answers.
    pub status: String,
}

/// Map one raw location into its canonical shape.
pub fn map_location(raw: &LocationRaw) -> Result<MappedLocation, MapError> {
    let resource_name = raw
        .name
        .as_deref()
        .filter(|n| !n.is_empty())
        .ok_or(MapError::MissingField { field: "name" })?;
    let location_id = resource_tail(resource_name).ok_or(MapError::InvalidField {
        field: "name",
        details: format!("`{}` is not a resource path", resource_name),
    })?;
    let name = raw
        .title
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or(MapError::MissingField { field: "title" })?;

    let category = raw
        .primary_category
        .as_ref()
        .and_then(|c| c.display_name.clone())
        .filter(|c| !c.is_empty());
    let address = raw.storefront_address.as_ref().and_then(|addr| {
        let mut parts: Vec<&str> = addr
            .address_lines
            .iter()
            .map(String::as_str)
            .filter(|line| !line.is_empty())
            .collect();
        if let Some(locality) = addr.locality.as_deref().filter(|l| !l.is_empty()) {
            parts.push(locality);
        }
        if let Some(area) = addr.administrative_area.as_deref().filter(|a| !a.is_empty()) {
            parts.push(area);
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    });
    let phone = raw
        .phone_numbers
        .as_ref()
        .and_then(|p| p.primary_phone.clone())
        .filter(|p| !p.is_empty());
    let website = raw.website_uri.clone().filter(|w| !w.is_empty());

    // Absent coordinates stay absent; 0,0 is a real place, not a sentinel.
    let latitude = raw
        .latlng
        .as_ref()
        .and_then(|ll| ll.latitude.as_ref())
        .map(|v| coordinate("latlng.latitude", v))
        .transpose()?;
    let longitude = raw
        .latlng
        .as_ref()
        .and_then(|ll| ll.longitude.as_ref())
        .map(|v| coordinate("latlng.longitude", v))
        .transpose()?;

    let completeness_score = completeness_score(
        category.is_some(),
        address.is_some(),
        phone.is_some(),
        website.is_some(),
        latitude.is_some() && longitude.is_some(),
        raw.review_count.unwrap_or(0) > 0,
    );

    Ok(MappedLocation {
        location_id,
        resource_name: resource_name.to_string(),
        name: name.to_string(),
        category,
        address,
        phone,
        website,
        latitude,
        longitude,
        rating: raw.average_rating.unwrap_or(0.0),
        review_count: raw.review_count.unwrap_or(0) as i32,
        completeness_score,
        metadata: raw.metadata.clone(),
    })
}

/// Map one raw review into its canonical shape.
///
/// The owning location is taken from the review's own resource name when
/// present, falling back to `parent_location` (the resource name of the
/// location the review was fetched under).
pub fn map_review(raw: &ReviewRaw, parent_location: &str) -> Result<MappedReview, MapError> {
    let review_id = raw
        .review_id
        .clone()
        .filter(|id| !id.is_empty())
        .or_else(|| raw.name.as_deref().and_then(resource_tail))
        .ok_or(MapError::MissingField { field: "reviewId" })?;

    let location_resource_name = raw
        .name
        .as_deref()
        .and_then(|name| parent_resource(name, "/reviews/"))
        .unwrap_or_else(|| parent_location.trim_matches('/').to_string());

    let (rating, needs_rating_review) = match raw.star_rating.as_deref() {
        Some(symbol) => match StarRating::parse(symbol) {
            Some(star) => (star.as_i32(), false),
            None => (0, true),
        },
        None => (0, true),
    };

    let create_time = raw
        .create_time
        .as_deref()
        .ok_or(MapError::MissingField { field: "createTime" })
        .and_then(|value| timestamp("createTime", value))?;

    let reply = raw.review_reply.as_ref();
    let has_reply = reply.is_some();
    let reply_text = reply.and_then(|r| r.comment.clone());
    let reply_time = reply
        .and_then(|r| r.update_time.as_deref())
        .map(|value| timestamp("reviewReply.updateTime", value))
        .transpose()?;

    Ok(MappedReview {
        review_id,
        location_resource_name,
        reviewer_name: raw.reviewer.as_ref().and_then(|r| r.display_name.clone()),
        reviewer_photo_url: raw
            .reviewer
            .as_ref()
            .and_then(|r| r.profile_photo_url.clone()),
        rating,
        needs_rating_review,
        comment: raw.comment.clone().filter(|c| !c.is_empty()),
        create_time,
        reply_text,
        reply_time,
        has_reply,
        status: if has_reply {
            REVIEW_STATUS_RESPONDED.to_string()
        } else {
            REVIEW_STATUS_PENDING.to_string()
        },
        sentiment: None,
    })
}

/// Map one raw question into its canonical shape.
pub fn map_question(
    raw: &QuestionRaw,
    parent_location: &str,
) -> Result<MappedQuestion, MapError> {
    let name = raw
        .name
        .as_deref()
        .filter(|n| !n.is_empty())
        .ok_or(MapError::MissingField { field: "name" })?;
    let question_id = resource_tail(name).ok_or(MapError::InvalidField {
        field: "name",
        details: format!("`{}` is not a resource path", name),
    })?;
    let location_resource_name = parent_resource(name, "/questions/")
        .unwrap_or_else(|| parent_location.trim_matches('/').to_string());

    let text = raw
        .text
        .clone()
        .filter(|t| !t.is_empty())
        .ok_or(MapError::MissingField { field: "text" })?;

    let create_time = raw
        .create_time
        .as_deref()
        .ok_or(MapError::MissingField { field: "createTime" })
        .and_then(|value| timestamp("createTime", value))?;

    // The first top answer is treated as the accepted one.
    let top_answer = raw.top_answers.first();
    let answered = top_answer.is_some();
    let answer_time = top_answer
        .and_then(|a| a.create_time.as_deref())
        .map(|value| timestamp("topAnswers.createTime", value))
        .transpose()?;

    Ok(MappedQuestion {
        question_id,
        location_resource_name,
        author_name: raw.author.as_ref().and_then(|a| a.display_name.clone()),
        author_photo_url: raw
            .author
            .as_ref()
            .and_then(|a| a.profile_photo_url.clone()),
        author_type: raw.author.as_ref().and_then(|a| a.author_type.clone()),
        text,
        create_time,
        answer_id: top_answer.and_then(|a| a.name.as_deref()).and_then(resource_tail),
        answer_text: top_answer.and_then(|a| a.text.clone()),
        answer_author: top_answer
            .and_then(|a| a.author.as_ref())
            .and_then(|a| a.display_name.clone()),
        answer_time,
        upvote_count: raw.upvote_count.unwrap_or(0) as i32,
        total_answer_count: raw.total_answer_count.unwrap_or(0) as i32,
        status: if answered {
            QUESTION_STATUS_ANSWERED.to_string()
        } else {
            QUESTION_STATUS_UNANSWERED.to_string()
        },
    })
}

/// Profile completeness as a 0-100 score over six tracked attributes.
fn completeness_score(
    has_category: bool,
    has_address: bool,
    has_phone: bool,
    has_website: bool,
    has_coordinates: bool,
    has_reviews: bool,
) -> i32 {
    let present = [
        has_category,
        has_address,
        has_phone,
        has_website,
        has_coordinates,
        has_reviews,
    ]
    .iter()
    .filter(|p| **p)
    .count() as i32;

    present * 100 / 6
}

/// Last segment of a resource path, e.g. `accounts/1/locations/2` → `2`.
fn resource_tail(name: &str) -> Option<String> {
    name.trim_matches('/')
        .rsplit('/')
        .next()
        .filter(|tail| !tail.is_empty())
        .map(str::to_string)
}

/// The resource prefix before a child collection marker, e.g. splitting
/// `accounts/1/locations/2/reviews/3` at `/reviews/` yields
/// `accounts/1/locations/2`.
fn parent_resource(name: &str, marker: &str) -> Option<String> {
    name.trim_matches('/')
        .split_once(marker)
        .map(|(prefix, _)| prefix.to_string())
        .filter(|prefix| !prefix.is_empty())
}

/// Coordinates may arrive as JSON numbers or numeric strings.
fn coordinate(field: &'static str, value: &JsonValue) -> Result<f64, MapError> {
    match value {
        JsonValue::Number(n) => n.as_f64().ok_or(MapError::InvalidField {
            field,
            details: format!("`{}` is not representable as f64", n),
        }),
        JsonValue::String(s) => s.parse::<f64>().map_err(|_| MapError::InvalidField {
            field,
            details: format!("`{}` is not a number", s),
        }),
        other => Err(MapError::InvalidField {
            field,
            details: format!("unexpected JSON type: {}", other),
        }),
    }
}

/// Parse an RFC 3339 timestamp, preserving the offset the provider sent.
fn timestamp(field: &'static str, value: &str) -> Result<DateTime<FixedOffset>, MapError> {
    DateTime::parse_from_rfc3339(value).map_err(|e| MapError::InvalidField {
        field,
        details: format!("`{}` is not RFC 3339: {}", value, e),
    })
}

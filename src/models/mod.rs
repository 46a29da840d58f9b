//! # Data Models
//!
//! This module contains the SeaORM entity models used throughout the GBP sync
//! service.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod gmb_account;
pub mod location;
pub mod question;
pub mod review;
pub mod sync_job;

pub use gmb_account::Entity as GmbAccount;
pub use location::Entity as Location;
pub use question::Entity as Question;
pub use review::Entity as Review;
pub use sync_job::Entity as SyncJob;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "gbp-sync".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

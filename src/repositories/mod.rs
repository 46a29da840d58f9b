//! Repository layer encapsulating SeaORM access patterns.
//!
//! Repositories return `sea_orm::DbErr`; the HTTP layer maps database errors
//! to API responses via the `ApiError` conversions in `crate::error`.

pub mod account;
pub mod dashboard;
pub mod sync_job;

pub use account::AccountRepository;
pub use dashboard::{DashboardAggregates, DashboardRepository};
pub use sync_job::SyncJobRepository;

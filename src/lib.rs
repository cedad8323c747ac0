mod config;
mod controller;
mod cursor;
mod db;
mod errors;
mod feed;
mod fetcher;
mod filter;
mod logging;
mod models;
mod query;
mod reconciler;
mod sort;
mod store;

pub use crate::config::{FeedConfig, DEFAULT_PAGE_SIZE};
pub use crate::controller::{FeedController, FeedSnapshot};
pub use crate::cursor::Cursor;
pub use crate::db::Database;
pub use crate::errors::{AppError, AppResult};
pub use crate::feed::{Completion, EmptyState, FeedPhase, FeedRequest, FeedState, RequestTicket};
pub use crate::fetcher::PageFetcher;
pub use crate::logging::init_tracing;
pub use crate::models::{
    Column, ColumnValue, CompanyProfile, CreatedWithin, FilterSpec, Page, Post, PostStatus, PostWithCompany,
    SortColumn, SortKey, SortSpec, DEFAULT_MIN_REWARD, UNBOUNDED_MAX_REWARD,
};
pub use crate::query::{translate, CompareOp, FeedQuery, Predicate, SortClause, ID_TIE_BREAK};
pub use crate::reconciler::{reconcile, FetchKind, Reconciled};
pub use crate::sort::SortPreset;
pub use crate::store::{MemoryStore, PostStore, StoreFuture};

use std::sync::Arc;

/// Wires logging, the SQLite store and a controller from one config.
pub fn open_feed(config: &FeedConfig) -> AppResult<FeedController> {
    config.validate()?;
    if let Some(log_dir) = &config.log_dir {
        if let Err(error) = init_tracing(log_dir, &config.log_filter) {
            tracing::warn!(error = %error, "feed logging not initialized");
        }
    }

    let Some(database_path) = &config.database_path else {
        return Err(AppError::Config("databasePath is required".to_string()));
    };
    let database = Database::new(database_path)?;
    tracing::info!(path = %database.path().display(), page_size = config.page_size, "feed store opened");

    FeedController::new(Arc::new(database), config)
}

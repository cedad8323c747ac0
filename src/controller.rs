use crate::config::FeedConfig;
use crate::errors::AppResult;
use crate::feed::{EmptyState, FeedPhase, FeedRequest, FeedState};
use crate::fetcher::PageFetcher;
use crate::models::{FilterSpec, PostWithCompany, SortSpec};
use crate::sort::SortPreset;
use crate::store::PostStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Everything the view layer renders for the feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSnapshot {
    pub items: Vec<PostWithCompany>,
    pub first_item_id: Option<String>,
    pub phase: FeedPhase,
    pub is_loading: bool,
    pub is_exhausted: bool,
    pub has_error: bool,
    pub error: Option<String>,
    pub empty_state: Option<EmptyState>,
    pub empty_message: Option<String>,
    pub active_filter: FilterSpec,
    pub active_sort: SortSpec,
    pub sort_preset: Option<SortPreset>,
    pub next_cursor: Option<String>,
    pub pages_loaded: u32,
}

impl FeedSnapshot {
    fn from_state(state: &FeedState) -> Self {
        let empty_state = state.empty_state();
        let next_cursor = state.cursor().and_then(|cursor| match cursor.encode() {
            Ok(token) => Some(token),
            Err(error) => {
                tracing::warn!(error = %error, "failed to encode feed cursor");
                None
            }
        });

        Self {
            items: state.items().to_vec(),
            first_item_id: state.first_item_id().map(ToString::to_string),
            phase: state.phase(),
            is_loading: state.is_loading(),
            is_exhausted: state.is_exhausted(),
            has_error: state.has_error(),
            error: state.last_error().map(ToString::to_string),
            empty_state,
            empty_message: empty_state.map(|empty| empty.message().to_string()),
            active_filter: state.active_filter().clone(),
            active_sort: state.active_sort().clone(),
            sort_preset: SortPreset::matching(state.active_sort()),
            next_cursor,
            pages_loaded: state.pages_loaded(),
        }
    }
}

/// Async entry point for the view layer. Owns the single feed state; clones share it.
#[derive(Clone)]
pub struct FeedController {
    state: Arc<Mutex<FeedState>>,
    fetcher: PageFetcher,
}

impl FeedController {
    pub fn new(store: Arc<dyn PostStore>, config: &FeedConfig) -> AppResult<Self> {
        let state = FeedState::new(FilterSpec::default(), config.default_sort.spec(), config.page_size)?;
        Ok(Self::with_state(store, state))
    }

    pub fn with_state(store: Arc<dyn PostStore>, state: FeedState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            fetcher: PageFetcher::new(store),
        }
    }

    pub async fn snapshot(&self) -> FeedSnapshot {
        let state = self.state.lock().await;
        FeedSnapshot::from_state(&state)
    }

    pub async fn mount(&self) -> FeedSnapshot {
        let request = {
            let mut state = self.state.lock().await;
            state.begin_restart(Utc::now())
        };
        self.dispatch(request.map(Some)).await
    }

    /// Fired when the list scrolls near its end.
    pub async fn load_more(&self) -> FeedSnapshot {
        let request = {
            let mut state = self.state.lock().await;
            state.request_more(Utc::now())
        };
        self.dispatch(request).await
    }

    pub async fn refresh(&self) -> FeedSnapshot {
        self.mount().await
    }

    pub async fn apply_filter(&self, filter: FilterSpec) -> AppResult<FeedSnapshot> {
        let request = {
            let mut state = self.state.lock().await;
            state.apply_filter(filter, Utc::now())?
        };
        Ok(self.run(request).await)
    }

    pub async fn apply_sort(&self, sort: SortSpec) -> AppResult<FeedSnapshot> {
        let request = {
            let mut state = self.state.lock().await;
            state.apply_sort(sort, Utc::now())?
        };
        Ok(self.run(request).await)
    }

    pub async fn apply_preset(&self, preset: SortPreset) -> AppResult<FeedSnapshot> {
        self.apply_sort(preset.spec()).await
    }

    pub async fn unmount(&self) {
        let mut state = self.state.lock().await;
        state.unmount();
    }

    async fn dispatch(&self, request: AppResult<Option<FeedRequest>>) -> FeedSnapshot {
        match request {
            Ok(Some(request)) => self.run(request).await,
            Ok(None) => self.snapshot().await,
            Err(error) => {
                tracing::error!(error = %error, "could not build feed request");
                self.snapshot().await
            }
        }
    }

    async fn run(&self, request: FeedRequest) -> FeedSnapshot {
        let result = self.fetcher.fetch(&request.query).await;
        let mut state = self.state.lock().await;
        state.complete(&request.ticket, result);
        FeedSnapshot::from_state(&state)
    }
}

use crate::cursor::Cursor;
use crate::errors::{AppError, AppResult};
use crate::models::{FilterSpec, Page, PostWithCompany, SortSpec};
use crate::query::{translate, FeedQuery};
use crate::reconciler::{reconcile, FetchKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedPhase {
    Idle,
    LoadingInitial,
    LoadingMore,
    Ready,
    Exhausted,
    Error,
}

impl FeedPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::LoadingInitial => "loading-initial",
            Self::LoadingMore => "loading-more",
            Self::Ready => "ready",
            Self::Exhausted => "exhausted",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmptyState {
    NoPosts,
    FiltersTooNarrow,
}

impl EmptyState {
    pub fn message(self) -> &'static str {
        match self {
            Self::NoPosts => "No tasks have been posted yet.",
            Self::FiltersTooNarrow => "No results. Try adjusting your filters.",
        }
    }
}

/// Identifies the filter/sort context a request was issued under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTicket {
    generation: u64,
    kind: FetchKind,
    filter: FilterSpec,
    sort: SortSpec,
}

impl RequestTicket {
    pub fn kind(&self) -> FetchKind {
        self.kind
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone)]
pub struct FeedRequest {
    pub ticket: RequestTicket,
    pub query: FeedQuery,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Applied { appended: usize, reached_end: bool },
    Stale,
    Failed(AppError),
}

/// In-memory feed collection plus the pagination bookkeeping around it.
/// Items change only when a current request completes.
#[derive(Debug, Clone)]
pub struct FeedState {
    items: Vec<PostWithCompany>,
    phase: FeedPhase,
    has_more: bool,
    active_sort: SortSpec,
    active_filter: FilterSpec,
    cursor: Option<Cursor>,
    generation: u64,
    anchor: DateTime<Utc>,
    page_size: u32,
    pages_loaded: u32,
    last_error: Option<AppError>,
    first_item_id: Option<String>,
}

impl FeedState {
    pub fn new(filter: FilterSpec, sort: SortSpec, page_size: u32) -> AppResult<Self> {
        filter.validate()?;
        if page_size == 0 {
            return Err(AppError::Config("page size must be at least 1".to_string()));
        }
        Ok(Self {
            items: Vec::new(),
            phase: FeedPhase::Idle,
            has_more: true,
            active_sort: sort,
            active_filter: filter,
            cursor: None,
            generation: 0,
            anchor: Utc::now(),
            page_size,
            pages_loaded: 0,
            last_error: None,
            first_item_id: None,
        })
    }

    pub fn items(&self) -> &[PostWithCompany] {
        &self.items
    }

    pub fn phase(&self) -> FeedPhase {
        self.phase
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, FeedPhase::LoadingInitial | FeedPhase::LoadingMore)
    }

    pub fn is_exhausted(&self) -> bool {
        self.phase == FeedPhase::Exhausted
    }

    pub fn has_error(&self) -> bool {
        self.phase == FeedPhase::Error
    }

    pub fn last_error(&self) -> Option<&AppError> {
        self.last_error.as_ref()
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    pub fn active_filter(&self) -> &FilterSpec {
        &self.active_filter
    }

    pub fn active_sort(&self) -> &SortSpec {
        &self.active_sort
    }

    pub fn first_item_id(&self) -> Option<&str> {
        self.first_item_id.as_deref()
    }

    pub fn pages_loaded(&self) -> u32 {
        self.pages_loaded
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn empty_state(&self) -> Option<EmptyState> {
        if !self.items.is_empty() || self.phase != FeedPhase::Exhausted {
            return None;
        }
        if self.active_filter.differs_from_default() {
            Some(EmptyState::FiltersTooNarrow)
        } else {
            Some(EmptyState::NoPosts)
        }
    }

    /// Drops all results and issues the first page for the active filter and sort.
    pub fn begin_restart(&mut self, now: DateTime<Utc>) -> AppResult<FeedRequest> {
        let query = translate(&self.active_filter, &self.active_sort, None, self.page_size, now)?;

        self.generation += 1;
        self.items.clear();
        self.cursor = None;
        self.has_more = true;
        self.phase = FeedPhase::LoadingInitial;
        self.last_error = None;
        self.anchor = now;
        self.pages_loaded = 0;
        self.first_item_id = None;

        tracing::debug!(generation = self.generation, "feed restart issued");
        Ok(self.request(FetchKind::Restart, query))
    }

    pub fn apply_filter(&mut self, filter: FilterSpec, now: DateTime<Utc>) -> AppResult<FeedRequest> {
        filter.validate()?;
        self.active_filter = filter;
        self.begin_restart(now)
    }

    pub fn apply_sort(&mut self, sort: SortSpec, now: DateTime<Utc>) -> AppResult<FeedRequest> {
        self.active_sort = sort;
        self.begin_restart(now)
    }

    /// Scroll-proximity trigger. Returns `None` when no request should go out.
    pub fn request_more(&mut self, now: DateTime<Utc>) -> AppResult<Option<FeedRequest>> {
        match self.phase {
            FeedPhase::Idle | FeedPhase::Error => self.begin_restart(now).map(Some),
            FeedPhase::LoadingInitial | FeedPhase::LoadingMore => {
                tracing::trace!(phase = self.phase.as_str(), "load-more ignored while loading");
                Ok(None)
            }
            FeedPhase::Exhausted => Ok(None),
            FeedPhase::Ready => {
                if !self.has_more {
                    return Ok(None);
                }
                let query = translate(
                    &self.active_filter,
                    &self.active_sort,
                    self.cursor.as_ref(),
                    self.page_size,
                    self.anchor,
                )?;
                self.phase = FeedPhase::LoadingMore;
                Ok(Some(self.request(FetchKind::Continue, query)))
            }
        }
    }

    pub fn complete(&mut self, ticket: &RequestTicket, result: AppResult<Page>) -> Completion {
        if !self.is_current(ticket) {
            tracing::debug!(
                generation = ticket.generation,
                current = self.generation,
                kind = ticket.kind.as_str(),
                "discarding stale feed response"
            );
            return Completion::Stale;
        }

        let page = match result {
            Ok(page) => page,
            Err(error) => {
                tracing::warn!(
                    generation = self.generation,
                    kind = ticket.kind.as_str(),
                    error = %error,
                    "feed fetch failed"
                );
                self.phase = FeedPhase::Error;
                self.last_error = Some(error.clone());
                return Completion::Failed(error);
            }
        };

        let reached_end = page.reached_end;
        let merged = reconcile(
            ticket.kind,
            std::mem::take(&mut self.items),
            self.cursor.take(),
            page.items,
            &self.active_sort,
        );
        if merged.duplicates > 0 {
            tracing::warn!(
                duplicates = merged.duplicates,
                "dropped items already present in the feed"
            );
        }

        self.items = merged.items;
        self.cursor = merged.cursor;
        self.has_more = !reached_end;
        self.pages_loaded += 1;
        if ticket.kind == FetchKind::Restart {
            self.first_item_id = self.items.first().map(|item| item.id().to_string());
        }
        self.phase = if reached_end {
            FeedPhase::Exhausted
        } else {
            FeedPhase::Ready
        };

        tracing::debug!(
            generation = self.generation,
            kind = ticket.kind.as_str(),
            count = merged.appended,
            total = self.items.len(),
            reached_end,
            "feed page applied"
        );
        Completion::Applied {
            appended: merged.appended,
            reached_end,
        }
    }

    /// Voids every outstanding request and returns to `Idle`.
    pub fn unmount(&mut self) {
        self.generation += 1;
        self.items.clear();
        self.cursor = None;
        self.has_more = true;
        self.phase = FeedPhase::Idle;
        self.last_error = None;
        self.pages_loaded = 0;
        self.first_item_id = None;
    }

    fn is_current(&self, ticket: &RequestTicket) -> bool {
        let expected_phase = match ticket.kind {
            FetchKind::Restart => FeedPhase::LoadingInitial,
            FetchKind::Continue => FeedPhase::LoadingMore,
        };
        ticket.generation == self.generation
            && ticket.filter == self.active_filter
            && ticket.sort == self.active_sort
            && self.phase == expected_phase
    }

    fn request(&self, kind: FetchKind, query: FeedQuery) -> FeedRequest {
        FeedRequest {
            ticket: RequestTicket {
                generation: self.generation,
                kind,
                filter: self.active_filter.clone(),
                sort: self.active_sort.clone(),
            },
            query,
        }
    }
}

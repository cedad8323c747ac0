use crate::errors::{AppError, AppResult};
use crate::models::{CreatedWithin, FilterSpec, PostStatus, DEFAULT_MIN_REWARD, UNBOUNDED_MAX_REWARD};
use chrono::{DateTime, Duration, Utc};

impl CreatedWithin {
    pub fn window(self) -> Option<Duration> {
        match self {
            Self::Last24h => Some(Duration::hours(24)),
            Self::Last7d => Some(Duration::days(7)),
            Self::Last30d => Some(Duration::days(30)),
            Self::All => None,
        }
    }

    /// Oldest creation time still inside the window, measured back from `now`.
    pub fn cutoff(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.window().map(|window| now - window)
    }
}

impl FilterSpec {
    pub fn validate(&self) -> AppResult<()> {
        if self.min_reward < 0 {
            return Err(AppError::InvalidFilter(format!(
                "minimum reward must be >= 0, got {}",
                self.min_reward
            )));
        }
        if self.max_reward < self.min_reward {
            return Err(AppError::InvalidFilter(format!(
                "maximum reward {} is below minimum reward {}",
                self.max_reward, self.min_reward
            )));
        }
        if let Some(company_id) = &self.company_id {
            if company_id.trim().is_empty() {
                return Err(AppError::InvalidFilter("company id must not be blank".to_string()));
            }
        }
        Ok(())
    }

    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = PostStatus>) -> Self {
        self.statuses = statuses.into_iter().collect();
        self
    }

    pub fn has_min_reward(&self) -> bool {
        self.min_reward != DEFAULT_MIN_REWARD
    }

    pub fn has_max_reward(&self) -> bool {
        self.max_reward != UNBOUNDED_MAX_REWARD
    }

    /// True when the user moved any control away from its default.
    pub fn differs_from_default(&self) -> bool {
        *self != FilterSpec::default()
    }
}

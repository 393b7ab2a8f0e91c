//! Query state as published to observers

use iaso_core::ApiError;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;
use tokio::time::Instant;

/// Type-erased cached value
pub(crate) type AnyData = Arc<dyn Any + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    /// Never fetched, or disabled
    #[default]
    Idle,
    /// First fetch in progress, no data yet
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    #[default]
    Idle,
    Fetching,
}

/// State shared by all observers of one cache entry
#[derive(Clone, Default)]
pub(crate) struct QueryState {
    pub data: Option<AnyData>,
    pub error: Option<ApiError>,
    pub status: QueryStatus,
    pub fetch_status: FetchStatus,
    pub data_updated_at: Option<Instant>,
    pub is_invalidated: bool,
}

impl QueryState {
    pub fn is_fetching(&self) -> bool {
        self.fetch_status == FetchStatus::Fetching
    }

    /// Data is stale when missing, invalidated or older than `stale_time`
    pub fn is_stale(&self, stale_time: std::time::Duration) -> bool {
        if self.is_invalidated {
            return true;
        }
        match self.data_updated_at {
            Some(updated_at) => updated_at.elapsed() >= stale_time,
            None => true,
        }
    }
}

/// Snapshot of a query as seen by one observer
#[derive(Debug)]
pub struct QueryResult<T> {
    pub data: Option<Arc<T>>,
    pub error: Option<ApiError>,
    pub status: QueryStatus,
    pub fetch_status: FetchStatus,
    /// Data belongs to the previous key (`keep_previous_data`)
    pub is_previous_data: bool,
    pub is_stale: bool,
    pub data_updated_at: Option<Instant>,
}

impl<T> Clone for QueryResult<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            error: self.error.clone(),
            status: self.status,
            fetch_status: self.fetch_status,
            is_previous_data: self.is_previous_data,
            is_stale: self.is_stale,
            data_updated_at: self.data_updated_at,
        }
    }
}

impl<T> QueryResult<T> {
    pub fn is_idle(&self) -> bool {
        self.status == QueryStatus::Idle
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    pub fn is_fetching(&self) -> bool {
        self.fetch_status == FetchStatus::Fetching
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_staleness() {
        let mut state = QueryState::default();
        assert!(state.is_stale(Duration::from_secs(60)));

        state.data_updated_at = Some(Instant::now());
        assert!(!state.is_stale(Duration::from_secs(60)));
        assert!(state.is_stale(Duration::ZERO));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(state.is_stale(Duration::from_secs(60)));

        state.data_updated_at = Some(Instant::now());
        state.is_invalidated = true;
        assert!(state.is_stale(Duration::from_secs(60)));
    }
}

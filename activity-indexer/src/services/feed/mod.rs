//! Read side of the activity feed served by the backend API.

pub mod http;

use std::collections::HashSet;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::interfaces::activity::ActivityItem;
use crate::interfaces::error::FeedError;

pub const DEFAULT_ACTIVITY_LIMIT: u32 = 20;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ActivityApi: Send + Sync {
    async fn recent_activity(&self, limit: u32) -> Result<Vec<ActivityItem>, FeedError>;

    async fn user_activity(&self, address: &str, limit: u32) -> Result<Vec<ActivityItem>, FeedError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityRequest {
    Recent { limit: u32 },
    User { address: String, limit: u32 },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedState {
    pub activities: Vec<ActivityItem>,
    pub loading: bool,
    pub error: Option<String>,
}

struct Inner {
    state: FeedState,
    last_request: Option<ActivityRequest>,
}

/// Holds the most recently fetched feed page together with its loading and
/// error flags.
///
/// A failed fetch keeps the previous activities and records the error
/// message. Nothing is retried automatically.
pub struct ActivityFeed<A: ActivityApi> {
    api: A,
    inner: Mutex<Inner>,
}

impl<A: ActivityApi> ActivityFeed<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            inner: Mutex::new(Inner {
                state: FeedState::default(),
                last_request: None,
            }),
        }
    }

    pub fn state(&self) -> FeedState {
        self.inner.lock().state.clone()
    }

    pub fn last_request(&self) -> Option<ActivityRequest> {
        self.inner.lock().last_request.clone()
    }

    pub async fn fetch_recent_activity(&self, limit: u32) -> FeedState {
        self.fetch(ActivityRequest::Recent { limit }).await
    }

    pub async fn fetch_user_activity(&self, address: &str, limit: u32) -> FeedState {
        self.fetch(ActivityRequest::User {
            address: address.to_string(),
            limit,
        })
        .await
    }

    /// Re-issues the last fetch, or fetches recent activity when nothing was
    /// fetched yet.
    pub async fn refresh_activity(&self) -> FeedState {
        let request = self
            .last_request()
            .unwrap_or(ActivityRequest::Recent {
                limit: DEFAULT_ACTIVITY_LIMIT,
            });
        self.fetch(request).await
    }

    async fn fetch(&self, request: ActivityRequest) -> FeedState {
        {
            let mut inner = self.inner.lock();
            inner.state.loading = true;
            inner.state.error = None;
            inner.last_request = Some(request.clone());
        }

        let result = match &request {
            ActivityRequest::Recent { limit } => self.api.recent_activity(*limit).await,
            ActivityRequest::User { address, limit } => {
                self.api.user_activity(address, *limit).await
            }
        };

        let mut inner = self.inner.lock();
        inner.state.loading = false;
        match result {
            Ok(items) => {
                inner.state.activities = dedup_by_id(items);
                debug!("{} activities for {:?}", inner.state.activities.len(), request);
            }
            Err(e) => {
                warn!("Activity fetch failed for {:?}: {}", request, e);
                inner.state.error = Some(e.to_string());
            }
        }
        inner.state.clone()
    }
}

/// Keeps the first occurrence of every id, preserving order.
pub fn dedup_by_id(items: Vec<ActivityItem>) -> Vec<ActivityItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.id.clone()))
        .collect()
}

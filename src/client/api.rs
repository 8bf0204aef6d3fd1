use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::sleep;

use crate::console::log::ConsoleLogger;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("user with id {0} not found")]
    UserNotFound(String),

    #[error("network error: failed to fetch data")]
    Network,

    #[error("injected failure")]
    InjectedFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

fn mock_users() -> Vec<User> {
    vec![
        User {
            id: "1".to_string(),
            name: "John Doe".to_string(),
            email: "john@example.com".to_string(),
            avatar: None,
        },
        User {
            id: "2".to_string(),
            name: "Jane Smith".to_string(),
            email: "jane@example.com".to_string(),
            avatar: None,
        },
        User {
            id: "3".to_string(),
            name: "Bob Johnson".to_string(),
            email: "bob@example.com".to_string(),
            avatar: None,
        },
    ]
}

/// Mock data source with simulated latency. Exists to give the console
/// something observable to record: slow fetches, hard failures, and an
/// intermittently failing endpoint that exercises the retry path.
#[derive(Debug, Clone)]
pub struct ApiService {
    logger: ConsoleLogger,
    periodic_calls: Arc<AtomicU64>,
}

impl ApiService {
    pub fn new(logger: ConsoleLogger) -> Self {
        Self {
            logger,
            periodic_calls: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn fetch_users(&self) -> Result<Vec<User>, ApiError> {
        self.logger.info(&["API: fetching users...".into()]);
        sleep(Duration::from_millis(1000)).await;
        self.logger.info(&["API: users fetched successfully".into()]);
        Ok(mock_users())
    }

    pub async fn fetch_user_by_id(&self, id: &str) -> Result<User, ApiError> {
        self.logger
            .info(&[format!("API: fetching user with id {}", id).into()]);
        sleep(Duration::from_millis(800)).await;
        match mock_users().into_iter().find(|user| user.id == id) {
            Some(user) => {
                self.logger
                    .info(&[format!("API: user {} fetched successfully", user.name).into()]);
                Ok(user)
            }
            None => {
                self.logger
                    .error(&[format!("API: user with id {} not found", id).into()]);
                Err(ApiError::UserNotFound(id.to_string()))
            }
        }
    }

    /// Always fails after a short delay.
    pub async fn fetch_with_error(&self) -> Result<Vec<User>, ApiError> {
        self.logger
            .info(&["API: attempting request that will fail...".into()]);
        sleep(Duration::from_millis(500)).await;
        self.logger
            .error(&["API: request failed with network error".into()]);
        Err(ApiError::Network)
    }

    pub async fn fetch_with_delay(&self, delay: Duration) -> Result<String, ApiError> {
        self.logger
            .info(&[format!("API: fetching with {}ms delay...", delay.as_millis()).into()]);
        sleep(delay).await;
        let message = format!("Data fetched after {}ms delay", delay.as_millis());
        self.logger.info(&[format!("API: {}", message).into()]);
        Ok(message)
    }

    /// Fails every third call. Deterministic stand-in for a flaky
    /// endpoint, so retry behavior can be exercised without an RNG.
    pub async fn fetch_with_periodic_failure(&self) -> Result<Vec<User>, ApiError> {
        self.logger
            .info(&["API: fetching from flaky endpoint...".into()]);
        sleep(Duration::from_millis(600)).await;
        let call = self.periodic_calls.fetch_add(1, Ordering::Relaxed) + 1;
        if call % 3 == 0 {
            self.logger.error(&["API: injected failure occurred".into()]);
            return Err(ApiError::InjectedFailure);
        }
        self.logger.info(&["API: flaky request succeeded".into()]);
        Ok(mock_users())
    }
}

//! Subscription sources.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Subscription;
use crate::storage::SubscriptionSource;

/// On-disk layout of `subscriptions.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SubscriptionsFile {
    #[serde(default)]
    subscriptions: Vec<Subscription>,
}

/// Subscriptions read from a TOML file on every load.
#[derive(Debug, Clone)]
pub struct FileSubscriptions {
    path: PathBuf,
}

impl FileSubscriptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SubscriptionSource for FileSubscriptions {
    async fn load(&self) -> Result<Vec<Subscription>> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            AppError::store(format!(
                "cannot read subscriptions {}: {e}",
                self.path.display()
            ))
        })?;
        let file: SubscriptionsFile = toml::from_str(&content).map_err(|e| {
            AppError::store(format!(
                "subscriptions {} are malformed: {e}",
                self.path.display()
            ))
        })?;
        Ok(file.subscriptions)
    }
}

/// A fixed list of subscriptions.
#[derive(Debug, Clone, Default)]
pub struct StaticSubscriptions(pub Vec<Subscription>);

#[async_trait]
impl SubscriptionSource for StaticSubscriptions {
    async fn load(&self) -> Result<Vec<Subscription>> {
        Ok(self.0.clone())
    }
}

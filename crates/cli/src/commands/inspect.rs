//! status and keys.

use asha_client::{CacheManager, Network};
use asha_core::{EntrySummary, Error, Generation, GenerationState};
use serde::Serialize;

/// Output of `status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusOutput {
    /// Generation this worker installs.
    pub current: String,
    pub state: Option<GenerationState>,
    /// Generation answering fetches; differs from `current` until it activates.
    pub serving: Option<String>,
    pub generations: Vec<Generation>,
}

pub async fn status_impl<N: Network>(manager: &CacheManager<N>) -> Result<StatusOutput, Error> {
    Ok(StatusOutput {
        current: manager.config().cache_name.clone(),
        state: manager.state().await?,
        serving: manager.serving_generation().await?,
        generations: manager.status().await?,
    })
}

pub async fn keys_impl<N: Network>(
    manager: &CacheManager<N>, generation: Option<&str>,
) -> Result<Vec<EntrySummary>, Error> {
    manager.keys(generation).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::run_impl;
    use crate::commands::tests::{StaticNetwork, manager};

    #[tokio::test]
    async fn test_status_reports_current_generation() {
        let manager = manager(StaticNetwork::ok()).await;
        run_impl(&manager, &[]).await.unwrap();

        let status = status_impl(&manager).await.unwrap();
        assert_eq!(status.current, "v1");
        assert_eq!(status.state, Some(GenerationState::Active));
        assert_eq!(status.serving.as_deref(), Some("v1"));
        assert_eq!(status.generations.len(), 1);
        assert_eq!(status.generations[0].entry_count, 2);

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["generations"][0]["state"], "active");
    }

    #[tokio::test]
    async fn test_status_before_install() {
        let manager = manager(StaticNetwork::ok()).await;
        let status = status_impl(&manager).await.unwrap();
        assert!(status.state.is_none());
        assert!(status.serving.is_none());
        assert!(status.generations.is_empty());
    }

    #[tokio::test]
    async fn test_keys_of_unknown_generation_is_empty() {
        let manager = manager(StaticNetwork::ok()).await;
        assert!(keys_impl(&manager, Some("nope")).await.unwrap().is_empty());
    }
}

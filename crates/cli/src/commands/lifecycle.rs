//! install, activate and run.

use asha_client::{ActivateOutcome, CacheManager, InstallOutcome, Network, resolve};
use asha_core::Error;
use serde::Serialize;

/// Output of `run`.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    pub install: InstallOutcome,
    pub activate: ActivateOutcome,
}

pub async fn install_impl<N: Network>(manager: &CacheManager<N>) -> Result<InstallOutcome, Error> {
    manager.install().await
}

/// Register `clients` as open pages, then activate.
pub async fn activate_impl<N: Network>(
    manager: &CacheManager<N>, clients: &[String],
) -> Result<ActivateOutcome, Error> {
    for raw in clients {
        let url =
            resolve(raw, &manager.config().origin).map_err(|e| Error::InvalidUrl(format!("client {raw}: {e}")))?;
        manager.register_client(url).await?;
    }
    manager.activate().await
}

/// Install, and only if that succeeds, activate.
pub async fn run_impl<N: Network>(manager: &CacheManager<N>, clients: &[String]) -> Result<RunOutput, Error> {
    let install = install_impl(manager).await?;
    let activate = activate_impl(manager, clients).await?;
    Ok(RunOutput { install, activate })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::{StaticNetwork, manager};

    #[tokio::test]
    async fn test_run_installs_and_claims() {
        let manager = manager(StaticNetwork::ok()).await;
        let output = run_impl(&manager, &["/".to_string(), "/chat".to_string()]).await.unwrap();
        assert_eq!(output.install.entries, 2);
        assert_eq!(output.activate.claimed, 2);
        assert!(output.activate.clients.iter().all(|c| c.controller.as_deref() == Some("v1")));
        assert!(output.activate.deleted.is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_after_failed_install() {
        let manager = manager(StaticNetwork::offline()).await;
        let result = run_impl(&manager, &[]).await;
        assert!(matches!(result, Err(Error::InstallFailed { .. })));
        assert!(manager.status().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_activate_rejects_bad_client_url() {
        let manager = manager(StaticNetwork::ok()).await;
        install_impl(&manager).await.unwrap();
        let result = activate_impl(&manager, &["mailto:someone@example.com".to_string()]).await;
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }
}

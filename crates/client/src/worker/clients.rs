//! Registry of open page contexts and which generation controls them.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use url::Url;

/// Identifier handed out by [`Clients::register`].
pub type ClientId = u64;

/// One open page context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientInfo {
    pub id: ClientId,
    pub url: Url,
    /// Generation serving this client's fetches, if any.
    pub controller: Option<String>,
}

#[derive(Debug, Default)]
struct Registry {
    next_id: ClientId,
    clients: BTreeMap<ClientId, ClientInfo>,
}

/// Shared client registry. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct Clients {
    inner: Arc<RwLock<Registry>>,
}

impl Clients {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a newly opened page, optionally already controlled.
    pub async fn register(&self, url: Url, controller: Option<String>) -> ClientId {
        let mut registry = self.inner.write().await;
        registry.next_id += 1;
        let id = registry.next_id;
        registry.clients.insert(id, ClientInfo { id, url, controller });
        id
    }

    /// Open clients in registration order.
    pub async fn list(&self) -> Vec<ClientInfo> {
        self.inner.read().await.clients.values().cloned().collect()
    }

    /// Make `generation` the controller of every open client.
    ///
    /// Returns how many clients changed controller.
    pub async fn claim(&self, generation: &str) -> usize {
        let mut registry = self.inner.write().await;
        let mut changed = 0;
        for client in registry.clients.values_mut() {
            if client.controller.as_deref() != Some(generation) {
                client.controller = Some(generation.to_string());
                changed += 1;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(path: &str) -> Url {
        Url::parse("http://localhost:5000").unwrap().join(path).unwrap()
    }

    async fn get(clients: &Clients, id: ClientId) -> ClientInfo {
        clients.list().await.into_iter().find(|c| c.id == id).unwrap()
    }

    #[tokio::test]
    async fn test_register_and_list() {
        let clients = Clients::new();
        let id = clients.register(page("/"), None).await;
        let info = get(&clients, id).await;
        assert_eq!(info.url.as_str(), "http://localhost:5000/");
        assert!(info.controller.is_none());
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let clients = Clients::new();
        let a = clients.register(page("/"), None).await;
        let b = clients.register(page("/chat"), None).await;
        assert_ne!(a, b);
        assert_eq!(clients.list().await.len(), 2);
    }

    #[tokio::test]
    async fn test_claim_takes_over_all_clients() {
        let clients = Clients::new();
        let a = clients.register(page("/"), Some("v0".to_string())).await;
        let b = clients.register(page("/chat"), None).await;
        let c = clients.register(page("/settings"), Some("v1".to_string())).await;

        let changed = clients.claim("v1").await;
        assert_eq!(changed, 2);
        for id in [a, b, c] {
            assert_eq!(get(&clients, id).await.controller.as_deref(), Some("v1"));
        }
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let clients = Clients::new();
        let other = clients.clone();
        clients.register(page("/"), None).await;
        assert_eq!(other.list().await.len(), 1);
    }
}

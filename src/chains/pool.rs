use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Lazily populated per-network client map.
///
/// Clients are created on first use and shared by every later request for the
/// same network id. Concurrent first uses may both build a client; only one is kept.
pub struct ClientPool<C: ?Sized> {
    clients: RwLock<HashMap<u64, Arc<C>>>,
}

impl<C: ?Sized> Default for ClientPool<C> {
    fn default() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
        }
    }
}

impl<C: ?Sized> ClientPool<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, network_id: u64, client: Arc<C>) {
        self.clients.write().insert(network_id, client);
    }

    pub fn get(&self, network_id: u64) -> Option<Arc<C>> {
        self.clients.read().get(&network_id).cloned()
    }

    pub fn get_or_try_init<E, F>(&self, network_id: u64, init: F) -> Result<Arc<C>, E>
    where
        F: FnOnce() -> Result<Arc<C>, E>,
    {
        if let Some(client) = self.get(network_id) {
            return Ok(client);
        }

        let created = init()?;
        let mut clients = self.clients.write();
        Ok(clients.entry(network_id).or_insert(created).clone())
    }

    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_is_created_once() {
        let pool: ClientPool<String> = ClientPool::new();
        let mut calls = 0;

        let first = pool
            .get_or_try_init::<(), _>(1, || {
                calls += 1;
                Ok(Arc::new("mainnet".to_string()))
            })
            .unwrap();
        let second = pool
            .get_or_try_init::<(), _>(1, || {
                calls += 1;
                Ok(Arc::new("other".to_string()))
            })
            .unwrap();

        assert_eq!(calls, 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_failed_init_is_not_cached() {
        let pool: ClientPool<String> = ClientPool::new();

        let err = pool.get_or_try_init(5, || Err("no endpoint"));
        assert_eq!(err.unwrap_err(), "no endpoint");
        assert!(pool.is_empty());

        pool.insert(5, Arc::new("ok".to_string()));
        assert_eq!(pool.get(5).unwrap().as_str(), "ok");
    }
}

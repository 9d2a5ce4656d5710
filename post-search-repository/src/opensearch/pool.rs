//! Connection pool spreading requests over several OpenSearch nodes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use opensearch::http::transport::{Connection, ConnectionPool};
use url::Url;

/// A fixed set of node connections handed out in turn.
///
/// Clones share the cursor, so every copy the transport makes keeps
/// rotating through the same sequence.
#[derive(Debug, Clone)]
pub struct RoundRobinConnectionPool {
    connections: Arc<[Connection]>,
    cursor: Arc<AtomicUsize>,
}

impl RoundRobinConnectionPool {
    /// Create a pool over the given node URLs.
    ///
    /// Returns `None` if `urls` is empty.
    pub fn new(urls: Vec<Url>) -> Option<Self> {
        if urls.is_empty() {
            return None;
        }

        Some(Self {
            connections: urls.into_iter().map(Connection::new).collect(),
            cursor: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Number of nodes in the pool.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    fn next_index(&self) -> usize {
        self.cursor.fetch_add(1, Ordering::Relaxed) % self.connections.len()
    }
}

impl ConnectionPool for RoundRobinConnectionPool {
    fn next(&self) -> Connection {
        self.connections[self.next_index()].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(hosts: &[&str]) -> Vec<Url> {
        hosts.iter().map(|host| Url::parse(host).unwrap()).collect()
    }

    #[test]
    fn test_rejects_empty_host_list() {
        assert!(RoundRobinConnectionPool::new(Vec::new()).is_none());
    }

    #[test]
    fn test_cycles_through_nodes() {
        let pool = RoundRobinConnectionPool::new(urls(&["http://a:9200", "http://b:9200"])).unwrap();
        assert_eq!(pool.len(), 2);

        let order: Vec<usize> = (0..5).map(|_| pool.next_index()).collect();
        assert_eq!(order, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn test_clones_share_cursor() {
        let pool = RoundRobinConnectionPool::new(urls(&[
            "http://a:9200",
            "http://b:9200",
            "http://c:9200",
        ]))
        .unwrap();
        let copy = pool.clone();

        assert_eq!(pool.next_index(), 0);
        assert_eq!(copy.next_index(), 1);
        assert_eq!(pool.next_index(), 2);
        assert_eq!(copy.next_index(), 0);
    }

    #[test]
    fn test_next_hands_out_connections() {
        let pool = RoundRobinConnectionPool::new(urls(&["http://a:9200", "http://b:9200"])).unwrap();

        let first = format!("{:?}", pool.next());
        let second = format!("{:?}", pool.next());
        let third = format!("{:?}", pool.next());

        assert_ne!(first, second);
        assert_eq!(first, third);
    }
}

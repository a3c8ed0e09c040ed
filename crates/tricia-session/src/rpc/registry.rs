//! Locally registered RPC methods.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::transport::RpcHandler;

/// Methods this client answers during the current session.
///
/// Mirrors what was registered on the transport so every method can be
/// unregistered when the session ends.
#[derive(Default)]
pub struct RpcHandlerRegistry {
    handlers: Mutex<HashMap<String, RpcHandler>>,
}

impl RpcHandlerRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `handler` for `method`; returns whether one was replaced.
    pub fn insert(&self, method: &str, handler: RpcHandler) -> bool {
        self.handlers.lock().insert(method.to_string(), handler).is_some()
    }

    /// Forget `method`; returns whether it was registered.
    pub fn remove(&self, method: &str) -> bool {
        self.handlers.lock().remove(method).is_some()
    }

    /// Whether `method` is registered.
    pub fn contains(&self, method: &str) -> bool {
        self.handlers.lock().contains_key(method)
    }

    /// Registered method names, sorted.
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Remove everything, returning the method names.
    pub fn drain(&self) -> Vec<String> {
        self.handlers.lock().drain().map(|(name, _)| name).collect()
    }

    /// Number of registered methods.
    pub fn len(&self) -> usize {
        self.handlers.lock().len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::Arc;

    fn handler() -> RpcHandler {
        Arc::new(|_: crate::transport::RpcInvocation| {
            async { Ok::<_, crate::errors::RpcHandlerError>(String::new()) }.boxed()
        })
    }

    #[test]
    fn insert_replace_drain() {
        let r = RpcHandlerRegistry::new();
        assert!(r.is_empty());
        assert!(!r.insert("b", handler()));
        assert!(!r.insert("a", handler()));
        assert!(r.insert("a", handler()));
        assert_eq!(r.methods(), vec!["a", "b"]);
        assert!(r.contains("b"));

        let mut drained = r.drain();
        drained.sort();
        assert_eq!(drained, vec!["a", "b"]);
        assert_eq!(r.len(), 0);
        assert!(!r.remove("a"));
    }
}

//! Shared laser handles keyed by connection identifier.
//!
//! A physical laser supports one connection, so call sites that must share
//! it (CLI, GUI, scripts in one process) coordinate through an explicit
//! registry instead of a process-wide singleton. The registry is plain data:
//! whoever constructs it decides its scope.

use crate::error::DriverResult;
use crate::laser::DeepSee;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Handle cache mapping connection identifiers to live [`DeepSee`] facades.
#[derive(Default)]
pub struct LaserRegistry {
    lasers: Mutex<HashMap<String, Arc<DeepSee>>>,
}

impl LaserRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing handle for `resource`, if one is registered.
    pub async fn get(&self, resource: &str) -> Option<Arc<DeepSee>> {
        self.lasers.lock().await.get(resource).cloned()
    }

    /// Return the handle registered for `resource`, connecting through
    /// `connect` and registering the result if none exists yet.
    ///
    /// The registry lock is held across `connect`, so two callers racing on
    /// the same resource cannot both open the physical connection.
    pub async fn get_or_connect<F, Fut>(
        &self,
        resource: &str,
        connect: F,
    ) -> DriverResult<Arc<DeepSee>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = DriverResult<DeepSee>>,
    {
        let mut lasers = self.lasers.lock().await;
        if let Some(existing) = lasers.get(resource) {
            debug!("Reusing laser handle for '{resource}'");
            return Ok(existing.clone());
        }
        let laser = Arc::new(connect().await?);
        lasers.insert(resource.to_string(), laser.clone());
        debug!("Registered laser handle for '{resource}'");
        Ok(laser)
    }

    /// Remove and return the handle for `resource`. The caller is
    /// responsible for running the close sequence on the returned facade.
    pub async fn remove(&self, resource: &str) -> Option<Arc<DeepSee>> {
        self.lasers.lock().await.remove(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::laser::WatchdogPolicy;
    use crate::transport::MockTransport;

    async fn fake_laser() -> DriverResult<DeepSee> {
        DeepSee::connect(Box::new(MockTransport::new()), WatchdogPolicy::Disable).await
    }

    #[tokio::test]
    async fn test_second_lookup_reuses_handle() {
        let registry = LaserRegistry::new();
        let first = registry
            .get_or_connect("mock", || fake_laser())
            .await
            .unwrap();
        let second = registry
            .get_or_connect("mock", || async {
                Err(crate::error::DeepSeeError::Transport(
                    "must not reconnect while a handle is registered".into(),
                ))
            })
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_remove_forgets_handle() {
        let registry = LaserRegistry::new();
        registry
            .get_or_connect("mock", || fake_laser())
            .await
            .unwrap();
        assert!(registry.remove("mock").await.is_some());
        assert!(registry.get("mock").await.is_none());
    }

    #[tokio::test]
    async fn test_distinct_resources_get_distinct_handles() {
        let registry = LaserRegistry::new();
        let a = registry
            .get_or_connect("mock-a", || fake_laser())
            .await
            .unwrap();
        let b = registry
            .get_or_connect("mock-b", || fake_laser())
            .await
            .unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }
}

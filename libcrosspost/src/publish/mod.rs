//! Platform publisher contract and collaborator interfaces
//!
//! Publishers are external collaborators satisfying one uniform contract.
//! The engine never looks a publisher up through ambient global state: the
//! full set is enumerated at process startup into a [`PublisherRegistry`]
//! and passed by reference.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::PublishError;
use crate::types::{Credentials, Platform, Profile, ResolvedMedia};

pub mod mock;

/// Everything a publisher needs for one platform call.
#[derive(Debug, Clone)]
pub struct PublishPayload {
    pub content: String,
    pub media: Vec<ResolvedMedia>,
    /// Platform post id of the immediately preceding chunk when replying
    /// within a thread chain
    pub in_reply_to: Option<String>,
}

/// What the platform reported back for a successful publish.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishOutcome {
    pub platform_post_id: String,
    pub url: Option<String>,
}

/// Uniform publish contract, one implementation per platform.
///
/// Implementations own their own timeouts and multi-step upload protocols;
/// the executor only sees the final outcome. Any failure, including rate
/// limiting, must surface as a [`PublishError`].
#[async_trait]
pub trait Publisher: Send + Sync {
    fn platform(&self) -> Platform;

    async fn publish(
        &self,
        credentials: &Credentials,
        payload: PublishPayload,
    ) -> Result<PublishOutcome, PublishError>;
}

/// External collaborator that decrypts a profile's stored connection into
/// usable credentials. Callers resolve immediately before the publish calls
/// a destination needs and drop the result right after.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(&self, profile: &Profile) -> Result<Credentials, PublishError>;
}

/// External collaborator that turns media ids into concrete descriptors.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(&self, ids: &[String]) -> crate::Result<Vec<ResolvedMedia>>;
}

/// Closed platform-to-publisher binding, built once at startup.
pub struct PublisherRegistry {
    publishers: HashMap<Platform, Arc<dyn Publisher>>,
}

impl PublisherRegistry {
    /// Build the registry from an enumerated publisher set. A platform
    /// bound twice is a construction error.
    pub fn new(publishers: Vec<Arc<dyn Publisher>>) -> crate::Result<Self> {
        let mut map: HashMap<Platform, Arc<dyn Publisher>> = HashMap::new();
        for publisher in publishers {
            let platform = publisher.platform();
            if map.insert(platform, publisher).is_some() {
                return Err(crate::CrosspostError::InvalidInput(format!(
                    "Publisher for {} registered twice",
                    platform
                )));
            }
        }
        Ok(Self { publishers: map })
    }

    pub fn get(&self, platform: Platform) -> Result<&Arc<dyn Publisher>, PublishError> {
        self.publishers
            .get(&platform)
            .ok_or_else(|| PublishError::UnknownPlatform(platform.to_string()))
    }

    /// Verify every listed platform has a binding; called at startup so a
    /// missing publisher fails construction, not a publish pass.
    pub fn ensure_bound(&self, platforms: &[Platform]) -> crate::Result<()> {
        for platform in platforms {
            if !self.publishers.contains_key(platform) {
                return Err(crate::CrosspostError::Publish(
                    PublishError::UnknownPlatform(platform.to_string()),
                ));
            }
        }
        Ok(())
    }

    pub fn platforms(&self) -> Vec<Platform> {
        self.publishers.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockPublisher;
    use super::*;

    #[test]
    fn test_registry_construction() {
        let registry = PublisherRegistry::new(vec![
            Arc::new(MockPublisher::success(Platform::Twitter)),
            Arc::new(MockPublisher::success(Platform::Linkedin)),
        ])
        .unwrap();

        assert!(registry.get(Platform::Twitter).is_ok());
        assert!(registry.get(Platform::Linkedin).is_ok());
    }

    #[test]
    fn test_registry_duplicate_binding_rejected() {
        let result = PublisherRegistry::new(vec![
            Arc::new(MockPublisher::success(Platform::Twitter)),
            Arc::new(MockPublisher::success(Platform::Twitter)),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_registry_unknown_platform() {
        let registry =
            PublisherRegistry::new(vec![Arc::new(MockPublisher::success(Platform::Twitter))])
                .unwrap();

        let err = registry.get(Platform::Instagram).err().unwrap();
        assert!(matches!(err, PublishError::UnknownPlatform(_)));
    }

    #[test]
    fn test_ensure_bound() {
        let registry =
            PublisherRegistry::new(vec![Arc::new(MockPublisher::success(Platform::Twitter))])
                .unwrap();

        assert!(registry.ensure_bound(&[Platform::Twitter]).is_ok());
        assert!(registry
            .ensure_bound(&[Platform::Twitter, Platform::Facebook])
            .is_err());
    }
}

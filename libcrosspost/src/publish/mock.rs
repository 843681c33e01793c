//! Mock publisher implementation for testing
//!
//! A configurable publisher that can simulate successes, platform failures,
//! rate limiting, latency, and broken reply chains. Available in all builds
//! so integration tests can exercise the executor without credentials or
//! network access.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::PublishError;
use crate::publish::{PublishOutcome, PublishPayload, Publisher};
use crate::types::{Credentials, Platform};

/// One recorded publish call, for verification
#[derive(Debug, Clone)]
pub struct RecordedPublish {
    pub content: String,
    pub media_count: usize,
    pub in_reply_to: Option<String>,
}

/// Configuration for mock publisher behavior
#[derive(Clone)]
pub struct MockPublisherConfig {
    pub platform: Platform,

    /// Error returned on every call, if set
    pub error: Option<PublishError>,

    /// Fail starting from this 1-based call number (None = never)
    pub fail_from_call: Option<usize>,

    /// Return an empty platform post id starting from this 1-based call
    /// number, to exercise broken-chain handling
    pub empty_id_from_call: Option<usize>,

    /// Delay before completing each call (simulates network latency)
    pub delay: Duration,
}

impl MockPublisherConfig {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            error: None,
            fail_from_call: None,
            empty_id_from_call: None,
            delay: Duration::from_millis(0),
        }
    }
}

/// Mock publisher for testing
pub struct MockPublisher {
    config: MockPublisherConfig,
    call_count: AtomicUsize,
    published: Arc<Mutex<Vec<RecordedPublish>>>,
}

impl MockPublisher {
    pub fn new(config: MockPublisherConfig) -> Self {
        Self {
            config,
            call_count: AtomicUsize::new(0),
            published: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A publisher that always succeeds
    pub fn success(platform: Platform) -> Self {
        Self::new(MockPublisherConfig::new(platform))
    }

    /// A publisher that always fails with a platform error
    pub fn failing(platform: Platform, error: &str) -> Self {
        let mut config = MockPublisherConfig::new(platform);
        config.error = Some(PublishError::Platform(error.to_string()));
        Self::new(config)
    }

    /// A publisher that always reports rate limiting
    pub fn rate_limited(platform: Platform) -> Self {
        let mut config = MockPublisherConfig::new(platform);
        config.error = Some(PublishError::RateLimit(
            "429 Too Many Requests".to_string(),
        ));
        Self::new(config)
    }

    /// A publisher that succeeds, then fails from the given 1-based call
    pub fn failing_from_call(platform: Platform, call: usize) -> Self {
        let mut config = MockPublisherConfig::new(platform);
        config.fail_from_call = Some(call);
        Self::new(config)
    }

    /// A publisher that returns an empty platform post id from the given
    /// 1-based call
    pub fn empty_id_from_call(platform: Platform, call: usize) -> Self {
        let mut config = MockPublisherConfig::new(platform);
        config.empty_id_from_call = Some(call);
        Self::new(config)
    }

    /// A publisher with simulated latency
    pub fn with_delay(platform: Platform, delay: Duration) -> Self {
        let mut config = MockPublisherConfig::new(platform);
        config.delay = delay;
        Self::new(config)
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Every payload published so far, in call order
    pub fn published(&self) -> Vec<RecordedPublish> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    fn platform(&self) -> Platform {
        self.config.platform
    }

    async fn publish(
        &self,
        _credentials: &Credentials,
        payload: PublishPayload,
    ) -> Result<PublishOutcome, PublishError> {
        let call = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        if let Some(error) = &self.config.error {
            return Err(error.clone());
        }

        if let Some(from) = self.config.fail_from_call {
            if call >= from {
                return Err(PublishError::Platform(format!(
                    "mock failure on call {}",
                    call
                )));
            }
        }

        self.published.lock().unwrap().push(RecordedPublish {
            content: payload.content.clone(),
            media_count: payload.media.len(),
            in_reply_to: payload.in_reply_to.clone(),
        });

        if let Some(from) = self.config.empty_id_from_call {
            if call >= from {
                return Ok(PublishOutcome {
                    platform_post_id: String::new(),
                    url: None,
                });
            }
        }

        let post_id = format!("{}:mock-{}", self.config.platform, call);
        Ok(PublishOutcome {
            url: Some(format!(
                "https://{}.example.com/posts/{}",
                self.config.platform, call
            )),
            platform_post_id: post_id,
        })
    }
}

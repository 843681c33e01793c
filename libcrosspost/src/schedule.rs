//! Schedule resolution
//!
//! Computes the effective publish instant for an authoring request: an
//! explicit UTC instant, a naive local time converted through an IANA
//! timezone, or a slot delegated to the external slot finder. Times earlier
//! than a small grace window behind now are rejected.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use std::sync::Arc;

use crate::error::ScheduleError;
use crate::types::PostStatus;

/// How far in the past a scheduled time may be and still be accepted
pub const GRACE_WINDOW_SECS: i64 = 300;

/// External collaborator that assigns the next free posting slot for a
/// workspace when auto-scheduling is requested.
#[async_trait]
pub trait SlotFinder: Send + Sync {
    async fn next_free_slot(&self, workspace_id: &str)
        -> Result<DateTime<Utc>, ScheduleError>;
}

/// When the author wants the post to go out
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleTime {
    /// Explicit instant with a UTC marker
    Utc(DateTime<Utc>),
    /// Wall-clock time to be interpreted in the request's timezone
    Local(NaiveDateTime),
}

#[derive(Debug, Clone, Default)]
pub struct ScheduleRequest {
    pub when: Option<ScheduleTime>,
    /// IANA timezone name, required when `when` is a local time
    pub timezone: Option<String>,
    /// Delegate the instant to the slot finder
    pub auto_schedule: bool,
    /// Approval gates publication regardless of the time
    pub requires_approval: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSchedule {
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: PostStatus,
}

pub struct ScheduleResolver {
    slots: Arc<dyn SlotFinder>,
    grace_window: Duration,
}

impl ScheduleResolver {
    pub fn new(slots: Arc<dyn SlotFinder>) -> Self {
        Self {
            slots,
            grace_window: Duration::seconds(GRACE_WINDOW_SECS),
        }
    }

    pub fn with_grace_window(mut self, secs: i64) -> Self {
        self.grace_window = Duration::seconds(secs);
        self
    }

    pub async fn resolve(
        &self,
        workspace_id: &str,
        request: &ScheduleRequest,
    ) -> Result<ResolvedSchedule, ScheduleError> {
        self.resolve_at(workspace_id, request, Utc::now()).await
    }

    /// Resolution with an explicit `now`, for deterministic tests
    pub async fn resolve_at(
        &self,
        workspace_id: &str,
        request: &ScheduleRequest,
        now: DateTime<Utc>,
    ) -> Result<ResolvedSchedule, ScheduleError> {
        let target = if request.auto_schedule {
            Some(self.slots.next_free_slot(workspace_id).await?)
        } else {
            match &request.when {
                None => None,
                Some(ScheduleTime::Utc(instant)) => Some(*instant),
                Some(ScheduleTime::Local(naive)) => {
                    Some(convert_local(naive, request.timezone.as_deref())?)
                }
            }
        };

        if let Some(instant) = target {
            if instant < now - self.grace_window {
                return Err(ScheduleError::InPast {
                    scheduled: instant.timestamp(),
                });
            }
        }

        // Approval overrides any time-derived status
        let status = if request.requires_approval {
            PostStatus::PendingApproval
        } else if target.is_some() {
            PostStatus::Scheduled
        } else {
            PostStatus::Draft
        };

        Ok(ResolvedSchedule {
            scheduled_at: target,
            status,
        })
    }
}

fn convert_local(
    naive: &NaiveDateTime,
    timezone: Option<&str>,
) -> Result<DateTime<Utc>, ScheduleError> {
    let name = timezone.ok_or_else(|| {
        ScheduleError::UnknownTimezone("no timezone supplied for a local time".to_string())
    })?;

    let tz: chrono_tz::Tz = name
        .parse()
        .map_err(|_| ScheduleError::UnknownTimezone(name.to_string()))?;

    tz.from_local_datetime(naive)
        .single()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| ScheduleError::AmbiguousLocalTime {
            local: naive.to_string(),
            timezone: name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    struct FixedSlot(DateTime<Utc>);

    #[async_trait]
    impl SlotFinder for FixedSlot {
        async fn next_free_slot(
            &self,
            _workspace_id: &str,
        ) -> Result<DateTime<Utc>, ScheduleError> {
            Ok(self.0)
        }
    }

    struct NoSlots;

    #[async_trait]
    impl SlotFinder for NoSlots {
        async fn next_free_slot(
            &self,
            _workspace_id: &str,
        ) -> Result<DateTime<Utc>, ScheduleError> {
            Err(ScheduleError::SlotUnavailable("calendar full".to_string()))
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    fn resolver() -> ScheduleResolver {
        ScheduleResolver::new(Arc::new(NoSlots))
    }

    #[tokio::test]
    async fn test_no_time_is_draft() {
        let resolved = resolver()
            .resolve_at("ws", &ScheduleRequest::default(), now())
            .await
            .unwrap();
        assert_eq!(resolved.scheduled_at, None);
        assert_eq!(resolved.status, PostStatus::Draft);
    }

    #[tokio::test]
    async fn test_explicit_utc_time() {
        let at = now() + Duration::hours(2);
        let request = ScheduleRequest {
            when: Some(ScheduleTime::Utc(at)),
            ..Default::default()
        };

        let resolved = resolver().resolve_at("ws", &request, now()).await.unwrap();
        assert_eq!(resolved.scheduled_at, Some(at));
        assert_eq!(resolved.status, PostStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_local_time_converted_through_timezone() {
        // 15:00 in New York (EST, UTC-5) on a winter date is 20:00 UTC
        let local = NaiveDate::from_ymd_opt(2026, 12, 10)
            .unwrap()
            .and_hms_opt(15, 0, 0)
            .unwrap();
        let request = ScheduleRequest {
            when: Some(ScheduleTime::Local(local)),
            timezone: Some("America/New_York".to_string()),
            ..Default::default()
        };

        let resolved = resolver().resolve_at("ws", &request, now()).await.unwrap();
        let expected = Utc.with_ymd_and_hms(2026, 12, 10, 20, 0, 0).unwrap();
        assert_eq!(resolved.scheduled_at, Some(expected));
    }

    #[tokio::test]
    async fn test_local_time_without_timezone_rejected() {
        let local = NaiveDate::from_ymd_opt(2026, 12, 10)
            .unwrap()
            .and_hms_opt(15, 0, 0)
            .unwrap();
        let request = ScheduleRequest {
            when: Some(ScheduleTime::Local(local)),
            timezone: None,
            ..Default::default()
        };

        let result = resolver().resolve_at("ws", &request, now()).await;
        assert!(matches!(result, Err(ScheduleError::UnknownTimezone(_))));
    }

    #[tokio::test]
    async fn test_unknown_timezone_rejected() {
        let local = NaiveDate::from_ymd_opt(2026, 12, 10)
            .unwrap()
            .and_hms_opt(15, 0, 0)
            .unwrap();
        let request = ScheduleRequest {
            when: Some(ScheduleTime::Local(local)),
            timezone: Some("Mars/Olympus_Mons".to_string()),
            ..Default::default()
        };

        let result = resolver().resolve_at("ws", &request, now()).await;
        assert_eq!(
            result.unwrap_err(),
            ScheduleError::UnknownTimezone("Mars/Olympus_Mons".to_string())
        );
    }

    #[tokio::test]
    async fn test_nonexistent_local_time_rejected() {
        // 02:30 on the US spring-forward date does not exist
        let local = NaiveDate::from_ymd_opt(2026, 3, 8)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        let request = ScheduleRequest {
            when: Some(ScheduleTime::Local(local)),
            timezone: Some("America/New_York".to_string()),
            ..Default::default()
        };

        let result = resolver()
            .resolve_at("ws", &request, now() - Duration::days(60))
            .await;
        assert!(matches!(
            result,
            Err(ScheduleError::AmbiguousLocalTime { .. })
        ));
    }

    #[tokio::test]
    async fn test_past_time_rejected() {
        let at = now() - Duration::hours(1);
        let request = ScheduleRequest {
            when: Some(ScheduleTime::Utc(at)),
            ..Default::default()
        };

        let result = resolver().resolve_at("ws", &request, now()).await;
        assert!(matches!(result, Err(ScheduleError::InPast { .. })));
    }

    #[tokio::test]
    async fn test_time_within_grace_window_accepted() {
        // Two minutes ago is inside the five-minute grace window
        let at = now() - Duration::minutes(2);
        let request = ScheduleRequest {
            when: Some(ScheduleTime::Utc(at)),
            ..Default::default()
        };

        let resolved = resolver().resolve_at("ws", &request, now()).await.unwrap();
        assert_eq!(resolved.status, PostStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_approval_overrides_scheduled_status() {
        let at = now() + Duration::hours(1);
        let request = ScheduleRequest {
            when: Some(ScheduleTime::Utc(at)),
            requires_approval: true,
            ..Default::default()
        };

        let resolved = resolver().resolve_at("ws", &request, now()).await.unwrap();
        assert_eq!(resolved.status, PostStatus::PendingApproval);
        assert_eq!(resolved.scheduled_at, Some(at));
    }

    #[tokio::test]
    async fn test_auto_schedule_delegates_to_slot_finder() {
        let slot = now() + Duration::hours(6);
        let resolver = ScheduleResolver::new(Arc::new(FixedSlot(slot)));
        let request = ScheduleRequest {
            auto_schedule: true,
            ..Default::default()
        };

        let resolved = resolver.resolve_at("ws", &request, now()).await.unwrap();
        assert_eq!(resolved.scheduled_at, Some(slot));
        assert_eq!(resolved.status, PostStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_auto_schedule_slot_unavailable() {
        let request = ScheduleRequest {
            auto_schedule: true,
            ..Default::default()
        };

        let result = resolver().resolve_at("ws", &request, now()).await;
        assert!(matches!(result, Err(ScheduleError::SlotUnavailable(_))));
    }
}

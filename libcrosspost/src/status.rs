//! Master post status aggregation
//!
//! Recomputes a post's status from the set of its destination statuses.
//! Idempotent; the post status column is the only thing written, so the
//! executor can call it after every pass.

use crate::db::Database;
use crate::error::Result;
use crate::types::{DestinationStatus, PostStatus};

/// Recompute and persist the post status. Returns the new status.
pub async fn recompute(db: &Database, post_id: &str) -> Result<PostStatus> {
    let statuses = db.destination_statuses(post_id).await?;
    let status = aggregate(&statuses);
    db.update_post_status(post_id, status).await?;
    Ok(status)
}

/// Status precedence: outstanding work, then full success, then the
/// success/failure mix, then total failure.
pub fn aggregate(statuses: &[DestinationStatus]) -> PostStatus {
    if statuses.is_empty() {
        return PostStatus::Failed;
    }

    let outstanding = statuses.iter().any(|s| {
        matches!(
            s,
            DestinationStatus::Scheduled | DestinationStatus::Publishing
        )
    });
    if outstanding {
        return PostStatus::Publishing;
    }

    let succeeded = statuses
        .iter()
        .filter(|s| **s == DestinationStatus::Success)
        .count();

    if succeeded == statuses.len() {
        PostStatus::Published
    } else if succeeded > 0 {
        PostStatus::Partial
    } else {
        PostStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use DestinationStatus::{Failed, Publishing, Scheduled, Success};

    #[test]
    fn test_all_success_is_published() {
        assert_eq!(aggregate(&[Success, Success, Success]), PostStatus::Published);
        assert_eq!(aggregate(&[Success]), PostStatus::Published);
    }

    #[test]
    fn test_mix_is_partial() {
        assert_eq!(aggregate(&[Success, Failed]), PostStatus::Partial);
        assert_eq!(aggregate(&[Failed, Success, Success]), PostStatus::Partial);
    }

    #[test]
    fn test_all_failed_is_failed() {
        assert_eq!(aggregate(&[Failed, Failed]), PostStatus::Failed);
        assert_eq!(aggregate(&[Failed]), PostStatus::Failed);
    }

    #[test]
    fn test_outstanding_work_wins_regardless_of_mix() {
        assert_eq!(aggregate(&[Scheduled, Success, Failed]), PostStatus::Publishing);
        assert_eq!(aggregate(&[Publishing, Failed]), PostStatus::Publishing);
        assert_eq!(aggregate(&[Publishing, Success]), PostStatus::Publishing);
        assert_eq!(aggregate(&[Scheduled]), PostStatus::Publishing);
    }

    #[test]
    fn test_no_destinations_is_failed() {
        assert_eq!(aggregate(&[]), PostStatus::Failed);
    }

    #[test]
    fn test_aggregate_is_pure() {
        let statuses = [Success, Failed];
        assert_eq!(aggregate(&statuses), aggregate(&statuses));
    }
}

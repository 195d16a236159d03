//! Bucket Status Resolution
//!
//! Classifies a fetched bucket for a caller. Checks run in a fixed order:
//! existence, owner, deactivation, then expiry.

use solana_sdk::pubkey::Pubkey;

use super::accounts::{HotReserveBucket, HotReserveBucketStatus};
use super::StatusError;

/// Lifecycle of a caller's bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketStatus {
    NotFound,
    Activated,
    Expired,
    Deactivated,
    /// Bucket exists but belongs to someone else
    WrongOwner { owner: Pubkey },
}

impl BucketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BucketStatus::NotFound => "not_found",
            BucketStatus::Activated => "activated",
            BucketStatus::Expired => "expired",
            BucketStatus::Deactivated => "deactivated",
            BucketStatus::WrongOwner { .. } => "wrong_owner",
        }
    }

    /// A deposit can go to this bucket right now
    pub fn is_usable(&self) -> bool {
        matches!(self, BucketStatus::Activated)
    }

    /// The caller can fix this with a reactivate instruction
    pub fn needs_reactivation(&self) -> bool {
        matches!(self, BucketStatus::Expired | BucketStatus::Deactivated)
    }
}

/// Pick the bucket registered under `guardian_setting`
///
/// Several buckets can share one Bitcoin key across guardian settings.
/// An empty list is `Ok(None)`; a non-empty list with no match is an error.
pub fn select_bucket_for_guardian<'a>(
    buckets: &'a [HotReserveBucket],
    guardian_setting: &Pubkey,
) -> Result<Option<&'a HotReserveBucket>, StatusError> {
    if buckets.is_empty() {
        return Ok(None);
    }

    buckets
        .iter()
        .find(|b| b.guardian_setting == *guardian_setting)
        .map(Some)
        .ok_or(StatusError::GuardianSettingMismatch {
            expected: *guardian_setting,
            found: buckets.len(),
        })
}

/// Resolve the status of `bucket` for `caller` at `now` (unix seconds)
pub fn resolve_bucket_status(
    bucket: Option<&HotReserveBucket>,
    caller: &Pubkey,
    now: u64,
) -> BucketStatus {
    let Some(bucket) = bucket else {
        return BucketStatus::NotFound;
    };

    if bucket.owner != *caller {
        return BucketStatus::WrongOwner {
            owner: bucket.owner,
        };
    }
    if bucket.status == HotReserveBucketStatus::Deactivated {
        return BucketStatus::Deactivated;
    }
    if now > bucket.expired_at {
        return BucketStatus::Expired;
    }
    BucketStatus::Activated
}

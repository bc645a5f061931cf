use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A user document, as far as the referral flow is concerned.
///
/// Users are provisioned by account signup, which happens outside this
/// crate. Only the fields below are ever read or written here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    /// Unique identifier for the `User`
    ///
    /// Assigned by the identity provider; opaque to this service.
    pub user_id: Uuid,
    /// This user's own shareable referral code
    ///
    /// Assigned at signup, or lazily when the user is first referred
    /// without one.
    pub referral_code: Option<String>,
    /// The user who referred this one
    ///
    /// Write-once: set by a successful referral application and never
    /// changed afterwards. Also never equal to `user_id`.
    pub referred_by: Option<Uuid>,
    /// When the referral link was applied
    pub referred_at: Option<DateTime<Utc>>,
    /// When the account was created
    ///
    /// `None` on legacy documents; the account-age check is skipped for
    /// those.
    pub created_at: Option<DateTime<Utc>>,
    /// All-time points balance
    pub total_count: u64,
    /// Points accrued in the current month
    pub month_count: u64,
    /// Number of users this user has successfully referred
    pub referral_count: u32,
}

impl User {
    /// A user as signup leaves it: no referral link, empty balances.
    pub fn new(user_id: Uuid, created_at: Option<DateTime<Utc>>) -> Self {
        Self {
            user_id,
            referral_code: None,
            referred_by: None,
            referred_at: None,
            created_at,
            total_count: 0,
            month_count: 0,
            referral_count: 0,
        }
    }
}

/// A referral code document, keyed in the store by the literal code string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferralCode {
    /// The code itself, casing preserved
    pub code: String,
    /// The user who owns this code
    ///
    /// A document missing its owner cannot be resolved to a referrer.
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    /// Lowercase form of `code`
    ///
    /// Secondary index for case-insensitive lookup when the literal key
    /// misses.
    pub normalized: String,
}

impl ReferralCode {
    pub fn new(code: String, user_id: Uuid, created_at: DateTime<Utc>) -> Self {
        let normalized = code.to_lowercase();
        Self {
            code,
            user_id: Some(user_id),
            created_at,
            normalized,
        }
    }
}

/// Audit record written exactly once per successful referral application.
///
/// Never updated or deleted by this flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferralEvent {
    /// The code as stored, which may differ in casing from what the
    /// caller typed
    pub referral_code: String,
    pub referrer_id: Uuid,
    pub referred_id: Uuid,
    pub points_awarded: u32,
    pub created_at: DateTime<Utc>,
}

/// What a referral application came to.
///
/// Expected business negatives are values, not errors: the wire contract
/// is `{applied, reason?}` and the calling UI keys localized messages off
/// the reason discriminator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Both parties were credited and the audit record written.
    Applied,
    /// A business rule declined the referral; nothing was written.
    Rejected(RejectReason),
}

impl Outcome {
    /// The `applied` field of the wire response.
    pub fn applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }

    /// The `reason` field of the wire response; `None` when applied.
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            Outcome::Applied => None,
            Outcome::Rejected(reason) => Some(reason.as_str()),
        }
    }
}

/// Why a referral application was declined.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// The code belongs to the caller themselves
    SelfReferral,
    /// `referred_by` is already set; the link is write-once
    AlreadyReferred,
    /// The caller's account is older than the configured window
    AccountTooOld,
    /// The code's owner document no longer exists
    ReferrerNotFound,
    /// The referrer reached the configured referral cap
    ReferrerLimit,
}

impl RejectReason {
    /// Machine-readable discriminator, stable on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::SelfReferral => "self_referral",
            RejectReason::AlreadyReferred => "already_referred",
            RejectReason::AccountTooOld => "account_too_old",
            RejectReason::ReferrerNotFound => "referrer_not_found",
            RejectReason::ReferrerLimit => "referrer_limit",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;
    use speculoos::prelude::*;

    #[rstest]
    #[case(RejectReason::SelfReferral, "self_referral")]
    #[case(RejectReason::AlreadyReferred, "already_referred")]
    #[case(RejectReason::AccountTooOld, "account_too_old")]
    #[case(RejectReason::ReferrerNotFound, "referrer_not_found")]
    #[case(RejectReason::ReferrerLimit, "referrer_limit")]
    fn test_reason_wire_strings(#[case] reason: RejectReason, #[case] expected: &'static str) {
        // GIVEN a declined outcome

        // WHEN mapping it onto the wire
        let outcome = Outcome::Rejected(reason);

        // THEN it reads as not applied with a stable discriminator
        assert_that!(outcome.applied()).is_false();
        assert_that!(outcome.reason()).is_some().is_equal_to(expected);
    }

    #[test]
    fn test_applied_has_no_reason() {
        assert_that!(Outcome::Applied.applied()).is_true();
        assert_that!(Outcome::Applied.reason()).is_none();
    }

    #[test]
    fn test_new_code_is_normalized() {
        let owner = Uuid::new_v4();

        let code = ReferralCode::new("Xy9Zqw12".to_string(), owner, Utc::now());

        assert_that!(code.code).is_equal_to("Xy9Zqw12".to_string());
        assert_that!(code.normalized).is_equal_to("xy9zqw12".to_string());
        assert_that!(code.user_id).is_some().is_equal_to(owner);
    }
}

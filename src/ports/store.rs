use std::borrow::Cow;

use uuid::Uuid;

use crate::domain::{ReferralCode, User};

/// Document store backing the referral flow.
///
/// The first two methods are plain point reads used to resolve a code to
/// its referrer; they run outside any transaction and may be stale. The
/// snapshot/commit pair is the transactional half: `read_users` observes a
/// revision per document, and `commit_referral` applies the whole write set
/// only if those revisions still hold, so the caller can drive a bounded
/// optimistic retry loop and re-validate business rules on every attempt.
#[mockall::automock]
#[async_trait::async_trait]
pub trait StorePort {
    /// Point read of a referral code document by its literal key.
    async fn get_code(&self, code: &str) -> Result<Option<ReferralCode>, Error>;

    /// Lookup on the lowercase `normalized` field, first match only.
    async fn find_code_normalized(&self, normalized: &str)
        -> Result<Option<ReferralCode>, Error>;

    /// Snapshot both user documents together with their current revisions.
    ///
    /// A document that does not exist reads as `None`. The revisions are
    /// the preconditions for [`StorePort::commit_referral`].
    async fn read_users(&self, caller: Uuid, referrer: Uuid) -> Result<ReferralSnapshot, Error>;

    /// Atomically apply the full referral write set.
    ///
    /// The store must reject the commit with [`Error::Conflict`], writing
    /// nothing, when either document's revision moved since the snapshot
    /// or when `new_code` names a key that already exists. Timestamps are
    /// assigned by the store at commit time; point totals are incremented
    /// from the deltas carried in the commit.
    async fn commit_referral(&self, commit: ReferralCommit) -> Result<(), Error>;
}

/// A user document and the revision observed when it was read.
#[derive(Clone, Debug)]
pub struct VersionedUser {
    pub user: User,
    pub revision: u64,
}

/// Transactional snapshot of the two documents a referral touches.
#[derive(Clone, Debug)]
pub struct ReferralSnapshot {
    pub caller: Option<VersionedUser>,
    pub referrer: Option<VersionedUser>,
}

/// The write set of one successful referral application.
///
/// Carries deltas and observed revisions, never computed totals: the store
/// resolves final values and stamps timestamps when the commit lands.
#[derive(Clone, Debug)]
pub struct ReferralCommit {
    /// The referred user
    pub caller: Uuid,
    pub caller_revision: u64,
    /// The owner of the matched code
    pub referrer: Uuid,
    pub referrer_revision: u64,
    /// Points credited to `total_count` and `month_count` on both sides
    pub points: u32,
    /// Referral code to create for a caller who lacks one
    ///
    /// Created as a new [`ReferralCode`] document and set on the caller in
    /// the same commit; a taken key fails the whole commit.
    pub new_code: Option<String>,
    /// The matched code in its stored casing, recorded on the audit event
    pub code: String,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The commit raced a concurrent write and nothing was applied.
    ///
    /// Retryable: take a fresh snapshot and re-validate.
    #[error("transaction conflict: {0}")]
    Conflict(Cow<'static, str>),

    /// Concrete adapter errors
    ///
    /// This could represent any errors from a concrete adapter that is not
    /// part of the domain model, such as connectivity, configuration, or
    /// permission errors.
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}

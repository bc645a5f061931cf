use crate::{
    domain::{ReferralCode, ReferralEvent, User},
    ports::store::{Error, ReferralCommit, ReferralSnapshot, StorePort, VersionedUser},
};
use chrono::Utc;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};
use uuid::Uuid;

/// In-memory document store with optimistic transactions.
///
/// Backs the command tests and local runs. Every committed write bumps the
/// touched documents' revisions, and [`StorePort::commit_referral`] checks
/// the revisions it was handed before applying anything, all under one
/// lock. Commits are all-or-nothing, and concurrent commits against the
/// same documents serialize.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    /// User documents with their current revision
    users: HashMap<Uuid, (User, u64)>,
    /// Referral code documents, keyed by the literal code string
    codes: HashMap<String, ReferralCode>,
    /// Append-only audit log
    events: Vec<ReferralEvent>,
}

impl MemoryStore {
    /// Seed a user document at revision zero.
    pub fn insert_user(&self, user: User) -> Result<(), Error> {
        let mut inner = self.inner.lock()?;
        inner.users.insert(user.user_id, (user, 0));
        Ok(())
    }

    /// Seed a referral code document.
    pub fn insert_code(&self, code: ReferralCode) -> Result<(), Error> {
        let mut inner = self.inner.lock()?;
        inner.codes.insert(code.code.clone(), code);
        Ok(())
    }

    /// Current state of a user document.
    pub fn user(&self, user_id: Uuid) -> Result<Option<User>, Error> {
        let inner = self.inner.lock()?;
        Ok(inner.users.get(&user_id).map(|(user, _)| user.clone()))
    }

    /// Current state of a referral code document.
    pub fn code(&self, code: &str) -> Result<Option<ReferralCode>, Error> {
        let inner = self.inner.lock()?;
        Ok(inner.codes.get(code).cloned())
    }

    /// Every audit event recorded so far, in commit order.
    pub fn events(&self) -> Result<Vec<ReferralEvent>, Error> {
        let inner = self.inner.lock()?;
        Ok(inner.events.clone())
    }
}

#[async_trait::async_trait]
impl StorePort for MemoryStore {
    async fn get_code(&self, code: &str) -> Result<Option<ReferralCode>, Error> {
        let inner = self.inner.lock()?;
        Ok(inner.codes.get(code).cloned())
    }

    async fn find_code_normalized(
        &self,
        normalized: &str,
    ) -> Result<Option<ReferralCode>, Error> {
        let inner = self.inner.lock()?;
        let record = inner
            .codes
            .values()
            .find(|record| record.normalized == normalized);
        Ok(record.cloned())
    }

    async fn read_users(&self, caller: Uuid, referrer: Uuid) -> Result<ReferralSnapshot, Error> {
        let inner = self.inner.lock()?;
        let read = |user_id: Uuid| {
            inner
                .users
                .get(&user_id)
                .map(|(user, revision)| VersionedUser {
                    user: user.clone(),
                    revision: *revision,
                })
        };

        Ok(ReferralSnapshot {
            caller: read(caller),
            referrer: read(referrer),
        })
    }

    async fn commit_referral(&self, commit: ReferralCommit) -> Result<(), Error> {
        let mut inner = self.inner.lock()?;

        // Validate every precondition before touching anything, so a failed
        // commit leaves no partial writes behind.
        let mut caller = match inner.users.get(&commit.caller) {
            Some((user, revision)) if *revision == commit.caller_revision => user.clone(),
            _ => {
                return Err(Error::Conflict(
                    "caller document changed since snapshot".into(),
                ))
            }
        };
        let mut referrer = match inner.users.get(&commit.referrer) {
            Some((user, revision)) if *revision == commit.referrer_revision => user.clone(),
            _ => {
                return Err(Error::Conflict(
                    "referrer document changed since snapshot".into(),
                ))
            }
        };
        if let Some(code) = &commit.new_code {
            if inner.codes.contains_key(code) {
                return Err(Error::Conflict("referral code key already taken".into()));
            }
        }

        // One commit instant stamped on every record written, as a
        // server-assigned timestamp would be.
        let now = Utc::now();

        caller.referred_by = Some(commit.referrer);
        caller.referred_at = Some(now);
        caller.total_count += u64::from(commit.points);
        caller.month_count += u64::from(commit.points);
        if let Some(code) = &commit.new_code {
            caller.referral_code = Some(code.clone());
            inner
                .codes
                .insert(code.clone(), ReferralCode::new(code.clone(), commit.caller, now));
        }

        referrer.total_count += u64::from(commit.points);
        referrer.month_count += u64::from(commit.points);
        referrer.referral_count += 1;

        inner
            .users
            .insert(commit.caller, (caller, commit.caller_revision + 1));
        inner
            .users
            .insert(commit.referrer, (referrer, commit.referrer_revision + 1));
        inner.events.push(ReferralEvent {
            referral_code: commit.code,
            referrer_id: commit.referrer,
            referred_id: commit.caller,
            points_awarded: commit.points,
            created_at: now,
        });

        Ok(())
    }
}

/// Erased [`PoisonError`]
///
/// `PoisonError` keeps the `MutexGuard` internally, which is not send. Thus
/// we erase the error and only keep the string representation instead.
#[derive(Debug, thiserror::Error)]
#[error("poison error: {0}")]
pub struct ErasedPoisonError(String);

/// Custom `From` implementation for an error that's specific to this
/// adapter.
impl<T> From<PoisonError<T>> for Error {
    fn from(err: PoisonError<T>) -> Self {
        Self::Adapter(Box::new(ErasedPoisonError(err.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use speculoos::prelude::*;

    fn seeded_pair(store: &MemoryStore) -> (Uuid, Uuid) {
        let caller = Uuid::new_v4();
        let referrer = Uuid::new_v4();
        store.insert_user(User::new(caller, Some(Utc::now()))).unwrap();
        store
            .insert_user(User::new(referrer, Some(Utc::now())))
            .unwrap();
        (caller, referrer)
    }

    #[tokio::test]
    async fn test_code_lookup_exact_and_normalized() {
        let store = MemoryStore::default();
        let owner = Uuid::new_v4();
        store
            .insert_code(ReferralCode::new("Xy9Zqw12".to_string(), owner, Utc::now()))
            .unwrap();

        // Exact key hits; a differently-cased key misses.
        let res = store.get_code("Xy9Zqw12").await;
        assert_that!(res)
            .is_ok()
            .is_some()
            .matches(|record| record.user_id == Some(owner));
        let res = store.get_code("xy9zqw12").await;
        assert_that!(res).is_ok().is_none();

        // The normalized index resolves the lowercase form to the stored
        // record, casing intact.
        let res = store.find_code_normalized("xy9zqw12").await;
        assert_that!(res)
            .is_ok()
            .is_some()
            .matches(|record| record.code == "Xy9Zqw12");
    }

    #[tokio::test]
    async fn test_commit_applies_whole_write_set() {
        let store = MemoryStore::default();
        let (caller, referrer) = seeded_pair(&store);
        let snapshot = store.read_users(caller, referrer).await.unwrap();

        let res = store
            .commit_referral(ReferralCommit {
                caller,
                caller_revision: snapshot.caller.unwrap().revision,
                referrer,
                referrer_revision: snapshot.referrer.unwrap().revision,
                points: 100,
                new_code: Some("Ab12Cd34".to_string()),
                code: "Xy9Zqw12".to_string(),
            })
            .await;
        assert_that!(res).is_ok();

        let caller_doc = store.user(caller).unwrap().unwrap();
        assert_that!(caller_doc.referred_by).is_some().is_equal_to(referrer);
        assert_that!(caller_doc.referred_at).is_some();
        assert_that!(caller_doc.total_count).is_equal_to(100);
        assert_that!(caller_doc.month_count).is_equal_to(100);
        assert_that!(caller_doc.referral_code)
            .is_some()
            .is_equal_to("Ab12Cd34".to_string());

        let referrer_doc = store.user(referrer).unwrap().unwrap();
        assert_that!(referrer_doc.total_count).is_equal_to(100);
        assert_that!(referrer_doc.month_count).is_equal_to(100);
        assert_that!(referrer_doc.referral_count).is_equal_to(1);

        let new_code = store.code("Ab12Cd34").unwrap().unwrap();
        assert_that!(new_code.user_id).is_some().is_equal_to(caller);
        assert_that!(new_code.normalized).is_equal_to("ab12cd34".to_string());

        let events = store.events().unwrap();
        assert_that!(events).has_length(1);
        assert_that!(events[0].referral_code).is_equal_to("Xy9Zqw12".to_string());
        assert_that!(events[0].points_awarded).is_equal_to(100);
    }

    #[tokio::test]
    async fn test_commit_rejects_stale_revision() {
        let store = MemoryStore::default();
        let (caller, referrer) = seeded_pair(&store);
        let snapshot = store.read_users(caller, referrer).await.unwrap();
        let caller_revision = snapshot.caller.unwrap().revision;
        let referrer_revision = snapshot.referrer.unwrap().revision;

        let commit = ReferralCommit {
            caller,
            caller_revision,
            referrer,
            referrer_revision,
            points: 100,
            new_code: None,
            code: "Xy9Zqw12".to_string(),
        };
        let res = store.commit_referral(commit.clone()).await;
        assert_that!(res).is_ok();

        // Replaying against the moved revisions conflicts and writes
        // nothing further.
        let res = store.commit_referral(commit).await;
        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::Conflict(_)));
        let caller_doc = store.user(caller).unwrap().unwrap();
        assert_that!(caller_doc.total_count).is_equal_to(100);
        assert_that!(store.events().unwrap()).has_length(1);
    }

    #[tokio::test]
    async fn test_commit_rejects_taken_code_key() {
        let store = MemoryStore::default();
        let (caller, referrer) = seeded_pair(&store);
        store
            .insert_code(ReferralCode::new("Taken123".to_string(), referrer, Utc::now()))
            .unwrap();
        let snapshot = store.read_users(caller, referrer).await.unwrap();

        let res = store
            .commit_referral(ReferralCommit {
                caller,
                caller_revision: snapshot.caller.unwrap().revision,
                referrer,
                referrer_revision: snapshot.referrer.unwrap().revision,
                points: 100,
                new_code: Some("Taken123".to_string()),
                code: "Taken123".to_string(),
            })
            .await;

        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::Conflict(_)));
        // The conflict left both documents untouched.
        let caller_doc = store.user(caller).unwrap().unwrap();
        assert_that!(caller_doc.referred_by).is_none();
        assert_that!(caller_doc.total_count).is_equal_to(0);
        let referrer_doc = store.user(referrer).unwrap().unwrap();
        assert_that!(referrer_doc.referral_count).is_equal_to(0);
        assert_that!(store.events().unwrap()).is_empty();
    }
}

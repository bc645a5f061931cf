use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use crate::{
    domain::{Outcome, RejectReason},
    ports::{
        codegen::CodeGeneratorPort,
        store::{Error as StoreError, ReferralCommit, StorePort},
    },
};
use chrono::Utc;
use tower::Service;
use uuid::Uuid;

use super::{DomainLogic, Error};

pub struct ApplyReferralRequest {
    /// Authenticated caller identity, from the transport's auth context
    ///
    /// `None` when the call arrived unauthenticated. Never read from the
    /// request body.
    pub caller: Option<Uuid>,
    /// The referral code as the caller typed it
    pub referral_code: String,
    /// Points to credit each party; the configured default when absent
    pub points: Option<u32>,
}

impl<S, G> Service<ApplyReferralRequest> for DomainLogic<S, G>
where
    S: StorePort + 'static,
    G: CodeGeneratorPort + 'static,
{
    type Response = Outcome;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ApplyReferralRequest) -> Self::Future {
        let store = self.store.clone();
        let codegen = self.codegen.clone();
        let settings = self.settings.clone();
        Box::pin(async move {
            let caller = req.caller.ok_or(Error::Unauthenticated)?;
            let code = req.referral_code.trim();
            if code.is_empty() {
                return Err(Error::InvalidArgument("referral code is required".into()));
            }
            let points = req.points.unwrap_or(settings.default_points);

            let (referrer_id, matched_code) = resolve_referrer(store.as_ref(), code).await?;

            // Referring yourself is an expected outcome, not an error.
            // Decided before any transactional read: both ids are fixed.
            if referrer_id == caller {
                return Ok(Outcome::Rejected(RejectReason::SelfReferral));
            }

            for _ in 0..settings.transaction_attempts {
                let snapshot = store
                    .read_users(caller, referrer_id)
                    .await
                    .map_err(store_failure)?;

                // The caller's document is written by account provisioning.
                // Its absence means this call arrived too early, and that is
                // not something a retry can fix.
                let caller_doc = snapshot.caller.ok_or(Error::FailedPrecondition(
                    "user document must exist before applying a referral".into(),
                ))?;

                if caller_doc.user.referred_by.is_some() {
                    return Ok(Outcome::Rejected(RejectReason::AlreadyReferred));
                }
                if let Some(created_at) = caller_doc.user.created_at {
                    if Utc::now() - created_at > settings.max_account_age {
                        return Ok(Outcome::Rejected(RejectReason::AccountTooOld));
                    }
                }
                let Some(referrer_doc) = snapshot.referrer else {
                    return Ok(Outcome::Rejected(RejectReason::ReferrerNotFound));
                };
                if referrer_doc.user.referral_count >= settings.max_referrals {
                    return Ok(Outcome::Rejected(RejectReason::ReferrerLimit));
                }

                // A referred user without a code of their own gets one in
                // the same commit. Generated per attempt: a key collision
                // fails the commit and the retry must not reuse the code.
                let new_code = caller_doc
                    .user
                    .referral_code
                    .is_none()
                    .then(|| codegen.generate());

                let commit = ReferralCommit {
                    caller,
                    caller_revision: caller_doc.revision,
                    referrer: referrer_id,
                    referrer_revision: referrer_doc.revision,
                    points,
                    new_code,
                    code: matched_code.clone(),
                };
                match store.commit_referral(commit).await {
                    Ok(()) => {
                        tracing::info!(
                            %caller,
                            referrer = %referrer_id,
                            points,
                            "referral applied"
                        );
                        return Ok(Outcome::Applied);
                    }
                    // Another writer moved one of the documents or took the
                    // new code first; re-read and re-validate.
                    Err(StoreError::Conflict(_)) => continue,
                    Err(err) => return Err(store_failure(err)),
                }
            }

            tracing::error!(
                %caller,
                attempts = settings.transaction_attempts,
                "referral transaction did not commit"
            );
            Err(Error::Internal)
        })
    }
}

/// Resolve a referral code to its owner.
///
/// Exact-key lookup first; on a miss, the lowercase secondary index. Runs
/// outside the transaction on purpose: the transaction re-validates
/// everything that matters against fresh reads. Returns the referrer id and
/// the code in its stored casing, which is what the audit record keeps.
async fn resolve_referrer<S: StorePort>(store: &S, code: &str) -> Result<(Uuid, String), Error> {
    let record = match store.get_code(code).await.map_err(store_failure)? {
        Some(record) => record,
        None => store
            .find_code_normalized(&code.to_lowercase())
            .await
            .map_err(store_failure)?
            .ok_or(Error::NotFound("invalid referral code".into()))?,
    };

    let referrer_id = record.user_id.ok_or(Error::NotFound(
        "referral code has no associated user".into(),
    ))?;

    Ok((referrer_id, record.code))
}

/// Map an unexpected store failure to the opaque internal error, keeping
/// the detail in the server log only.
fn store_failure(err: StoreError) -> Error {
    tracing::error!(?err, "document store failure");
    Error::Internal
}

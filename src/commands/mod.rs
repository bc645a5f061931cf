use std::{borrow::Cow, sync::Arc};

use crate::config::Settings;

pub mod apply_referral;

/// The referral domain service.
///
/// Holds the injected handles (document store and code generator) plus the
/// configured limits, all fixed at process start. Commands hang off this
/// struct as [`tower::Service`] implementations.
pub struct DomainLogic<S, G> {
    store: Arc<S>,
    codegen: Arc<G>,
    settings: Settings,
}

impl<S, G> DomainLogic<S, G> {
    pub fn new(store: Arc<S>, codegen: Arc<G>, settings: Settings) -> Self {
        Self {
            store,
            codegen,
            settings,
        }
    }
}

/// The throwing branch of the error taxonomy.
///
/// Expected business negatives never land here; those come back as
/// [`crate::domain::Outcome::Rejected`] values. These are the conditions
/// the transport surfaces as RPC errors, keyed by [`Error::code`].
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The transport supplied no authenticated caller identity.
    #[error("caller is not authenticated")]
    Unauthenticated,

    /// The request is malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(Cow<'static, str>),

    /// The referral code does not resolve to a referrer.
    #[error("not found: {0}")]
    NotFound(Cow<'static, str>),

    /// The operation ran before its prerequisites were in place.
    ///
    /// The caller's user document must exist before a referral can be
    /// applied; its absence is an integration-ordering bug and is never
    /// retried here.
    #[error("failed precondition: {0}")]
    FailedPrecondition(Cow<'static, str>),

    /// Unexpected infrastructure failure.
    ///
    /// Details are logged server-side and deliberately not carried to the
    /// caller.
    #[error("internal error")]
    Internal,
}

impl Error {
    /// Wire discriminator for the transport layer.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Unauthenticated => "unauthenticated",
            Error::InvalidArgument(_) => "invalid-argument",
            Error::NotFound(_) => "not-found",
            Error::FailedPrecondition(_) => "failed-precondition",
            Error::Internal => "internal",
        }
    }
}

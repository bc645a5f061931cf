//! Referral rewards service
//!
//! Links a newly signed-up user to the owner of the referral code they
//! typed in and credits both sides in a single atomic commit. The business
//! rules live in [`commands`] as [`tower::Service`] implementations over
//! the ports in [`ports`]; [`adapters`] provides the in-memory document
//! store and the random code generator.
//!
//! ```no_run
//! use rust_referral_service::{
//!     adapters::{codegen::random::RandomCodeGenerator, store::memory::MemoryStore},
//!     commands::{apply_referral::ApplyReferralRequest, DomainLogic},
//!     config::Settings,
//! };
//! use std::sync::Arc;
//! use tower::ServiceExt;
//! use uuid::Uuid;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), tower::BoxError> {
//! let domain = DomainLogic::new(
//!     Arc::new(MemoryStore::default()),
//!     Arc::new(RandomCodeGenerator),
//!     Settings::load(),
//! );
//!
//! let outcome = domain
//!     .oneshot(ApplyReferralRequest {
//!         caller: Some(Uuid::new_v4()),
//!         referral_code: "Xy9Zqw12".to_string(),
//!         points: None,
//!     })
//!     .await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod commands;
pub mod config;
pub mod domain;
pub mod ports;

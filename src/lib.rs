//! quorum — review-feedback triage and remediation pipeline.
//!
//! Collapses automated and human review feedback on a proposed code
//! change into a de-duplicated issue list, then drives a human-gated
//! remediation workflow:
//!
//! ```text
//! triage:   Review Host ─▸ collect ─▸ normalize ─▸ cluster ─▸ classify ─▸ plan.md
//!                                                                            │
//!                                                       human approves/edits │
//!                                                                            ▼
//! execute:  plan.md ─▸ reconcile ─▸ dispatch (concurrent) ─▸ record ─▸ summary
//! ```
//!
//! The approval gate is durable: `triage` halts at an `AwaitingApproval`
//! plan artifact on disk, and `execute` is a separate idempotent entry
//! point, so no process stays alive across the human wait.
//!
//! ## Extension
//!
//! New reviewer sources are one severity-scheme mapping in config
//! ([`triage::severity`]); new host backends implement
//! [`host::ReviewHost`]. The clustering and classification stages never
//! change for either.

pub mod config;
pub mod error;
pub mod host;
pub mod remedy;
pub mod triage;

pub use config::Config;
pub use error::TriageError;

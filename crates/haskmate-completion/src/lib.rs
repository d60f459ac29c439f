//! # haskmate-completion
//!
//! **Purpose**: completion candidate ranking for haskmate
//!
//! Fuzzy-matches typed prefixes against candidate sets drawn from the
//! symbol registry (symbols, types, classes) and the backend's listings
//! (modules, pragmas, compiler options), plus hole-fill matching by
//! return-type unification.
//!
//! Ranking scores every candidate against each configured key with
//! nucleo, keeps the best key's score, discards zero-score candidates,
//! and orders by descending score with the winning key's index as the
//! tie-break.

pub mod facade;
pub mod fuzzy;
pub mod hole;

pub use facade::{CompletionError, CompletionFacade, Result};
pub use fuzzy::{rank, similarity, KeyFn};
pub use hole::{return_type, unifiable};

//! Integration test suite for nixdex-fts.
//!
//! Runs whole imports (normalize → populate → alias swap) against the
//! in-memory and Tantivy stores with fake collaborators.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

mod common;
mod integration;

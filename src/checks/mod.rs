#![forbid(unsafe_code)]
#![warn(clippy::all)]

//! Guard-specific checks that go beyond plain rule-set matching.
//!
//! Each `check` returns `None` when the invocation is outside the guard's
//! scope and `Some(findings)` otherwise.

pub mod deps;
pub mod format;
pub mod imports;
pub mod migrations;
pub mod perf;
pub mod permissions;
pub mod rls;
pub mod routes;
pub mod verify;
pub mod web_search;

#[cfg(test)]
pub(crate) mod testing;

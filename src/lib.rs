//! Purpose: Library crate behind the `csvmodel` CLI and tests.
//! Exports: `api` (stable surface) and `core` (inference, runtime, errors).
//! Role: Turns a set of delimited files into a navigable relational model.
//! Invariants: Model inference is synchronous and touches only file headers.
//! Invariants: Caching and interning are construction-time options, never global state.
pub mod api;
pub mod core;

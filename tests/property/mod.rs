//! Property-based tests for the confold composition engine

mod determinism;

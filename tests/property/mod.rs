//! Property-based tests for the resilience strategies.
//!
//! Run with: cargo test --test property_tests
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold across all strategies.

pub mod circuit_breaker;
pub mod hedge;

/// A cloneable error type for testing
#[derive(Debug, Clone)]
pub struct TestError;

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "test error")
    }
}

impl std::error::Error for TestError {}

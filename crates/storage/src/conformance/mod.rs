//! Conformance test suite for `PropositionCache` implementations.
//!
//! Any cache backend can run this suite to verify the contract the
//! pipeline relies on:
//!
//! - **Basic**: missing keys read as `None`, writes replace, removes delete
//! - **Error handling**: invalid keys are rejected with `InvalidKey`
//! - **Concurrency**: concurrent writers never leave a torn entry
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty cache for each test:
//!
//! ```ignore
//! use inbound_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn memory_conformance() {
//!     let report = run_conformance_suite(|| async { MemoryCache::new() }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod basic;
mod concurrent;
mod error;

use std::fmt;
use std::future::Future;

use crate::{CacheEntry, PropositionCache};

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "basic", "error", "concurrent").
    pub category: String,
    /// Test name (e.g. "get_missing_key_returns_none").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a cache backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// cache, ensuring test isolation.
pub async fn run_conformance_suite<C, F, Fut>(factory: F) -> ConformanceReport
where
    C: PropositionCache,
    F: Fn() -> Fut,
    Fut: Future<Output = C>,
{
    let mut results = Vec::new();

    results.extend(basic::run_basic_tests(&factory).await);
    results.extend(error::run_error_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// A snapshot shaped like the pipeline's durable store.
fn make_snapshot(surface: &str, proposition_id: &str) -> CacheEntry {
    CacheEntry::new(serde_json::json!({
        surface: [{
            "id": proposition_id,
            "scope": surface,
            "scopeDetails": {"rank": 0},
            "items": []
        }]
    }))
}

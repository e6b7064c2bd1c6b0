use std::future::Future;

use super::{make_snapshot, TestResult};
use crate::{PropositionCache, StorageError};

pub(super) async fn run_error_tests<C, F, Fut>(factory: &F) -> Vec<TestResult>
where
    C: PropositionCache,
    F: Fn() -> Fut,
    Fut: Future<Output = C>,
{
    vec![
        TestResult::from_result(
            "error",
            "get_empty_key_is_invalid",
            get_empty_key_is_invalid(factory).await,
        ),
        TestResult::from_result(
            "error",
            "set_empty_key_is_invalid",
            set_empty_key_is_invalid(factory).await,
        ),
        TestResult::from_result(
            "error",
            "remove_empty_key_is_invalid",
            remove_empty_key_is_invalid(factory).await,
        ),
        TestResult::from_result(
            "error",
            "invalid_key_error_has_correct_field",
            invalid_key_error_has_correct_field(factory).await,
        ),
    ]
}

// ── 1. get("") returns InvalidKey ─────────────────────────────────────────────

async fn get_empty_key_is_invalid<C, F, Fut>(factory: &F) -> Result<(), String>
where
    C: PropositionCache,
    F: Fn() -> Fut,
    Fut: Future<Output = C>,
{
    let cache = factory().await;
    match cache.get("").await {
        Err(StorageError::InvalidKey { .. }) => Ok(()),
        other => Err(format!("expected InvalidKey, got {:?}", other)),
    }
}

// ── 2. set("") returns InvalidKey and writes nothing ──────────────────────────

async fn set_empty_key_is_invalid<C, F, Fut>(factory: &F) -> Result<(), String>
where
    C: PropositionCache,
    F: Fn() -> Fut,
    Fut: Future<Output = C>,
{
    let cache = factory().await;
    match cache.set("", make_snapshot("mobileapp://app", "p1")).await {
        Err(StorageError::InvalidKey { .. }) => Ok(()),
        other => Err(format!("expected InvalidKey, got {:?}", other)),
    }
}

// ── 3. remove("") returns InvalidKey ──────────────────────────────────────────

async fn remove_empty_key_is_invalid<C, F, Fut>(factory: &F) -> Result<(), String>
where
    C: PropositionCache,
    F: Fn() -> Fut,
    Fut: Future<Output = C>,
{
    let cache = factory().await;
    match cache.remove("").await {
        Err(StorageError::InvalidKey { .. }) => Ok(()),
        other => Err(format!("expected InvalidKey, got {:?}", other)),
    }
}

// ── 4. InvalidKey carries the offending key ───────────────────────────────────

async fn invalid_key_error_has_correct_field<C, F, Fut>(factory: &F) -> Result<(), String>
where
    C: PropositionCache,
    F: Fn() -> Fut,
    Fut: Future<Output = C>,
{
    let cache = factory().await;
    match cache.get("").await {
        Err(StorageError::InvalidKey { key }) if key.is_empty() => Ok(()),
        other => Err(format!("expected InvalidKey {{ key: \"\" }}, got {:?}", other)),
    }
}

use std::future::Future;
use std::sync::Arc;

use super::{make_snapshot, TestResult};
use crate::{PropositionCache, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<C, F, Fut>(factory: &F) -> Vec<TestResult>
where
    C: PropositionCache,
    F: Fn() -> Fut,
    Fut: Future<Output = C>,
{
    vec![
        TestResult::from_result(
            "concurrent",
            "concurrent_writes_same_key_leave_one_whole_entry",
            concurrent_writes_same_key_leave_one_whole_entry(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "concurrent_writes_different_keys_all_visible",
            concurrent_writes_different_keys_all_visible(factory).await,
        ),
    ]
}

// ── Same key: last writer wins, never a torn entry ──────────────────────────

/// N tasks write distinct snapshots to the same key. Afterwards the key must
/// hold exactly one of the written snapshots, intact.
async fn concurrent_writes_same_key_leave_one_whole_entry<C, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    C: PropositionCache,
    F: Fn() -> Fut,
    Fut: Future<Output = C>,
{
    let cache = Arc::new(factory().await);
    let written: Vec<_> = (0..N)
        .map(|i| make_snapshot(&format!("mobileapp://app/{i}"), &format!("p{i}")))
        .collect();

    let mut handles = Vec::new();
    for entry in written.iter().cloned() {
        let c = cache.clone();
        handles.push(tokio::spawn(async move {
            c.set("propositions", entry).await
        }));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
    }

    let read = cache
        .get("propositions")
        .await
        .map_err(|e| format!("get: {e}"))?
        .ok_or("entry missing after concurrent writes")?;
    if !written.contains(&read) {
        return Err(format!("entry is not one of the written snapshots: {:?}", read));
    }
    Ok(())
}

// ── Different keys: all writes land ─────────────────────────────────────────

async fn concurrent_writes_different_keys_all_visible<C, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    C: PropositionCache,
    F: Fn() -> Fut,
    Fut: Future<Output = C>,
{
    let cache = Arc::new(factory().await);

    let mut handles = Vec::new();
    for i in 0..N {
        let c = cache.clone();
        handles.push(tokio::spawn(async move {
            c.set(
                &format!("key-{i}"),
                make_snapshot("mobileapp://app", &format!("p{i}")),
            )
            .await
        }));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
    }

    for i in 0..N {
        let read = cache
            .get(&format!("key-{i}"))
            .await
            .map_err(|e| format!("get key-{i}: {e}"))?;
        if read != Some(make_snapshot("mobileapp://app", &format!("p{i}"))) {
            return Err(format!("key-{i} missing or wrong: {:?}", read));
        }
    }
    Ok(())
}

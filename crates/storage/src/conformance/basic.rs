use std::future::Future;

use super::{make_snapshot, TestResult};
use crate::{CacheEntry, PropositionCache};

pub(super) async fn run_basic_tests<C, F, Fut>(factory: &F) -> Vec<TestResult>
where
    C: PropositionCache,
    F: Fn() -> Fut,
    Fut: Future<Output = C>,
{
    vec![
        TestResult::from_result(
            "basic",
            "get_missing_key_returns_none",
            get_missing_key_returns_none(factory).await,
        ),
        TestResult::from_result(
            "basic",
            "set_then_get_round_trips",
            set_then_get_round_trips(factory).await,
        ),
        TestResult::from_result(
            "basic",
            "set_replaces_existing_entry",
            set_replaces_existing_entry(factory).await,
        ),
        TestResult::from_result(
            "basic",
            "remove_deletes_entry",
            remove_deletes_entry(factory).await,
        ),
        TestResult::from_result(
            "basic",
            "remove_missing_key_succeeds",
            remove_missing_key_succeeds(factory).await,
        ),
        TestResult::from_result(
            "basic",
            "keys_are_independent",
            keys_are_independent(factory).await,
        ),
        TestResult::from_result(
            "basic",
            "metadata_is_preserved",
            metadata_is_preserved(factory).await,
        ),
    ]
}

async fn get_missing_key_returns_none<C, F, Fut>(factory: &F) -> Result<(), String>
where
    C: PropositionCache,
    F: Fn() -> Fut,
    Fut: Future<Output = C>,
{
    let cache = factory().await;
    match cache.get("propositions").await {
        Ok(None) => Ok(()),
        other => Err(format!("expected Ok(None), got {:?}", other)),
    }
}

async fn set_then_get_round_trips<C, F, Fut>(factory: &F) -> Result<(), String>
where
    C: PropositionCache,
    F: Fn() -> Fut,
    Fut: Future<Output = C>,
{
    let cache = factory().await;
    let entry = make_snapshot("mobileapp://app", "p1");
    cache
        .set("propositions", entry.clone())
        .await
        .map_err(|e| format!("set: {e}"))?;
    let read = cache
        .get("propositions")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if read != Some(entry) {
        return Err(format!("round trip mismatch: {:?}", read));
    }
    Ok(())
}

async fn set_replaces_existing_entry<C, F, Fut>(factory: &F) -> Result<(), String>
where
    C: PropositionCache,
    F: Fn() -> Fut,
    Fut: Future<Output = C>,
{
    let cache = factory().await;
    cache
        .set("propositions", make_snapshot("mobileapp://app/a", "p1"))
        .await
        .map_err(|e| format!("first set: {e}"))?;
    let second = make_snapshot("mobileapp://app/b", "p2");
    cache
        .set("propositions", second.clone())
        .await
        .map_err(|e| format!("second set: {e}"))?;
    let read = cache
        .get("propositions")
        .await
        .map_err(|e| format!("get: {e}"))?;
    match read {
        Some(e) if e == second => Ok(()),
        other => Err(format!("expected second entry only, got {:?}", other)),
    }
}

async fn remove_deletes_entry<C, F, Fut>(factory: &F) -> Result<(), String>
where
    C: PropositionCache,
    F: Fn() -> Fut,
    Fut: Future<Output = C>,
{
    let cache = factory().await;
    cache
        .set("propositions", make_snapshot("mobileapp://app", "p1"))
        .await
        .map_err(|e| format!("set: {e}"))?;
    cache
        .remove("propositions")
        .await
        .map_err(|e| format!("remove: {e}"))?;
    match cache.get("propositions").await {
        Ok(None) => Ok(()),
        other => Err(format!("expected Ok(None) after remove, got {:?}", other)),
    }
}

async fn remove_missing_key_succeeds<C, F, Fut>(factory: &F) -> Result<(), String>
where
    C: PropositionCache,
    F: Fn() -> Fut,
    Fut: Future<Output = C>,
{
    let cache = factory().await;
    cache
        .remove("never-written")
        .await
        .map_err(|e| format!("remove of missing key failed: {e}"))
}

async fn keys_are_independent<C, F, Fut>(factory: &F) -> Result<(), String>
where
    C: PropositionCache,
    F: Fn() -> Fut,
    Fut: Future<Output = C>,
{
    let cache = factory().await;
    let a = make_snapshot("mobileapp://app/a", "pa");
    let b = make_snapshot("mobileapp://app/b", "pb");
    cache
        .set("a", a.clone())
        .await
        .map_err(|e| format!("set a: {e}"))?;
    cache
        .set("b", b.clone())
        .await
        .map_err(|e| format!("set b: {e}"))?;
    cache.remove("a").await.map_err(|e| format!("remove a: {e}"))?;

    let read_a = cache.get("a").await.map_err(|e| format!("get a: {e}"))?;
    let read_b = cache.get("b").await.map_err(|e| format!("get b: {e}"))?;
    if read_a.is_some() {
        return Err("key a still present after remove".to_string());
    }
    if read_b != Some(b) {
        return Err(format!("key b changed: {:?}", read_b));
    }
    Ok(())
}

async fn metadata_is_preserved<C, F, Fut>(factory: &F) -> Result<(), String>
where
    C: PropositionCache,
    F: Fn() -> Fut,
    Fut: Future<Output = C>,
{
    let cache = factory().await;
    let entry = CacheEntry::new(serde_json::json!({})).with_metadata("version", "1");
    cache
        .set("meta", entry)
        .await
        .map_err(|e| format!("set: {e}"))?;
    let read = cache
        .get("meta")
        .await
        .map_err(|e| format!("get: {e}"))?
        .ok_or("entry missing")?;
    match read.metadata.get("version").map(String::as_str) {
        Some("1") => Ok(()),
        other => Err(format!("expected metadata version=1, got {:?}", other)),
    }
}

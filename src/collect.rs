use std::fmt::Debug;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::sessions::{ParseOptions, SessionSummary, parse_file};

/// Parse `files` with at most `concurrency` files in flight.
///
/// Results arrive in completion order. Files that fail to parse are dropped.
pub async fn parse_all(files: Vec<PathBuf>, concurrency: usize) -> Vec<SessionSummary> {
    let opts = ParseOptions::default();
    collect_with(files, concurrency, move |path| async move {
        parse_file(&path, opts).await
    })
    .await
}

/// Pull-based worker pool: every worker claims the next unclaimed index from a shared
/// cursor until the list is exhausted, so slow items only hold up their own worker.
pub async fn collect_with<I, T, F, Fut>(items: Vec<I>, concurrency: usize, work: F) -> Vec<T>
where
    I: Clone + Debug + Send + Sync + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    if items.is_empty() {
        return Vec::new();
    }

    let workers = concurrency.clamp(1, items.len());
    let items = Arc::new(items);
    let cursor = Arc::new(AtomicUsize::new(0));
    let work = Arc::new(work);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut set = JoinSet::new();
    for _ in 0..workers {
        let items = Arc::clone(&items);
        let cursor = Arc::clone(&cursor);
        let work = Arc::clone(&work);
        let tx = tx.clone();
        set.spawn(async move {
            loop {
                let idx = cursor.fetch_add(1, Ordering::Relaxed);
                let Some(item) = items.get(idx) else {
                    break;
                };
                match work(item.clone()).await {
                    Ok(out) => {
                        // The receiver outlives every worker.
                        let _ = tx.send(out);
                    }
                    Err(err) => debug!("dropping {:?}: {:#}", item, err),
                }
            }
        });
    }
    drop(tx);

    while let Some(joined) = set.join_next().await {
        if let Err(err) = joined {
            warn!("collector worker terminated abnormally: {}", err);
        }
    }

    let mut out = Vec::with_capacity(items.len());
    while let Some(item) = rx.recv().await {
        out.push(item);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use pretty_assertions::assert_eq;

    fn paths(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("{i}.jsonl"))).collect()
    }

    fn index_of(path: &std::path::Path) -> usize {
        path.file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse().ok())
            .expect("numeric stem")
    }

    #[tokio::test]
    async fn every_item_is_processed_once() {
        let mut out = collect_with(paths(40), 7, |path| async move {
            Ok::<_, anyhow::Error>(index_of(&path))
        })
        .await;
        out.sort();
        assert_eq!(out, (0..40).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn failures_are_dropped_silently() {
        let mut out = collect_with(paths(10), 3, |path| async move {
            let idx = index_of(&path);
            if idx % 3 == 0 {
                anyhow::bail!("boom {idx}");
            }
            Ok(idx)
        })
        .await;
        out.sort();
        assert_eq!(out, vec![1, 2, 4, 5, 7, 8]);
    }

    #[tokio::test]
    async fn in_flight_never_exceeds_concurrency() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (in_flight_w, peak_w) = (Arc::clone(&in_flight), Arc::clone(&peak));
        let out = collect_with(paths(25), 4, move |path| {
            let in_flight = Arc::clone(&in_flight_w);
            let peak = Arc::clone(&peak_w);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, anyhow::Error>(index_of(&path))
            }
        })
        .await;

        assert_eq!(out.len(), 25);
        assert!(peak.load(Ordering::SeqCst) <= 4);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn zero_concurrency_still_makes_progress() {
        let out = collect_with(paths(3), 0, |path| async move {
            Ok::<_, anyhow::Error>(index_of(&path))
        })
        .await;
        assert_eq!(out.len(), 3);
    }

    #[tokio::test]
    async fn empty_input_yields_empty_output() {
        let out: Vec<usize> = collect_with(Vec::<PathBuf>::new(), 16, |_| async move {
            Ok::<_, anyhow::Error>(0usize)
        })
        .await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn parse_all_skips_unreadable_files() {
        let dir =
            std::env::temp_dir().join(format!("codex-history-collect-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("create tmp dir");
        let good = dir.join("good.jsonl");
        std::fs::write(
            &good,
            r#"{"type":"message","role":"user","content":"hello there"}"#,
        )
        .expect("write");
        let missing = dir.join("missing.jsonl");

        let out = parse_all(vec![missing, good.clone()], 16).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].path, good.to_string_lossy());
        assert_eq!(out[0].ask.as_deref(), Some("hello there"));
    }
}

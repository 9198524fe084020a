use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use tokio::fs;
use tracing::debug;

use crate::collect::collect_with;

/// Directory names never descended into.
const IGNORE_DIRS: [&str; 2] = [".git", "node_modules"];
const SESSION_FILE_EXT: &str = ".jsonl";

/// A session file found on disk with its modification time in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub mtime_ms: u64,
}

/// Recursively collect every `*.jsonl` file under `root`.
///
/// Unreadable directories (including a missing root) are skipped silently; symlinks are
/// neither followed nor returned.
pub async fn scan_dir(root: &Path) -> Vec<PathBuf> {
    let mut results = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) => {
                debug!("skipping unreadable directory {:?}: {}", dir, err);
                continue;
            }
        };
        let mut subdirs = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    debug!("stopped listing {:?}: {}", dir, err);
                    break;
                }
            };
            let Ok(file_type) = entry.file_type().await else {
                continue;
            };
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if file_type.is_dir() {
                if IGNORE_DIRS.contains(&name.as_ref()) {
                    continue;
                }
                subdirs.push(entry.path());
            } else if file_type.is_file() && name.ends_with(SESSION_FILE_EXT) {
                results.push(entry.path());
            }
        }
        // Depth-first, visiting subdirectories in listing order.
        pending.extend(subdirs.into_iter().rev());
    }

    results
}

/// Modification time of `path` in epoch milliseconds, or 0 when it cannot be determined.
pub async fn mtime(path: &Path) -> u64 {
    fs::metadata(path)
        .await
        .ok()
        .and_then(|meta| meta.modified().ok())
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Stat every path, `concurrency` at a time, and order the result newest first. Ties
/// keep scan order.
pub async fn with_mtimes_desc(paths: Vec<PathBuf>, concurrency: usize) -> Vec<ScannedFile> {
    let indexed: Vec<(usize, PathBuf)> = paths.into_iter().enumerate().collect();
    let mut stats = collect_with(indexed, concurrency, |(idx, path)| async move {
        let mtime_ms = mtime(&path).await;
        Ok((idx, ScannedFile { path, mtime_ms }))
    })
    .await;
    stats.sort_by(|(ia, a), (ib, b)| b.mtime_ms.cmp(&a.mtime_ms).then(ia.cmp(ib)));
    stats.into_iter().map(|(_, file)| file).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn temp_root() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("codex-history-scan-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("create tmp dir");
        dir
    }

    #[tokio::test]
    async fn scan_finds_nested_jsonl_and_skips_ignored_dirs() {
        let root = temp_root();
        let day = root.join("2025").join("01").join("02");
        std::fs::create_dir_all(&day).expect("mkdir day");
        std::fs::create_dir_all(root.join(".git")).expect("mkdir .git");
        std::fs::create_dir_all(root.join("node_modules").join("pkg")).expect("mkdir node_modules");

        std::fs::write(root.join("top.jsonl"), "").expect("write");
        std::fs::write(day.join("rollout-a.jsonl"), "").expect("write");
        std::fs::write(day.join("notes.txt"), "").expect("write");
        std::fs::write(day.join("rollout.jsonl.bak"), "").expect("write");
        std::fs::write(root.join(".git").join("hidden.jsonl"), "").expect("write");
        std::fs::write(root.join("node_modules").join("pkg").join("dep.jsonl"), "")
            .expect("write");

        let mut found = scan_dir(&root).await;
        found.sort();
        let mut expected = vec![root.join("top.jsonl"), day.join("rollout-a.jsonl")];
        expected.sort();
        assert_eq!(found, expected);
    }

    #[tokio::test]
    async fn missing_root_yields_empty_listing() {
        let root = temp_root().join("does-not-exist");
        assert!(scan_dir(&root).await.is_empty());
    }

    #[tokio::test]
    async fn mtime_of_missing_file_is_zero() {
        let root = temp_root();
        assert_eq!(mtime(&root.join("nope.jsonl")).await, 0);
    }

    #[tokio::test]
    async fn mtime_of_existing_file_is_positive() {
        let root = temp_root();
        let path = root.join("a.jsonl");
        std::fs::write(&path, "{}\n").expect("write");
        assert!(mtime(&path).await > 0);
    }

    #[tokio::test]
    async fn with_mtimes_desc_puts_missing_files_last() {
        let root = temp_root();
        let present = root.join("present.jsonl");
        std::fs::write(&present, "").expect("write");
        let missing = root.join("missing.jsonl");

        let files = with_mtimes_desc(vec![missing.clone(), present.clone()], 4).await;
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, present);
        assert_eq!(files[1].path, missing);
        assert_eq!(files[1].mtime_ms, 0);
    }

    #[tokio::test]
    async fn with_mtimes_desc_keeps_scan_order_on_ties() {
        let root = temp_root();
        let stamp = std::time::SystemTime::now() - std::time::Duration::from_secs(60);
        let paths: Vec<PathBuf> = (0..20).map(|i| root.join(format!("{i:02}.jsonl"))).collect();
        for path in &paths {
            std::fs::write(path, "").expect("write");
            std::fs::File::options()
                .write(true)
                .open(path)
                .and_then(|f| f.set_modified(stamp))
                .expect("set mtime");
        }
        let newest = root.join("newest.jsonl");
        std::fs::write(&newest, "").expect("write");

        let mut input = paths.clone();
        input.push(newest.clone());
        let files = with_mtimes_desc(input, 3).await;

        let mut expected = vec![newest];
        expected.extend(paths);
        let got: Vec<PathBuf> = files.into_iter().map(|f| f.path).collect();
        assert_eq!(got, expected);
    }
}

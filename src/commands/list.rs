use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::collect::parse_all;
use crate::config::{ListConfig, load_config, resolve_sessions_dir};
use crate::query::{ListQuery, parse_date_input};
use crate::scan::{scan_dir, with_mtimes_desc};
use crate::sessions::SessionSummary;
use crate::table::{RenderOptions, render_json, render_table, terminal_width};
use crate::{CliError, CliResult, ListArgs};

pub async fn handle_list_cmd(args: ListArgs) -> CliResult<()> {
    let cfg = load_config()
        .await
        .map_err(|e| CliError::Config(format!("{e:#}")))?;

    let dir_arg = args.dir.as_deref().or(cfg.dir.as_deref());
    let dir = resolve_sessions_dir(dir_arg).map_err(|e| CliError::Scan(format!("{e:#}")))?;
    let query = build_query(&args, &cfg);
    let concurrency = args
        .concurrency
        .filter(|&n| n > 0)
        .unwrap_or_else(|| cfg.concurrency());

    let rows = collect_rows(&dir, &query, concurrency).await;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if args.json {
        render_json(&mut out, &rows)?;
    } else {
        let opts = RenderOptions {
            color: use_color(&args, &cfg),
            full: args.full || cfg.full.unwrap_or(false),
        };
        render_table(&mut out, &rows, terminal_width(), opts)?;
    }
    out.flush()?;
    Ok(())
}

/// Scan `dir`, parse the newest candidates and return the filtered, sorted, limited rows.
pub async fn collect_rows(dir: &Path, query: &ListQuery, concurrency: usize) -> Vec<SessionSummary> {
    let paths = scan_dir(dir).await;
    debug!("found {} session files under {:?}", paths.len(), dir);

    let files = with_mtimes_desc(paths, concurrency).await;
    let take = query.candidate_limit().unwrap_or(files.len());
    if take < files.len() {
        debug!("parsing only the {} newest of {} files", take, files.len());
    }
    let candidates: Vec<PathBuf> = files.into_iter().take(take).map(|f| f.path).collect();

    let summaries = parse_all(candidates, concurrency).await;
    query.apply(summaries)
}

fn build_query(args: &ListArgs, cfg: &ListConfig) -> ListQuery {
    ListQuery {
        cwd_filter: args.cwd_filter.clone(),
        since: date_bound("--since", args.since.as_deref()),
        before: date_bound("--before", args.before.as_deref()),
        sort: args.sort.or(cfg.sort).unwrap_or_default(),
        order: args.order.or(cfg.order).unwrap_or_default(),
        limit: args.limit.or(cfg.limit).map(|n| n.max(0) as usize),
    }
}

fn date_bound(flag: &str, input: Option<&str>) -> Option<i64> {
    let input = input?;
    let parsed = parse_date_input(input);
    if parsed.is_none() {
        debug!("ignoring {} {:?}: not a recognised date", flag, input);
    }
    parsed
}

fn use_color(args: &ListArgs, cfg: &ListConfig) -> bool {
    if args.no_color || cfg.color == Some(false) {
        return false;
    }
    if std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty()) {
        return false;
    }
    atty::is(atty::Stream::Stdout)
}

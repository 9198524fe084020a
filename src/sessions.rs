use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tokio::fs;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::scan;

const ENVIRONMENT_CONTEXT_MARKER: &str = "<environment_context>";

/// Summary of one Codex session file.
///
/// Serialized field order and omission of absent fields define the `--json` output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    /// First user message, collapsed to a single line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ask: Option<String>,
    /// File modified time in milliseconds since epoch; 0 when stat failed.
    pub mtime: u64,
    /// First `timestamp` string seen in any record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Stop reading once both cwd and ask are known.
    pub stop_early: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self { stop_early: true }
    }
}

/// Fields extracted from the record stream, before the file is stat'ed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFields {
    pub cwd: Option<String>,
    pub ask: Option<String>,
    pub timestamp: Option<String>,
}

impl SessionFields {
    fn is_complete(&self) -> bool {
        self.cwd.is_some() && self.ask.is_some()
    }
}

/// Parse a session file into a summary.
///
/// Only failing to open or read the file is an error; malformed lines are skipped and a
/// failed stat leaves `mtime` at 0.
pub async fn parse_file(path: &Path, opts: ParseOptions) -> Result<SessionSummary> {
    let fields = {
        let file = fs::File::open(path)
            .await
            .with_context(|| format!("failed to open session file {:?}", path))?;
        parse_reader(BufReader::new(file), opts)
            .await
            .with_context(|| format!("failed to read session file {:?}", path))?
    };

    let mtime = scan::mtime(path).await;

    Ok(SessionSummary {
        path: path.to_string_lossy().into_owned(),
        cwd: fields.cwd,
        ask: fields.ask,
        mtime,
        timestamp: fields.timestamp,
    })
}

/// Scan JSONL records from `reader`, extracting the first cwd, ask and timestamp.
pub async fn parse_reader<R>(mut reader: R, opts: ParseOptions) -> std::io::Result<SessionFields>
where
    R: AsyncBufRead + Unpin,
{
    let mut fields = SessionFields::default();
    let mut buf: Vec<u8> = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(trim_line_ending(&buf));
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(_) => continue,
        };

        apply_record(&mut fields, &value);

        if opts.stop_early && fields.is_complete() {
            break;
        }
    }

    Ok(fields)
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn apply_record(fields: &mut SessionFields, value: &Value) {
    if fields.timestamp.is_none()
        && let Some(ts) = value.get("timestamp").and_then(Value::as_str)
        && !ts.is_empty()
    {
        fields.timestamp = Some(ts.to_string());
    }

    if value.get("record_type").and_then(Value::as_str) == Some("state") {
        return;
    }
    if !is_user_message(value) {
        return;
    }

    for text in texts_from_content(value.get("content")) {
        if is_environment_context(text) {
            if fields.cwd.is_none()
                && let Some(cwd) = extract_cwd(text)
                && !cwd.is_empty()
            {
                fields.cwd = Some(cwd);
            }
        } else if fields.ask.is_none() {
            let ask = normalize_whitespace(text);
            if !ask.is_empty() {
                fields.ask = Some(ask);
            }
        }
    }
}

fn is_user_message(value: &Value) -> bool {
    let role = match value.get("role") {
        Some(v) if !v.is_null() => Some(v),
        _ => value.get("author"),
    };
    value.get("type").and_then(Value::as_str) == Some("message")
        && role.and_then(Value::as_str) == Some("user")
}

/// Text fragments carried by a record's `content`, which may be a string, an array of
/// parts, or a single part object.
fn texts_from_content(content: Option<&Value>) -> Vec<&str> {
    match content {
        Some(Value::String(s)) => vec![s.as_str()],
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|part| {
                let obj = part.as_object()?;
                obj.get("text")
                    .and_then(Value::as_str)
                    .or_else(|| obj.get("content").and_then(Value::as_str))
            })
            .collect(),
        Some(Value::Object(obj)) => obj
            .get("text")
            .and_then(Value::as_str)
            .into_iter()
            .collect(),
        _ => Vec::new(),
    }
}

fn is_environment_context(text: &str) -> bool {
    text.trim_start().starts_with(ENVIRONMENT_CONTEXT_MARKER)
}

fn cwd_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<cwd>([^<]+)</cwd>").expect("valid cwd tag regex"))
}

fn cwd_open_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<cwd>\s*([^<]+)").expect("valid cwd open tag regex"))
}

/// Pull the working directory out of an environment context block.
///
/// A closed `<cwd>...</cwd>` pair wins. Otherwise the first line holding an opening
/// `<cwd>` tag is used, so a truncated block like `<cwd>/repo` still yields `/repo`.
fn extract_cwd(text: &str) -> Option<String> {
    if let Some(caps) = cwd_tag_regex().captures(text) {
        return Some(caps[1].trim().to_string());
    }
    text.lines()
        .find_map(|line| cwd_open_tag_regex().captures(line))
        .map(|caps| caps[1].trim().to_string())
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

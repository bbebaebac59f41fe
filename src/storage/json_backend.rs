use std::{
    cmp::Ordering,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::CapabilityError;
use crate::gateway::{value_to_text, PersistenceCapability, QueryCapability, Record, Row};
use crate::utils::paths::ensure_dir;

use super::Result;

const TMP_SUFFIX: &str = "tmp";

/// A table of flat records stored as one JSON array.
///
/// Queries use query-by-example filters (see [`matches_filter`]); saves upsert
/// on the key field when one is configured.
pub struct JsonRecordStore {
    path: PathBuf,
    key_field: Option<String>,
    write_lock: Mutex<()>,
}

impl JsonRecordStore {
    pub fn new(path: impl Into<PathBuf>, key_field: Option<String>) -> Self {
        Self {
            path: path.into(),
            key_field,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows currently on disk. A missing file is an empty table.
    pub fn rows(&self) -> Result<Vec<Map<String, Value>>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&self.path)?;
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&data)?)
    }

    pub fn write_rows(&self, rows: &[Map<String, Value>]) -> Result<()> {
        let json = serde_json::to_string_pretty(rows)?;
        let tmp = tmp_path(&self.path);
        write_atomic(&tmp, &json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn upsert(&self, rows: &mut Vec<Map<String, Value>>, record: &Record) {
        let replacement: Map<String, Value> = record
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect();

        let key = self
            .key_field
            .as_ref()
            .and_then(|field| record.get(field).map(|value| (field, value)));

        if let Some((field, value)) = key {
            if let Some(existing) = rows.iter_mut().find(|row| {
                row.get(field)
                    .map(|current| value_to_text(current) == *value)
                    .unwrap_or(false)
            }) {
                *existing = replacement;
                return;
            }
        }
        rows.push(replacement);
    }
}

#[async_trait]
impl QueryCapability for JsonRecordStore {
    async fn query(&self, parameters: &Record) -> std::result::Result<Vec<Row>, CapabilityError> {
        let rows = self.rows()?;
        let matched: Vec<Row> = rows
            .into_iter()
            .filter(|row| {
                parameters.iter().all(|(field, filter)| {
                    row.get(field)
                        .map(|value| matches_filter(&value_to_text(value), filter))
                        .unwrap_or(false)
                })
            })
            .map(Value::Object)
            .collect();
        debug!(path = %self.path.display(), matches = matched.len(), "json query");
        Ok(matched)
    }
}

#[async_trait]
impl PersistenceCapability for JsonRecordStore {
    async fn persist(&self, record: &Record) -> std::result::Result<(), CapabilityError> {
        let _guard = self.write_lock.lock().await;
        let mut rows = self.rows()?;
        self.upsert(&mut rows, record);
        self.write_rows(&rows)?;
        debug!(path = %self.path.display(), rows = rows.len(), "json record persisted");
        Ok(())
    }
}

/// Query-by-example match of a stored value against a filter.
///
/// - `>`, `<`, `>=`, `<=`, `!=`/`<>` prefixes compare numerically when both
///   sides are numbers, lexically otherwise;
/// - `%` and `_` are LIKE wildcards;
/// - anything else is a case-insensitive equality test.
pub fn matches_filter(value: &str, filter: &str) -> bool {
    let filter = filter.trim();
    for operator in OPERATORS {
        if let Some(operand) = filter.strip_prefix(operator) {
            let ordering = compare(value.trim(), operand.trim());
            return match operator {
                ">=" => ordering != Ordering::Less,
                "<=" => ordering != Ordering::Greater,
                "!=" | "<>" => ordering != Ordering::Equal,
                ">" => ordering == Ordering::Greater,
                _ => ordering == Ordering::Less,
            };
        }
    }
    if filter.contains('%') || filter.contains('_') {
        return like_match(&value.to_lowercase(), &filter.to_lowercase());
    }
    value.trim().eq_ignore_ascii_case(filter)
}

// Two-character operators must be tried before their one-character prefixes.
const OPERATORS: [&str; 6] = [">=", "<=", "!=", "<>", ">", "<"];

fn compare(left: &str, right: &str) -> Ordering {
    match (left.parse::<f64>(), right.parse::<f64>()) {
        (Ok(a), Ok(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        _ => left.to_lowercase().cmp(&right.to_lowercase()),
    }
}

/// SQL LIKE: `%` matches any run of characters, `_` exactly one.
fn like_match(value: &str, pattern: &str) -> bool {
    let value: Vec<char> = value.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let (mut v, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while v < value.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == value[v]) {
            v += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            backtrack = Some((p, v));
            p += 1;
        } else if let Some((star_p, star_v)) = backtrack {
            p = star_p + 1;
            v = star_v + 1;
            backtrack = Some((star_p, star_v + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == '%')
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_atomic(path: &Path, data: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    Ok(())
}

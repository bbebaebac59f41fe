pub mod json_backend;

use std::path::{Path, PathBuf};

use crate::errors::CapabilityError;

pub type Result<T> = std::result::Result<T, CapabilityError>;

pub use json_backend::{matches_filter, JsonRecordStore};

/// File backing a named table under the data directory.
pub fn table_path(data_dir: &Path, table: &str) -> PathBuf {
    data_dir.join(format!("{}.json", canonical_name(table)))
}

fn canonical_name(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' => c,
            _ => '_',
        })
        .collect();
    if sanitized.trim_matches('_').is_empty() {
        "table".into()
    } else {
        sanitized
    }
}

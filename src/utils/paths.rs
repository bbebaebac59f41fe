use dirs::home_dir;
use std::{env, fs, io, path::Path, path::PathBuf};

const DEFAULT_DIR_NAME: &str = ".form_core";
const FORMS_DIR: &str = "forms";
const DATA_DIR: &str = "data";

/// Returns the application data directory, defaulting to `~/.form_core`.
pub fn app_data_dir() -> PathBuf {
    if let Some(custom) = env::var_os("FORM_CORE_HOME") {
        return PathBuf::from(custom);
    }
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_DIR_NAME)
}

/// Directory holding form definition files.
pub fn forms_dir_in(base: &Path) -> PathBuf {
    base.join(FORMS_DIR)
}

/// Directory holding the JSON record tables.
pub fn data_dir_in(base: &Path) -> PathBuf {
    base.join(DATA_DIR)
}

pub fn ensure_dir(path: &Path) -> io::Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

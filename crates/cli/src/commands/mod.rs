mod reconcile;
mod status;

pub use reconcile::{once, run};
pub use status::status;

use std::path::Path;

/// Creates the directory of a file-backed `SQLite` URL.
fn ensure_database_dir(database_url: &str) -> std::io::Result<()> {
    let Some(file_path) = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
    else {
        return Ok(());
    };

    let file_path = file_path.split('?').next().unwrap_or(file_path);
    if file_path.is_empty() || file_path.starts_with(":memory:") {
        return Ok(());
    }

    if let Some(parent) = Path::new(file_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            tracing::info!("Creating directory for SQLite database: {}", parent.display());
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_parent_of_file_url() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("deals.sqlite3");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());

        ensure_database_dir(&url).unwrap();
        assert!(dir.path().join("nested").is_dir());
    }

    #[test]
    fn ignores_memory_and_foreign_urls() {
        ensure_database_dir("sqlite::memory:").unwrap();
        ensure_database_dir("postgres://localhost/db").unwrap();
    }
}

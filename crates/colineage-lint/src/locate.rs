//! Model SQL file lookup

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Find a SQL file by name under `root`
///
/// A trailing `.sql` on `name` is optional. Files named `<base>.sql` or
/// exactly `<base>` match; the first match in walk order (entries sorted by
/// file name) wins.
pub fn find_sql_file(root: &Path, name: &str) -> Option<PathBuf> {
    let base = name.strip_suffix(".sql").unwrap_or(name);
    let candidates = [format!("{base}.sql"), base.to_string()];

    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .find(|entry| {
            let file_name = entry.file_name().to_string_lossy();
            candidates.iter().any(|candidate| *candidate == file_name)
        })
        .map(|entry| entry.into_path())
}

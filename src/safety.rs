//! Guard against writing a report over the Mixxx database.
//!
//! `--output` overwrites whatever is at the given path, so anything that looks
//! like a database, or that is the source database itself, is refused.

use anyhow::{bail, Result};
use std::path::Path;

/// Extensions never accepted as report output
const DATABASE_EXTENSIONS: [&str; 3] = ["sqlite", "sqlite3", "db"];

/// Validates that a report path is safe to overwrite.
///
/// Fails when the output has a database extension or resolves to one of
/// `source_paths` (compared after canonicalization when both exist).
pub fn validate_output_path(output: &Path, source_paths: &[&Path]) -> Result<()> {
    let extension = output
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if DATABASE_EXTENSIONS.contains(&extension.as_str()) {
        bail!(
            "Safety check failed: output '{}' looks like a database (.{})",
            output.display(),
            extension
        );
    }

    for source in source_paths {
        let same = output == *source
            || matches!(
                (output.canonicalize(), source.canonicalize()),
                (Ok(a), Ok(b)) if a == b
            );
        if same {
            bail!(
                "Safety check failed: output '{}' cannot be the same as source '{}'",
                output.display(),
                source.display()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_valid_report_path() {
        let output = PathBuf::from("/tmp/set-report.json");
        let source = PathBuf::from("/home/dj/.mixxx/mixxxdb.sqlite");
        assert!(validate_output_path(&output, &[&source]).is_ok());
    }

    #[test]
    fn test_database_extension_blocked() {
        let source = PathBuf::from("/home/dj/.mixxx/mixxxdb.sqlite");
        for name in ["/tmp/out.sqlite", "/tmp/out.SQLITE3", "/tmp/out.db"] {
            let result = validate_output_path(Path::new(name), &[&source]);
            assert!(result.unwrap_err().to_string().contains("looks like a database"));
        }
    }

    #[test]
    fn test_output_equals_source() {
        let path = PathBuf::from("/data/report.txt");
        let result = validate_output_path(&path, &[&path]);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("cannot be the same as source"));
    }
}

//! Log file discovery.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::Result;

/// Recursively collect files under `root` whose name ends with one of
/// `extensions`, in natural order of their file names.
pub fn find_log_files(root: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let wanted = has_extension(&entry.file_name().to_string_lossy(), extensions);
        if wanted {
            paths.push(entry.into_path());
        }
    }
    paths.sort_by(|a, b| natural_cmp(&file_name(a), &file_name(b)).then_with(|| a.cmp(b)));
    Ok(paths)
}

pub fn has_extension(name: &str, extensions: &[String]) -> bool {
    extensions.iter().any(|ext| name.ends_with(ext.as_str()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Chunk {
    // Digit runs order before text at the same position.
    Number(u128, usize),
    Text(String),
}

fn chunks(name: &str) -> Vec<Chunk> {
    let mut out = Vec::new();
    let mut rest = name;
    while let Some(first) = rest.chars().next() {
        let is_digit = first.is_ascii_digit();
        let end = rest
            .find(|c: char| c.is_ascii_digit() != is_digit)
            .unwrap_or(rest.len());
        let (head, tail) = rest.split_at(end);
        if is_digit {
            match head.parse::<u128>() {
                Ok(n) => out.push(Chunk::Number(n, head.len())),
                Err(_) => out.push(Chunk::Text(head.to_string())),
            }
        } else {
            out.push(Chunk::Text(head.to_lowercase()));
        }
        rest = tail;
    }
    out
}

/// Compare file names so that `run2` sorts before `run10`.
///
/// Digit runs compare numerically, everything else case-insensitively.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    chunks(a).cmp(&chunks(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_natural_order() {
        let mut names = vec!["run10.log", "Run2.log", "run1.log", "alpha.log"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["alpha.log", "run1.log", "Run2.log", "run10.log"]);
    }

    #[test]
    fn test_natural_order_leading_zeros() {
        assert_eq!(natural_cmp("f007.log", "f7.log"), Ordering::Greater);
        assert_eq!(natural_cmp("f7.log", "f8.log"), Ordering::Less);
    }

    #[test]
    fn test_has_extension() {
        let exts = vec![".log".to_string(), ".txt".to_string()];
        assert!(has_extension("a.log", &exts));
        assert!(has_extension("a.old.txt", &exts));
        assert!(!has_extension("a.csv", &exts));
    }

    #[test]
    fn test_find_recurses_and_filters() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("log10.log"), "").unwrap();
        fs::write(dir.path().join("log2.log"), "").unwrap();
        fs::write(dir.path().join("nested").join("log3.log"), "").unwrap();
        fs::write(dir.path().join("notes.md"), "").unwrap();

        let found = find_log_files(dir.path(), &[".log".to_string()]).unwrap();
        let names: Vec<String> = found.iter().map(|p| file_name(p)).collect();
        assert_eq!(names, vec!["log2.log", "log3.log", "log10.log"]);
    }
}

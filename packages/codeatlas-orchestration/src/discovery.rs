//! Repository discovery: walk the tree, honour excludes, tag languages.

use codeatlas_ir::features::parsing::Language;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const DEFAULT_EXCLUDES: &[&str] = &[
    ".git",
    ".hg",
    ".venv",
    "venv",
    "node_modules",
    "vendor",
    "target",
    "build",
    "dist",
    "__pycache__",
    ".mypy_cache",
    ".pytest_cache",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Repo-relative path with forward slashes.
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub language: Language,
}

/// Walk `repo_path`, skipping excluded directories, keeping files with a
/// known language tag. Output is sorted by relative path.
pub fn discover(repo_path: &Path, excludes: &[String]) -> Vec<SourceFile> {
    let mut files = Vec::new();

    let walker = WalkDir::new(repo_path).into_iter().filter_entry(|entry| {
        let name = entry.file_name().to_string_lossy();
        !excludes.iter().any(|x| x == name.as_ref())
    });

    for entry in walker.flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let language = Language::from_path(&path.to_string_lossy());
        if language == Language::Unknown {
            continue;
        }
        let Ok(rel) = path.strip_prefix(repo_path) else {
            continue;
        };
        files.push(SourceFile {
            rel_path: rel.to_string_lossy().replace('\\', "/"),
            abs_path: path.to_path_buf(),
            language,
        });
    }

    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    files
}

pub fn default_excludes() -> Vec<String> {
    DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_discovery_skips_excluded_dirs() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        fs::write(dir.path().join("src/a.py"), "x = 1\n").unwrap();
        fs::write(dir.path().join(".git/hook.py"), "x = 1\n").unwrap();
        fs::write(dir.path().join("node_modules/pkg/b.py"), "x = 1\n").unwrap();
        fs::write(dir.path().join("README.md"), "# readme\n").unwrap();

        let files = discover(dir.path(), &default_excludes());
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].rel_path, "src/a.py");
        assert_eq!(files[0].language, Language::Python);
    }

    #[test]
    fn test_discovery_sorted() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.py"), "").unwrap();
        fs::write(dir.path().join("a.py"), "").unwrap();

        let files = discover(dir.path(), &default_excludes());
        let paths: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(paths, vec!["a.py", "b.py"]);
    }
}

// File-set resolution for model builds: literal paths and glob patterns,
// the common root directory, and human-readable size labels.
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use bytesize::ByteSize;
use globset::GlobBuilder;
use tracing::debug;
use walkdir::WalkDir;

use crate::core::error::{Error, ErrorKind};

const GLOB_CHARS: [char; 3] = ['*', '?', '['];

pub fn is_glob(pattern: &str) -> bool {
    pattern.contains(GLOB_CHARS)
}

/// Expands a list of file entries into distinct paths, keeping first-seen order.
///
/// Entries are trimmed and blank ones ignored. Entries containing glob syntax
/// are matched against the files below their literal base directory (`**`
/// descends into sub-directories, `*` does not cross separators). Existence of
/// literal entries is not checked here.
pub fn resolve_files<S: AsRef<str>>(entries: &[S]) -> Result<Vec<PathBuf>, Error> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();
    for entry in entries.iter().map(|e| e.as_ref().trim()).filter(|e| !e.is_empty()) {
        let matches = if is_glob(entry) {
            expand_glob(entry)?
        } else {
            vec![PathBuf::from(entry)]
        };
        for path in matches {
            if seen.insert(path.clone()) {
                files.push(path);
            }
        }
    }
    Ok(files)
}

fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>, Error> {
    let matcher = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("invalid file pattern `{pattern}`"))
                .with_source(err)
        })?
        .compile_matcher();

    let mut base = PathBuf::new();
    let mut rest = Vec::new();
    for component in Path::new(pattern).components() {
        let text = component.as_os_str().to_string_lossy();
        if rest.is_empty() && !is_glob(&text) {
            base.push(component);
        } else {
            rest.push(text.into_owned());
        }
    }
    let relative_base = base.as_os_str().is_empty();
    let root = if relative_base { PathBuf::from(".") } else { base };

    let mut walker = WalkDir::new(&root).sort_by_file_name();
    if !rest.iter().any(|part| part.contains("**")) {
        walker = walker.max_depth(rest.len());
    }

    let mut matches = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!(pattern, error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = if relative_base {
            entry.path().strip_prefix(".").unwrap_or(entry.path())
        } else {
            entry.path()
        };
        if matcher.is_match(path) {
            matches.push(path.to_path_buf());
        }
    }
    Ok(matches)
}

/// Longest directory prefix shared by the parents of all `paths`.
pub fn common_root(paths: &[PathBuf]) -> PathBuf {
    let mut dirs = paths
        .iter()
        .map(|path| path.parent().unwrap_or_else(|| Path::new("")));
    let Some(first) = dirs.next() else {
        return PathBuf::new();
    };

    let mut prefix: Vec<Component<'_>> = first.components().collect();
    for dir in dirs {
        let shared = prefix
            .iter()
            .zip(dir.components())
            .take_while(|(a, b)| *a == b)
            .count();
        prefix.truncate(shared);
    }
    prefix.iter().collect()
}

/// Directory of `path` relative to `root`, empty when the file sits directly in `root`.
pub fn relative_dir(path: &Path, root: &Path) -> String {
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let relative = parent.strip_prefix(root).unwrap_or(parent);
    relative.to_string_lossy().into_owned()
}

/// Human-readable file size in parentheses, empty when metadata is unavailable.
pub fn file_size_info(path: &Path) -> String {
    match fs::metadata(path) {
        Ok(meta) => format!("({})", ByteSize::b(meta.len())),
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::{common_root, file_size_info, is_glob, relative_dir, resolve_files};
    use std::fs;
    use std::path::{Path, PathBuf};

    #[test]
    fn glob_detection() {
        assert!(is_glob("data/*.csv"));
        assert!(is_glob("data/**/x?.csv"));
        assert!(!is_glob("data/items.csv"));
    }

    #[test]
    fn resolves_literals_and_globs_without_duplicates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        fs::create_dir_all(root.join("sub")).expect("mkdir");
        fs::write(root.join("a.csv"), "id\n").expect("write");
        fs::write(root.join("b.csv"), "id\n").expect("write");
        fs::write(root.join("notes.txt"), "x\n").expect("write");
        fs::write(root.join("sub").join("c.csv"), "id\n").expect("write");

        let flat = format!("{}/*.csv", root.display());
        let deep = format!("{}/**/*.csv", root.display());
        let literal = root.join("a.csv").display().to_string();

        let files = resolve_files(&[literal.clone(), flat.clone(), "  ".to_string()])
            .expect("resolve");
        assert_eq!(files, vec![root.join("a.csv"), root.join("b.csv")]);

        let files = resolve_files(&[deep]).expect("resolve");
        assert!(files.contains(&root.join("sub").join("c.csv")));
        assert!(files.contains(&root.join("a.csv")));
        assert!(!files.iter().any(|path| path.ends_with("notes.txt")));
    }

    #[test]
    fn common_root_is_shared_directory() {
        let paths = vec![
            PathBuf::from("/data/shop/items.csv"),
            PathBuf::from("/data/shop/orders/2024.csv"),
            PathBuf::from("/data/shop/orders/2025.csv"),
        ];
        assert_eq!(common_root(&paths), PathBuf::from("/data/shop"));
        assert_eq!(
            common_root(&[PathBuf::from("/x/y/z.csv")]),
            PathBuf::from("/x/y")
        );
        assert_eq!(common_root(&[]), PathBuf::new());
    }

    #[test]
    fn relative_dir_against_root() {
        let root = Path::new("/data/shop");
        assert_eq!(relative_dir(Path::new("/data/shop/items.csv"), root), "");
        assert_eq!(
            relative_dir(Path::new("/data/shop/orders/2024.csv"), root),
            "orders"
        );
    }

    #[test]
    fn size_info_for_existing_and_missing_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.csv");
        fs::write(&path, "id\n1\n").expect("write");
        let info = file_size_info(&path);
        assert!(info.starts_with('(') && info.ends_with(')'), "{info}");
        assert_eq!(file_size_info(&dir.path().join("missing.csv")), "");
    }
}

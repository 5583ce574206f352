use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Immediate subdirectories of `path`, sorted. A missing directory yields an empty list.
pub fn list_subdirs<P: AsRef<Path>>(path: P) -> io::Result<Vec<PathBuf>> {
    list_entries(path, &|p| p.is_dir())
}

/// Regular files directly inside `path` whose extension matches one of `extensions`
/// (case-insensitive), sorted. A missing directory yields an empty list.
pub fn files_with_extensions<P: AsRef<Path>>(path: P, extensions: &[&str]) -> io::Result<Vec<PathBuf>> {
    list_entries(path, &|p| {
        p.is_file()
            && p.extension()
                .map(|ext| {
                    let ext = ext.to_string_lossy();
                    extensions.iter().any(|wanted| ext.eq_ignore_ascii_case(wanted))
                })
                .unwrap_or(false)
    })
}

fn list_entries<P, F>(path: P, predicate: &F) -> io::Result<Vec<PathBuf>>
where
    P: AsRef<Path>,
    F: Fn(&Path) -> bool + ?Sized,
{
    let path = path.as_ref();
    if !path.is_dir() {
        return Ok(Vec::new());
    }

    let mut result = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry_path = entry?.path();
        if predicate(&entry_path) {
            result.push(entry_path);
        }
    }
    result.sort();
    Ok(result)
}

/// File name of `path` as UTF-8, if it has one
pub fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

/// File stem of `path` as UTF-8, if it has one
pub fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().map(|n| n.to_string_lossy().into_owned())
}

/// Make `path` absolute against the current directory without touching the filesystem.
pub fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

//! A read-only view over the server's download-repository directory (spec
//! §3 File repository view). Listing is a thin wrapper over
//! `std::fs::read_dir`; filename resolution additionally rejects anything
//! that would escape the repository directory, tightening the original's
//! bare string concatenation into a default-secure check (§10.5).

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Lists the files (not subdirectories) directly inside `dir`, as
/// `(name, size_in_bytes)` pairs in directory-iteration order.
pub fn list(dir: &Path) -> io::Result<Vec<(String, u64)>> {
	let mut out = Vec::new();

	for entry in fs::read_dir(dir)? {
		let entry = entry?;

		if entry.file_type()?.is_file() {
			let name = entry.file_name().to_string_lossy().into_owned();
			let size = entry.metadata()?.len();
			out.push((name, size));
		}
	}

	Ok(out)
}

/// Resolves `filename` to a path inside `dir`, returning `None` if the file
/// doesn't exist or `filename` isn't a plain single-component name (e.g. it
/// contains `..` or a path separator).
pub fn resolve(dir: &Path, filename: &str) -> Option<PathBuf> {
	let requested = Path::new(filename);

	let is_plain_name = requested.components().count() == 1 && matches!(requested.components().next(), Some(Component::Normal(_)));

	if !is_plain_name {
		return None;
	}

	let candidate = dir.join(requested);
	candidate.is_file().then_some(candidate)
}

#[cfg(test)]
mod tests {
	use std::fs::File;

	use tempfile::tempdir;

	use super::*;

	#[test]
	fn lists_only_files() {
		let dir = tempdir().unwrap();
		File::create(dir.path().join("a.txt")).unwrap();
		File::create(dir.path().join("b.bin")).unwrap();
		fs::create_dir(dir.path().join("subdir")).unwrap();

		let mut files = list(dir.path()).unwrap();
		files.sort();

		assert_eq!(files.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>(), ["a.txt", "b.bin"]);
	}

	#[test]
	fn resolve_rejects_traversal() {
		let dir = tempdir().unwrap();
		File::create(dir.path().join("a.txt")).unwrap();

		assert!(resolve(dir.path(), "a.txt").is_some());
		assert!(resolve(dir.path(), "../a.txt").is_none());
		assert!(resolve(dir.path(), "sub/a.txt").is_none());
		assert!(resolve(dir.path(), "missing.txt").is_none());
	}
}

//! Lexical path helpers.
//!
//! Neither function touches the filesystem, so they work for paths that were
//! reported by the Lua runtime after the file has gone away.

use std::path::{Component, Path, PathBuf};

/// Resolve `.` and `..` components without following symlinks.
///
/// A `..` that has nothing left to cancel is kept on a relative path and
/// dropped at the root.
pub fn normalize(path: &Path) -> PathBuf {
  let mut normalized = PathBuf::new();
  for component in path.components() {
    match component {
      Component::ParentDir => match normalized.components().next_back() {
        Some(Component::Normal(_)) => {
          normalized.pop();
        }
        Some(Component::RootDir | Component::Prefix(_)) => {}
        _ => normalized.push(".."),
      },
      Component::CurDir => {}
      _ => normalized.push(component),
    }
  }
  normalized
}

/// Express `to` relative to the directory `from`.
///
/// Relative inputs are taken against the working directory, then both paths
/// are normalized. Equal paths give `.`. If the working directory is needed
/// but unavailable, `to` is returned normalized.
pub fn relative_to(from: &Path, to: &Path) -> PathBuf {
  let (from, to) = match (absolute(from), absolute(to)) {
    (Some(from), Some(to)) => (normalize(&from), normalize(&to)),
    _ => return normalize(to),
  };
  let from_components: Vec<_> = from.components().collect();
  let to_components: Vec<_> = to.components().collect();

  let common_len = from_components
    .iter()
    .zip(to_components.iter())
    .take_while(|(a, b)| a == b)
    .count();

  let mut relative = PathBuf::new();
  for _ in common_len..from_components.len() {
    relative.push("..");
  }
  for component in to_components.iter().skip(common_len) {
    relative.push(component);
  }

  if relative.as_os_str().is_empty() {
    PathBuf::from(".")
  } else {
    relative
  }
}

fn absolute(path: &Path) -> Option<PathBuf> {
  if path.is_absolute() {
    Some(path.to_path_buf())
  } else {
    std::env::current_dir().ok().map(|cwd| cwd.join(path))
  }
}

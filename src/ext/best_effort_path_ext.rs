use std::path::{Component, Path, PathBuf};

/// Formats host paths for messages about images and settings files.
///
/// Existing paths are canonicalized. Paths that do not exist yet, such as an
/// image about to be created, are made absolute against the working
/// directory and have their `.` and `..` components folded away.
pub trait BestEffortPathExt {
    fn best_effort_path_display(&self) -> String;
}

impl BestEffortPathExt for Path {
    fn best_effort_path_display(&self) -> String {
        let resolved = self.canonicalize().unwrap_or_else(|_| lexically_absolute(self));
        resolved.display().to_string()
    }
}

fn lexically_absolute(path: &Path) -> PathBuf {
    let joined = match std::env::current_dir() {
        Ok(cwd) if path.is_relative() => cwd.join(path),
        _ => path.to_path_buf(),
    };

    joined
        .components()
        .fold(PathBuf::new(), |mut folded, component| {
            match component {
                Component::CurDir => {}
                // `pop` leaves a bare root in place
                Component::ParentDir => {
                    folded.pop();
                }
                other => folded.push(other),
            }
            folded
        })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn existing_paths_are_canonicalized() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let image = dir.path().join("ramfs.img");
        std::fs::write(&image, b"").expect("Failed to create image");

        let roundabout = dir.path().join(".").join("ramfs.img");
        let expected = image.canonicalize().unwrap().display().to_string();
        assert_eq!(roundabout.best_effort_path_display(), expected);
    }

    #[test]
    fn missing_paths_are_folded_lexically() {
        let path = Path::new("/no/such/./dir/../ramfs.img");
        assert_eq!(path.best_effort_path_display(), "/no/such/ramfs.img");
    }

    #[test]
    fn parent_of_root_stays_at_root() {
        let path = Path::new("/../../missing.img");
        assert_eq!(path.best_effort_path_display(), "/missing.img");
    }

    #[test]
    fn relative_missing_paths_become_absolute() {
        let shown = Path::new("missing-dir/ramfs.img").best_effort_path_display();
        let shown = Path::new(&shown);

        assert!(shown.is_absolute());
        assert!(shown.ends_with("missing-dir/ramfs.img"));
    }
}

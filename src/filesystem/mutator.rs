use snafu::{OptionExt, ensure};
use tracing::{debug, trace};

use crate::filesystem::{
    Directory, File, Tree, TreeError,
    resolver::{components, split_last},
    tree::{
        NameCollisionSnafu, NameTooLongSnafu, NotEmptySnafu, NotFoundSnafu, RootNotRemovableSnafu,
        TooDeepSnafu,
    },
};

impl Tree {
    /// Creates the directory at `path` along with any missing parents.
    /// Existing directories along the way, including the final one, are
    /// reused as they are.
    pub fn make_subdir(&mut self, path: &str) -> Result<&mut Directory, TreeError> {
        self.validate(path)?;
        debug!("Creating directory '{}'", path);

        components(path).try_fold(&mut self.root, |dir, name| {
            descend_or_create(dir, name, path)
        })
    }

    /// Creates an empty file at `path` along with any missing parent
    /// directories. An existing file at `path` is truncated and reused.
    pub fn make_file(&mut self, path: &str) -> Result<&mut File, TreeError> {
        self.validate(path)?;
        let (parents, name) = split_last(path).context(NameCollisionSnafu { path })?;
        debug!("Creating file '{}'", path);

        let parent = parents
            .into_iter()
            .try_fold(&mut self.root, |dir, part| descend_or_create(dir, part, path))?;

        let index = match parent.files.iter().position(|file| file.name == name) {
            Some(index) => {
                trace!("Overwriting existing file '{}'", path);
                parent.files[index].truncate();
                index
            }
            None => {
                ensure!(!parent.contains(name), NameCollisionSnafu { path });
                parent.files.push(File::named(name));
                parent.files.len() - 1
            }
        };

        Ok(&mut parent.files[index])
    }

    pub fn remove_file(&mut self, path: &str) -> Result<File, TreeError> {
        let (parents, name) = split_last(path).context(NotFoundSnafu { path })?;
        let parent = self
            .root
            .resolve_dir_mut(&parents.join("/"))
            .ok()
            .context(NotFoundSnafu { path })?;

        let index = parent
            .files
            .iter()
            .position(|file| file.name == name)
            .context(NotFoundSnafu { path })?;

        debug!("Removing file '{}'", path);
        Ok(parent.files.remove(index))
    }

    /// Removes an empty directory. Directories that still hold any entry are
    /// left untouched.
    pub fn remove_dir(&mut self, path: &str) -> Result<Directory, TreeError> {
        let (parents, name) = split_last(path).context(RootNotRemovableSnafu)?;
        let parent = self
            .root
            .resolve_dir_mut(&parents.join("/"))
            .ok()
            .context(NotFoundSnafu { path })?;

        let index = parent
            .subdirectories
            .iter()
            .position(|dir| dir.name == name)
            .context(NotFoundSnafu { path })?;

        ensure!(
            parent.subdirectories[index].is_empty(),
            NotEmptySnafu { path }
        );

        debug!("Removing directory '{}'", path);
        Ok(parent.subdirectories.remove(index))
    }

    fn validate(&self, path: &str) -> Result<(), TreeError> {
        let limits = self.limits();
        let mut depth = 0;
        for name in components(path) {
            ensure!(
                limits.name_fits(name),
                NameTooLongSnafu {
                    name,
                    max: limits.max_name_len,
                }
            );
            depth += 1;
        }

        ensure!(
            depth <= limits.max_depth,
            TooDeepSnafu {
                path,
                max: limits.max_depth,
            }
        );
        Ok(())
    }
}

fn descend_or_create<'a>(
    dir: &'a mut Directory,
    name: &str,
    path: &str,
) -> Result<&'a mut Directory, TreeError> {
    let index = match dir.subdirectories.iter().position(|sub| sub.name == name) {
        Some(index) => index,
        None => {
            ensure!(!dir.contains(name), NameCollisionSnafu { path });
            trace!("Creating intermediate directory '{}'", name);
            dir.subdirectories.push(Directory::named(name));
            dir.subdirectories.len() - 1
        }
    };

    Ok(&mut dir.subdirectories[index])
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rstest::*;

    use super::*;
    use crate::filesystem::{Entry, Limits};

    fn assert_unique_names(dir: &Directory) {
        let mut seen = HashSet::new();
        for entry in dir.entries() {
            assert!(seen.insert(entry.name().to_string()), "duplicate '{}'", entry.name());
            if let Entry::Directory(sub) = entry {
                assert_unique_names(sub);
            }
        }
    }

    #[test]
    fn make_subdir_creates_missing_parents() {
        let mut tree = Tree::default();
        tree.make_subdir("/a/b/c").unwrap();

        assert_eq!(tree.resolve_dir("/a/b/c").unwrap().name(), "c");
        assert_eq!(tree.root().subdirectories().len(), 1);
    }

    #[test]
    fn make_subdir_is_idempotent() {
        let mut tree = Tree::default();
        tree.make_subdir("/boot").unwrap();
        tree.make_subdir("/boot").unwrap();
        tree.make_subdir("boot/").unwrap();

        assert_eq!(tree.root().subdirectories().len(), 1);
        assert!(tree.resolve_dir("/boot").unwrap().is_empty());
    }

    #[test]
    fn make_subdir_on_root_is_a_no_op() {
        let mut tree = Tree::default();
        let root = tree.make_subdir("/").unwrap();
        assert_eq!(root.name(), "");
        assert!(tree.root().is_empty());
    }

    #[test]
    fn make_subdir_keeps_existing_children() {
        let mut tree = Tree::default();
        tree.make_file("/a/keep").unwrap().set_data(b"x").unwrap();
        tree.make_subdir("/a").unwrap();

        assert_eq!(tree.resolve_file("/a/keep").unwrap().data(), b"x");
    }

    #[rstest]
    #[case("/a/b")]
    #[case("/a")]
    #[case("/a/b/c/d")]
    fn directory_through_file_collides(#[case] path: &str) {
        let mut tree = Tree::default();
        tree.make_file("/a").unwrap();

        assert!(matches!(
            tree.make_subdir(path),
            Err(TreeError::NameCollision { .. })
        ));
        assert!(tree.root().subdirectories().is_empty());
    }

    #[test]
    fn file_over_directory_collides() {
        let mut tree = Tree::default();
        tree.make_subdir("/a/b").unwrap();

        assert!(matches!(
            tree.make_file("/a/b"),
            Err(TreeError::NameCollision { .. })
        ));
        assert!(matches!(
            tree.make_file("/"),
            Err(TreeError::NameCollision { .. })
        ));
    }

    #[test]
    fn file_below_file_collides() {
        let mut tree = Tree::default();
        tree.make_file("/kernel").unwrap();

        assert!(matches!(
            tree.make_file("/kernel/config"),
            Err(TreeError::NameCollision { .. })
        ));
    }

    #[test]
    fn make_file_overwrites_existing_file() {
        let mut tree = Tree::default();
        tree.make_file("/doc").unwrap().set_data(&[1, 2, 3]).unwrap();

        let file = tree.make_file("/doc").unwrap();
        assert_eq!(file.size(), 0);
        file.set_data(&[4]).unwrap();

        assert_eq!(tree.root().files().len(), 1);
        assert_eq!(tree.resolve_file("/doc").unwrap().data(), &[4]);
    }

    #[test]
    fn make_file_creates_parents() {
        let mut tree = Tree::default();
        tree.make_file("/usr/share/motd").unwrap();

        assert!(tree.resolve_dir("/usr/share").is_ok());
        assert_eq!(tree.resolve_file("/usr/share/motd").unwrap().size(), 0);
    }

    #[test]
    fn names_stay_unique_after_mixed_creations() {
        let mut tree = Tree::default();
        for path in ["/a/b", "/a/c", "/a/b/d", "/a/c", "/e", "/a/b/d", "/a"] {
            let _ = tree.make_file(path);
            let _ = tree.make_subdir(path);
        }

        assert_unique_names(tree.root());
    }

    #[test]
    fn overlong_name_is_rejected_before_any_change() {
        let mut tree = Tree::new(Limits {
            max_name_len: 4,
            ..Limits::default()
        });

        let err = tree.make_subdir("/ok/toolong").unwrap_err();
        assert!(matches!(err, TreeError::NameTooLong { max: 4, .. }));
        assert!(tree.root().is_empty());

        assert!(tree.make_file("/ok/fine").is_ok());
    }

    #[test]
    fn deep_paths_are_rejected() {
        let mut tree = Tree::new(Limits {
            max_depth: 2,
            ..Limits::default()
        });

        assert!(tree.make_subdir("/a/b").is_ok());
        assert!(matches!(
            tree.make_subdir("/a/b/c"),
            Err(TreeError::TooDeep { max: 2, .. })
        ));
        assert!(matches!(
            tree.make_file("/a/b/c"),
            Err(TreeError::TooDeep { .. })
        ));
    }

    #[test]
    fn remove_file_detaches_entry() {
        let mut tree = Tree::default();
        tree.make_file("/a/f").unwrap().set_data(b"abc").unwrap();

        let removed = tree.remove_file("/a/f").unwrap();
        assert_eq!(removed.data(), b"abc");
        assert!(tree.resolve_file("/a/f").is_err());
        assert!(tree.resolve_dir("/a").unwrap().is_empty());
    }

    #[rstest]
    #[case("/missing")]
    #[case("/a")]
    #[case("/nope/f")]
    #[case("/")]
    fn remove_file_reports_not_found(#[case] path: &str) {
        let mut tree = Tree::default();
        tree.make_subdir("/a").unwrap();

        assert!(matches!(
            tree.remove_file(path),
            Err(TreeError::NotFound { .. })
        ));
    }

    #[test]
    fn remove_dir_is_strict() {
        let mut tree = Tree::default();
        tree.make_subdir("/a/b").unwrap();

        assert!(matches!(
            tree.remove_dir("/a"),
            Err(TreeError::NotEmpty { .. })
        ));
        assert!(tree.remove_dir("/a/b").is_ok());
        assert!(tree.remove_dir("/a").is_ok());
        assert!(tree.root().is_empty());
    }

    #[test]
    fn remove_dir_refuses_files_and_root() {
        let mut tree = Tree::default();
        tree.make_file("/f").unwrap();

        assert!(matches!(
            tree.remove_dir("/f"),
            Err(TreeError::NotFound { .. })
        ));
        assert!(matches!(
            tree.remove_dir("/missing"),
            Err(TreeError::NotFound { .. })
        ));
        assert!(matches!(
            tree.remove_dir("/"),
            Err(TreeError::RootNotRemovable)
        ));
    }

    #[test]
    fn blocked_path_creates_no_partial_directories() {
        let mut tree = Tree::default();
        tree.make_file("/a/f").unwrap();

        assert!(matches!(
            tree.make_subdir("/a/f/x/y"),
            Err(TreeError::NameCollision { .. })
        ));
        assert!(matches!(
            tree.make_file("/a/f/x/y"),
            Err(TreeError::NameCollision { .. })
        ));
        assert!(tree.resolve_dir("/a").unwrap().subdirectories().is_empty());
        assert_eq!(tree.resolve_dir("/a").unwrap().files().len(), 1);
    }

    #[test]
    fn deepest_allowed_entry_is_accepted() {
        let mut tree = Tree::default();
        let max = tree.limits().max_depth;
        let deepest = "/d".repeat(max);

        assert!(tree.make_file(&deepest).is_ok());
        assert!(matches!(
            tree.make_subdir(&format!("{deepest}/d")),
            Err(TreeError::TooDeep { .. })
        ));
    }

    #[test]
    fn removed_name_can_be_reused_with_other_kind() {
        let mut tree = Tree::default();
        tree.make_file("/swap").unwrap();
        tree.remove_file("/swap").unwrap();

        assert!(tree.make_subdir("/swap").is_ok());
    }
}

use snafu::OptionExt;

use crate::filesystem::{Directory, File, Tree, TreeError, tree::NotFoundSnafu};

/// Non-empty components of a slash-separated path.
pub fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|component| !component.is_empty())
}

/// Splits a path into its parent components and the final name.
/// Returns `None` for paths that address the root.
pub(crate) fn split_last(path: &str) -> Option<(Vec<&str>, &str)> {
    let mut parts = components(path).collect::<Vec<_>>();
    let last = parts.pop()?;
    Some((parts, last))
}

impl Directory {
    fn walk<'p>(&self, parts: impl IntoIterator<Item = &'p str>) -> Option<&Directory> {
        parts
            .into_iter()
            .try_fold(self, |dir, name| dir.subdirectory(name))
    }

    fn walk_mut<'p>(&mut self, parts: impl IntoIterator<Item = &'p str>) -> Option<&mut Directory> {
        parts.into_iter().try_fold(self, |dir, name| {
            dir.subdirectories.iter_mut().find(|sub| sub.name == name)
        })
    }

    /// The empty path and `/` address this directory itself.
    pub fn resolve_dir(&self, path: &str) -> Result<&Directory, TreeError> {
        self.walk(components(path)).context(NotFoundSnafu { path })
    }

    pub fn resolve_dir_mut(&mut self, path: &str) -> Result<&mut Directory, TreeError> {
        self.walk_mut(components(path)).context(NotFoundSnafu { path })
    }

    pub fn resolve_file(&self, path: &str) -> Result<&File, TreeError> {
        split_last(path)
            .and_then(|(parents, name)| self.walk(parents)?.file(name))
            .context(NotFoundSnafu { path })
    }

    pub fn resolve_file_mut(&mut self, path: &str) -> Result<&mut File, TreeError> {
        split_last(path)
            .and_then(|(parents, name)| {
                self.walk_mut(parents)?
                    .files
                    .iter_mut()
                    .find(|file| file.name == name)
            })
            .context(NotFoundSnafu { path })
    }
}

impl Tree {
    pub fn resolve_dir(&self, path: &str) -> Result<&Directory, TreeError> {
        self.root.resolve_dir(path)
    }

    pub fn resolve_dir_mut(&mut self, path: &str) -> Result<&mut Directory, TreeError> {
        self.root.resolve_dir_mut(path)
    }

    pub fn resolve_file(&self, path: &str) -> Result<&File, TreeError> {
        self.root.resolve_file(path)
    }

    pub fn resolve_file_mut(&mut self, path: &str) -> Result<&mut File, TreeError> {
        self.root.resolve_file_mut(path)
    }
}

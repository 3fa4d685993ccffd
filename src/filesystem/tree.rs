use std::collections::TryReserveError;

use derive_more::Display;
use snafu::{ResultExt, Snafu};

use crate::filesystem::Limits;

/// A directory node. Subdirectories and files share one namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directory {
    pub(crate) name: String,
    pub(crate) subdirectories: Vec<Directory>,
    pub(crate) files: Vec<File>,
}

impl Directory {
    pub(crate) fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Empty for the root directory.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subdirectories(&self) -> &[Directory] {
        &self.subdirectories
    }

    pub fn files(&self) -> &[File] {
        &self.files
    }

    pub fn subdirectory(&self, name: &str) -> Option<&Directory> {
        self.subdirectories.iter().find(|dir| dir.name == name)
    }

    pub fn file(&self, name: &str) -> Option<&File> {
        self.files.iter().find(|file| file.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.subdirectory(name).is_some() || self.file(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.subdirectories.is_empty() && self.files.is_empty()
    }

    /// Subdirectories first, then files, each in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = Entry<'_>> {
        self.subdirectories
            .iter()
            .map(Entry::Directory)
            .chain(self.files.iter().map(Entry::File))
    }
}

/// A file node. `size` is derived from the owned buffer, so the two cannot
/// drift apart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct File {
    pub(crate) name: String,
    pub(crate) data: Vec<u8>,
}

impl File {
    pub(crate) fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Copies `bytes` into a freshly reserved buffer. The previous contents
    /// are kept if the reservation fails.
    pub fn set_data(&mut self, bytes: &[u8]) -> Result<(), TreeError> {
        let mut data = Vec::new();
        data.try_reserve_exact(bytes.len()).context(AllocationSnafu {
            name: self.name.clone(),
        })?;
        data.extend_from_slice(bytes);
        self.data = data;
        Ok(())
    }

    /// Swaps in an already owned buffer and hands back the old one.
    pub fn replace_data(&mut self, data: Vec<u8>) -> Vec<u8> {
        std::mem::replace(&mut self.data, data)
    }

    pub(crate) fn truncate(&mut self) {
        self.data = Vec::new();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum EntryKind {
    #[display("dir ")]
    Directory,
    #[display("file")]
    File,
}

/// Borrowed view of one child of a directory.
#[derive(Debug, Clone, Copy)]
pub enum Entry<'a> {
    Directory(&'a Directory),
    File(&'a File),
}

impl Entry<'_> {
    pub fn name(&self) -> &str {
        match self {
            Entry::Directory(dir) => dir.name(),
            Entry::File(file) => file.name(),
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            Entry::Directory(_) => EntryKind::Directory,
            Entry::File(_) => EntryKind::File,
        }
    }
}

/// Handle owning a whole tree together with the limits it was built under.
/// Dropping it releases every node and file buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    pub(crate) root: Directory,
    pub(crate) limits: Limits,
}

impl Tree {
    /// An empty tree, as written by a fresh `mkfs`.
    pub fn new(limits: Limits) -> Self {
        Self {
            root: Directory::default(),
            limits,
        }
    }

    pub(crate) fn from_root(root: Directory, limits: Limits) -> Self {
        Self { root, limits }
    }

    pub fn root(&self) -> &Directory {
        &self.root
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TreeError {
    #[snafu(display("No such entry: '{}'", path))]
    NotFound { path: String },
    #[snafu(display("'{}' already exists as an entry of another kind", path))]
    NameCollision { path: String },
    #[snafu(display("Directory '{}' is not empty", path))]
    NotEmpty { path: String },
    #[snafu(display("Name '{}' is longer than {} bytes", name, max))]
    NameTooLong { name: String, max: usize },
    #[snafu(display("Path '{}' is nested deeper than {} levels", path, max))]
    TooDeep { path: String, max: usize },
    #[snafu(display("The root directory cannot be removed"))]
    RootNotRemovable,
    #[snafu(display("Failed to allocate a buffer for file '{}'", name))]
    AllocationError {
        name: String,
        source: TryReserveError,
    },
}

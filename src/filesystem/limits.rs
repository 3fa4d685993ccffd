/// Bounds applied to names and nesting, both when building a tree and when
/// importing one from an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Longest accepted path component, in bytes.
    pub max_name_len: usize,
    /// Deepest accepted entry, counted in path components.
    pub max_depth: usize,
}

impl Limits {
    /// Names are stored behind a one-byte length prefix.
    pub const NAME_LEN_CEILING: usize = u8::MAX as usize;
    pub const DEPTH_CEILING: usize = 1024;

    pub const DEFAULT_MAX_DEPTH: usize = 32;

    pub fn name_fits(&self, name: &str) -> bool {
        !name.is_empty() && name.len() <= self.max_name_len
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_name_len: Self::NAME_LEN_CEILING,
            max_depth: Self::DEFAULT_MAX_DEPTH,
        }
    }
}

use crate::{
    codec::format::{HEADER_LEN, record_len},
    filesystem::{Directory, File},
};

/// Precomputed sizes for one directory and its subtree, mirroring the tree
/// shape. Lets the exporter know every offset before writing a single byte.
#[derive(Debug)]
pub(crate) struct Layout {
    /// This directory's own record.
    pub record_len: u64,
    /// Data of this directory's own files.
    pub files_len: u64,
    /// Records of the whole subtree, this one included.
    pub records_len: u64,
    /// Data of every file in the subtree.
    pub payload_len: u64,
    pub children: Vec<Layout>,
}

impl Layout {
    pub fn of(dir: &Directory) -> Self {
        let children = dir.subdirectories().iter().map(Layout::of).collect::<Vec<_>>();

        let record_len = record_len(dir);
        let files_len = dir.files().iter().map(File::size).sum::<u64>();

        Self {
            record_len,
            files_len,
            records_len: record_len + children.iter().map(|c| c.records_len).sum::<u64>(),
            payload_len: files_len + children.iter().map(|c| c.payload_len).sum::<u64>(),
            children,
        }
    }

    /// Total image size when this layout describes the root.
    pub fn image_len(&self) -> u64 {
        HEADER_LEN + self.records_len + self.payload_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::Tree;

    #[test]
    fn sizes_accumulate_over_subtree() {
        let mut tree = Tree::default();
        tree.make_file("/a/one").unwrap().set_data(&[0; 10]).unwrap();
        tree.make_file("/a/b/two").unwrap().set_data(&[0; 5]).unwrap();
        tree.make_file("/three").unwrap().set_data(&[0; 1]).unwrap();

        let layout = Layout::of(tree.root());

        assert_eq!(layout.files_len, 1);
        assert_eq!(layout.payload_len, 16);
        assert_eq!(layout.children.len(), 1);
        assert_eq!(layout.children[0].files_len, 10);
        assert_eq!(layout.children[0].payload_len, 15);

        let records = layout.record_len
            + layout.children[0].record_len
            + layout.children[0].children[0].record_len;
        assert_eq!(layout.records_len, records);
        assert_eq!(layout.image_len(), 16 + records + 16);
    }
}

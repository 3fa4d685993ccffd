use std::io::Write;

use snafu::{OptionExt, ResultExt, Snafu};
use tracing::debug;

use crate::{
    codec::{
        format::{MAGIC, ROOT_OFFSET, VERSION},
        layout::Layout,
    },
    filesystem::{Directory, Tree},
};

/// Writes the canonical image of `tree` to `sink` in one linear pass.
pub fn export<W: Write>(tree: &Tree, sink: W) -> Result<(), ExportError> {
    export_with_layout(tree, &Layout::of(tree.root()), sink)
}

/// Encodes `tree` into an in-memory image.
pub fn encode(tree: &Tree) -> Result<Vec<u8>, ExportError> {
    let layout = Layout::of(tree.root());
    let mut image = Vec::with_capacity(usize::try_from(layout.image_len()).unwrap_or_default());
    export_with_layout(tree, &layout, &mut image)?;
    Ok(image)
}

fn export_with_layout<W: Write>(
    tree: &Tree,
    layout: &Layout,
    sink: W,
) -> Result<(), ExportError> {
    debug!(
        "Exporting image: {} bytes of records, {} bytes of payload",
        layout.records_len, layout.payload_len
    );

    let mut exporter = Exporter { sink };
    exporter.write_header(layout.image_len())?;
    exporter.write_records(tree.root(), layout, ROOT_OFFSET, ROOT_OFFSET + layout.records_len)?;
    exporter.write_payload(tree.root())?;
    exporter.sink.flush().context(WriteSnafu)
}

struct Exporter<W> {
    sink: W,
}

impl<W: Write> Exporter<W> {
    fn write_header(&mut self, image_len: u64) -> Result<(), ExportError> {
        self.write(&MAGIC)?;
        self.write(&VERSION.to_le_bytes())?;
        self.write(&image_len.to_le_bytes())
    }

    /// Writes the record of `dir` followed by its subtree's records.
    /// `payload_offset` is where the data of `dir`'s own files begins.
    fn write_records(
        &mut self,
        dir: &Directory,
        layout: &Layout,
        record_offset: u64,
        payload_offset: u64,
    ) -> Result<(), ExportError> {
        self.write_count(dir.subdirectories().len())?;
        self.write_count(dir.files().len())?;

        let first_child_record = record_offset + layout.record_len;
        let first_child_payload = payload_offset + layout.files_len;

        let mut child_record = first_child_record;
        for (sub, sub_layout) in dir.subdirectories().iter().zip(&layout.children) {
            self.write_name(sub.name())?;
            self.write(&child_record.to_le_bytes())?;
            child_record += sub_layout.records_len;
        }

        let mut data_offset = payload_offset;
        for file in dir.files() {
            self.write_name(file.name())?;
            self.write(&data_offset.to_le_bytes())?;
            self.write(&file.size().to_le_bytes())?;
            data_offset += file.size();
        }

        let mut child_record = first_child_record;
        let mut child_payload = first_child_payload;
        for (sub, sub_layout) in dir.subdirectories().iter().zip(&layout.children) {
            self.write_records(sub, sub_layout, child_record, child_payload)?;
            child_record += sub_layout.records_len;
            child_payload += sub_layout.payload_len;
        }

        Ok(())
    }

    fn write_payload(&mut self, dir: &Directory) -> Result<(), ExportError> {
        for file in dir.files() {
            self.write(file.data())?;
        }
        for sub in dir.subdirectories() {
            self.write_payload(sub)?;
        }
        Ok(())
    }

    fn write_count(&mut self, count: usize) -> Result<(), ExportError> {
        let count = u32::try_from(count)
            .ok()
            .context(TooManyEntriesSnafu { count })?;
        self.write(&count.to_le_bytes())
    }

    fn write_name(&mut self, name: &str) -> Result<(), ExportError> {
        let len = u8::try_from(name.len())
            .ok()
            .filter(|len| *len > 0)
            .context(UnencodableNameSnafu { name })?;
        self.write(&[len])?;
        self.write(name.as_bytes())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), ExportError> {
        self.sink.write_all(bytes).context(WriteSnafu)
    }
}

#[derive(Debug, Snafu)]
pub enum ExportError {
    #[snafu(display("Failed to write the image"))]
    WriteError { source: std::io::Error },
    #[snafu(display("Name '{}' cannot be stored in an image", name))]
    UnencodableName { name: String },
    #[snafu(display("A directory with {} entries cannot be stored in an image", count))]
    TooManyEntries { count: usize },
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::filesystem::Tree;

    fn header(image_len: u64) -> Vec<u8> {
        let mut bytes = b"RMFS".to_vec();
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&image_len.to_le_bytes());
        bytes
    }

    #[test]
    fn empty_tree_is_header_and_empty_root() {
        let image = encode(&Tree::default()).unwrap();

        let mut expected = header(24);
        expected.extend_from_slice(&[0; 8]);
        assert_eq!(image, expected);
    }

    #[test]
    fn layout_is_bit_exact() {
        let mut tree = Tree::default();
        tree.make_subdir("/a").unwrap();
        tree.make_file("/f").unwrap().set_data(b"hi").unwrap();

        let image = encode(&tree).unwrap();

        let mut expected = header(62);
        // root record at 16: one subdirectory, one file
        expected.extend_from_slice(&1u32.to_le_bytes());
        expected.extend_from_slice(&1u32.to_le_bytes());
        expected.extend_from_slice(&[1, b'a']);
        expected.extend_from_slice(&52u64.to_le_bytes());
        expected.extend_from_slice(&[1, b'f']);
        expected.extend_from_slice(&60u64.to_le_bytes());
        expected.extend_from_slice(&2u64.to_le_bytes());
        // record of /a at 52
        expected.extend_from_slice(&[0; 8]);
        // payload at 60
        expected.extend_from_slice(b"hi");

        assert_eq!(image, expected);
    }

    #[test]
    fn sibling_subtrees_follow_pre_order() {
        let mut tree = Tree::default();
        tree.make_file("/a/x").unwrap().set_data(b"AA").unwrap();
        tree.make_file("/b/y").unwrap().set_data(b"BBB").unwrap();
        tree.make_file("/top").unwrap().set_data(b"T").unwrap();

        let image = encode(&tree).unwrap();

        assert!(image.ends_with(b"TAABBB"));
    }

    #[test]
    fn encoding_is_deterministic() {
        let mut tree = Tree::default();
        tree.make_file("/etc/hosts").unwrap().set_data(b"127.0.0.1").unwrap();
        tree.make_subdir("/var/log").unwrap();

        assert_eq!(encode(&tree).unwrap(), encode(&tree.clone()).unwrap());
    }

    #[test]
    fn encode_matches_streamed_export() {
        let mut tree = Tree::default();
        tree.make_file("/boot/kernel").unwrap().set_data(&[7; 100]).unwrap();
        tree.make_subdir("/boot/modules").unwrap();

        let mut streamed = Vec::new();
        export(&tree, &mut streamed).unwrap();
        let image = encode(&tree).unwrap();

        assert_eq!(image, streamed);
        assert_eq!(image.len() as u64, Layout::of(tree.root()).image_len());
        assert_eq!(image.capacity(), image.len());
    }

    struct FailingSink;

    impl Write for FailingSink {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn short_write_is_reported() {
        let result = export(&Tree::default(), FailingSink);
        assert!(matches!(result, Err(ExportError::WriteError { .. })));
    }
}

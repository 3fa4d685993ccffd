//! Image layout constants. All integers are little-endian.
//!
//! ```text
//! header     magic "RMFS" | u32 version | u64 image_size
//! record     u32 subdirectory_count | u32 file_count
//!            subdirectory_count * (u8 name_len | name | u64 record_offset)
//!            file_count         * (u8 name_len | name | u64 data_offset | u64 size)
//! payload    file data, in record order
//! ```
//!
//! The root record starts right after the header. Records are laid out in
//! pre-order, so every subdirectory reference points forward.

use crate::filesystem::Directory;

pub const MAGIC: [u8; 4] = *b"RMFS";
pub const VERSION: u32 = 1;

pub const HEADER_LEN: u64 = 16;
pub const ROOT_OFFSET: u64 = HEADER_LEN;
pub const RECORD_COUNTS_LEN: u64 = 8;

const NAME_PREFIX_LEN: u64 = 1;
const OFFSET_LEN: u64 = 8;
const SIZE_LEN: u64 = 8;

/// Smallest possible entries, with a one-byte name.
pub const MIN_SUBDIR_ENTRY_LEN: u64 = NAME_PREFIX_LEN + 1 + OFFSET_LEN;
pub const MIN_FILE_ENTRY_LEN: u64 = NAME_PREFIX_LEN + 1 + OFFSET_LEN + SIZE_LEN;

pub fn subdir_entry_len(name: &str) -> u64 {
    NAME_PREFIX_LEN + name.len() as u64 + OFFSET_LEN
}

pub fn file_entry_len(name: &str) -> u64 {
    NAME_PREFIX_LEN + name.len() as u64 + OFFSET_LEN + SIZE_LEN
}

/// Encoded length of one directory record, excluding its children's records.
pub fn record_len(dir: &Directory) -> u64 {
    let subdirs = dir
        .subdirectories()
        .iter()
        .map(|sub| subdir_entry_len(sub.name()))
        .sum::<u64>();
    let files = dir
        .files()
        .iter()
        .map(|file| file_entry_len(file.name()))
        .sum::<u64>();

    RECORD_COUNTS_LEN + subdirs + files
}

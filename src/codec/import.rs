use std::{
    collections::{HashSet, TryReserveError},
    io::Read,
    str::Utf8Error,
};

use snafu::{OptionExt, ResultExt, Snafu, ensure};
use tracing::{debug, trace};

use crate::{
    codec::format::{
        HEADER_LEN, MAGIC, MIN_FILE_ENTRY_LEN, MIN_SUBDIR_ENTRY_LEN, ROOT_OFFSET, VERSION,
    },
    filesystem::{Directory, File, Limits, Tree},
};

/// Reads a whole image from `source` and rebuilds its tree.
pub fn import<R: Read>(mut source: R, limits: Limits) -> Result<Tree, ImportError> {
    let mut image = Vec::new();
    source.read_to_end(&mut image).context(ReadSnafu)?;
    decode(&image, limits)
}

/// Rebuilds a tree from an in-memory image, rejecting anything that does not
/// match the layout exactly.
pub fn decode(image: &[u8], limits: Limits) -> Result<Tree, ImportError> {
    check_header(image)?;

    let mut decoder = Decoder {
        image,
        limits,
        visited: HashSet::new(),
    };
    let root = decoder.read_directory(String::new(), ROOT_OFFSET, 0)?;
    debug!(
        "Decoded image of {} bytes with {} directory records",
        image.len(),
        decoder.visited.len()
    );

    Ok(Tree::from_root(root, limits))
}

fn check_header(image: &[u8]) -> Result<(), Corruption> {
    let actual = image.len() as u64;
    ensure!(actual >= HEADER_LEN, TruncatedSnafu { len: actual });

    let mut cursor = Cursor::at(image, 0)?;
    let magic = cursor.read_array::<4>()?;
    ensure!(magic == MAGIC, BadMagicSnafu { found: magic });

    let version = cursor.read_u32()?;
    ensure!(version == VERSION, UnsupportedVersionSnafu { version });

    let declared = cursor.read_u64()?;
    ensure!(declared == actual, SizeMismatchSnafu { declared, actual });
    Ok(())
}

struct Decoder<'a> {
    image: &'a [u8],
    limits: Limits,
    visited: HashSet<u64>,
}

impl Decoder<'_> {
    /// `depth` is the nesting level of the directory itself; the root is 0.
    fn read_directory(
        &mut self,
        name: String,
        offset: u64,
        depth: usize,
    ) -> Result<Directory, ImportError> {
        ensure!(self.visited.insert(offset), SharedRecordSnafu { offset });

        let mut cursor = Cursor::at(self.image, offset)?;
        let subdir_count = cursor.read_u32()?;
        let file_count = cursor.read_u32()?;
        trace!(
            "Record at {} holds {} subdirectories and {} files",
            offset, subdir_count, file_count
        );

        if subdir_count > 0 || file_count > 0 {
            ensure!(
                depth < self.limits.max_depth,
                TooDeepSnafu {
                    max: self.limits.max_depth
                }
            );
        }

        let needed = u64::from(subdir_count) * MIN_SUBDIR_ENTRY_LEN
            + u64::from(file_count) * MIN_FILE_ENTRY_LEN;
        ensure!(
            needed <= cursor.remaining(),
            CountOverflowSnafu {
                offset,
                subdir_count,
                file_count,
            }
        );

        let mut names = HashSet::new();

        let mut subdir_refs = Vec::with_capacity(subdir_count as usize);
        for _ in 0..subdir_count {
            let name = self.read_name(&mut cursor, &mut names)?;
            let record = cursor.read_u64()?;
            subdir_refs.push((name, record));
        }

        let mut file_refs = Vec::with_capacity(file_count as usize);
        for _ in 0..file_count {
            let name = self.read_name(&mut cursor, &mut names)?;
            let data_offset = cursor.read_u64()?;
            let size = cursor.read_u64()?;
            file_refs.push((name, data_offset, size));
        }

        let record_end = cursor.position();
        let mut dir = Directory::named(name);

        for (name, record) in subdir_refs {
            ensure!(
                record >= record_end,
                BackwardReferenceSnafu { record, record_end }
            );
            let sub = self.read_directory(name, record, depth + 1)?;
            dir.subdirectories.push(sub);
        }

        for (name, data_offset, size) in file_refs {
            let bytes = Cursor::at(self.image, data_offset)?.take(size)?;

            let mut data = Vec::new();
            data.try_reserve_exact(bytes.len())
                .context(AllocationSnafu { name: name.as_str() })?;
            data.extend_from_slice(bytes);

            dir.files.push(File { name, data });
        }

        Ok(dir)
    }

    fn read_name(
        &self,
        cursor: &mut Cursor<'_>,
        siblings: &mut HashSet<String>,
    ) -> Result<String, Corruption> {
        let offset = cursor.position();
        let len = usize::from(cursor.read_u8()?);
        ensure!(
            len > 0 && len <= self.limits.max_name_len,
            NameLengthSnafu {
                offset,
                len,
                max: self.limits.max_name_len,
            }
        );

        let bytes = cursor.take(len as u64)?;
        let name = std::str::from_utf8(bytes).context(NameNotUtf8Snafu { offset })?;
        ensure!(!name.contains('/'), NameWithSeparatorSnafu { name });
        ensure!(siblings.insert(name.to_string()), DuplicateNameSnafu { name });

        Ok(name.to_string())
    }
}

/// Bounds-checked little-endian reader over the image.
struct Cursor<'a> {
    image: &'a [u8],
    position: usize,
}

impl<'a> Cursor<'a> {
    fn at(image: &'a [u8], offset: u64) -> Result<Self, Corruption> {
        let position = usize::try_from(offset)
            .ok()
            .filter(|position| *position <= image.len())
            .context(OutOfBoundsSnafu { offset, len: 0u64 })?;
        Ok(Self { image, position })
    }

    fn position(&self) -> u64 {
        self.position as u64
    }

    fn remaining(&self) -> u64 {
        (self.image.len() - self.position) as u64
    }

    fn take(&mut self, len: u64) -> Result<&'a [u8], Corruption> {
        let end = usize::try_from(len)
            .ok()
            .and_then(|len| self.position.checked_add(len))
            .filter(|end| *end <= self.image.len())
            .context(OutOfBoundsSnafu {
                offset: self.position(),
                len,
            })?;

        let bytes = &self.image[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], Corruption> {
        let mut array = [0; N];
        array.copy_from_slice(self.take(N as u64)?);
        Ok(array)
    }

    fn read_u8(&mut self) -> Result<u8, Corruption> {
        self.read_array::<1>().map(|[byte]| byte)
    }

    fn read_u32(&mut self) -> Result<u32, Corruption> {
        self.read_array().map(u32::from_le_bytes)
    }

    fn read_u64(&mut self) -> Result<u64, Corruption> {
        self.read_array().map(u64::from_le_bytes)
    }
}

#[derive(Debug, Snafu)]
pub enum ImportError {
    #[snafu(display("Failed to read the image"))]
    ReadError { source: std::io::Error },
    #[snafu(context(false), display("Corrupt image"))]
    CorruptImage { source: Corruption },
    #[snafu(display("Failed to allocate a buffer for file '{}'", name))]
    AllocationError {
        name: String,
        source: TryReserveError,
    },
}

/// Structural defects found while decoding an image.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Corruption {
    #[snafu(display("Image of {} bytes is shorter than its header", len))]
    Truncated { len: u64 },
    #[snafu(display("Unknown magic number {:?}", found))]
    BadMagic { found: [u8; 4] },
    #[snafu(display("Unsupported image version {}", version))]
    UnsupportedVersion { version: u32 },
    #[snafu(display("Header declares {} bytes but the image has {}", declared, actual))]
    SizeMismatch { declared: u64, actual: u64 },
    #[snafu(display("Range of {} bytes at offset {} lies outside the image", len, offset))]
    OutOfBounds { offset: u64, len: u64 },
    #[snafu(display(
        "Record at {} declares {} subdirectories and {} files, more than the image holds",
        offset,
        subdir_count,
        file_count
    ))]
    CountOverflow {
        offset: u64,
        subdir_count: u32,
        file_count: u32,
    },
    #[snafu(display("Name at {} has length {} (allowed 1 to {})", offset, len, max))]
    NameLength { offset: u64, len: usize, max: usize },
    #[snafu(display("Name at {} is not valid UTF-8", offset))]
    NameNotUtf8 { offset: u64, source: Utf8Error },
    #[snafu(display("Name '{}' contains a path separator", name))]
    NameWithSeparator { name: String },
    #[snafu(display("Name '{}' appears twice in one directory", name))]
    DuplicateName { name: String },
    #[snafu(display("Directories are nested deeper than {} levels", max))]
    TooDeep { max: usize },
    #[snafu(display(
        "Directory record at {} is referenced from a record ending at {}",
        record,
        record_end
    ))]
    BackwardReference { record: u64, record_end: u64 },
    #[snafu(display("Directory record at {} is referenced more than once", offset))]
    SharedRecord { offset: u64 },
}

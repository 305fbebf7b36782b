//! Reference bundle codec
//!
//! A simple self-describing container used by the CLI and the integration
//! tests: LZ4-compressed entries with per-entry CRC32 checksums and a
//! trailing compressed path table.
//!
//! Layout:
//!
//! ```text
//! header  : magic "BNDL" | version u32 | footer offset u64
//! data    : one LZ4 block per entry
//! footer  : file count u32 | table size (raw) u32 | table size (LZ4) u32
//!           | LZ4-compressed table
//! table   : per entry: path length u16 | path bytes (UTF-8, '/'-separated)
//!           | offset u64 | compressed size u32 | raw size u32 | crc32 u32
//! ```

use std::io::{Read, SeekFrom, Write};

use byteorder::{LE, ReadBytesExt, WriteBytesExt};
use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::progress::{OpPhase, OpProgress, ProgressCallback};

use super::{
    ArchiveCodec, ArchiveHandle, EntryHandle, EntryMetadata, Generator, LoadedArchive,
    LoadedEntry, ReadSeek, RepackFile, WriteSeek,
};

/// Magic bytes at the start of every bundle
pub const MAGIC: [u8; 4] = *b"BNDL";

/// Lowest readable bundle version
pub const MIN_VERSION: u32 = 1;

/// Highest readable (and the written) bundle version
pub const MAX_VERSION: u32 = 2;

/// Upper bound on the number of entries in one bundle
const MAX_FILES: usize = 1_000_000;

/// Upper bound on the decompressed path table size
const MAX_TABLE_SIZE: usize = 64 * 1024 * 1024;

/// One row of the decoded path table
#[derive(Debug, Clone)]
struct TableRow {
    path: String,
    offset: u64,
    size_compressed: u32,
    size_decompressed: u32,
    crc32: u32,
}

/// Per-archive codec state
#[derive(Debug)]
struct BundleArchive {
    version: u32,
    footer_offset: u64,
}

/// Per-entry codec state
#[derive(Debug)]
struct BundleEntry {
    /// Full path within the bundle
    path: String,
    /// Location in the current archive; `None` for entries created this
    /// session, which have no stored bytes until the next repack.
    row: Option<TableRow>,
}

/// Write context carried from load to repack
#[derive(Debug)]
struct BundleGenerator {
    version: u32,
}

/// Codec for the reference bundle format
#[derive(Debug, Default, Clone, Copy)]
pub struct BundleCodec;

impl BundleCodec {
    /// Create a new bundle codec
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn read_table(stream: &mut dyn ReadSeek, footer_offset: u64) -> Result<Vec<TableRow>> {
        stream.seek(SeekFrom::Start(footer_offset))?;

        let num_files = stream.read_u32::<LE>()? as usize;
        if num_files > MAX_FILES {
            return Err(Error::TooLarge {
                name: "bundle entry count".to_string(),
                size: num_files,
            });
        }

        let table_size_raw = stream.read_u32::<LE>()? as usize;
        if table_size_raw > MAX_TABLE_SIZE {
            return Err(Error::TooLarge {
                name: "bundle path table".to_string(),
                size: table_size_raw,
            });
        }
        let table_size_compressed = stream.read_u32::<LE>()? as usize;

        let mut compressed = vec![0u8; table_size_compressed];
        stream.read_exact(&mut compressed)?;

        let table = lz4_flex::block::decompress(&compressed, table_size_raw)
            .map_err(|e| Error::Decompression(format!("bundle path table: {e}")))?;

        let mut rows = Vec::with_capacity(num_files);
        let mut cursor = std::io::Cursor::new(table);
        for _ in 0..num_files {
            let path_len = cursor.read_u16::<LE>()? as usize;
            let mut path_bytes = vec![0u8; path_len];
            cursor.read_exact(&mut path_bytes)?;
            let path = String::from_utf8(path_bytes)
                .map_err(|e| Error::InvalidPath(e.to_string()))?;

            rows.push(TableRow {
                path,
                offset: cursor.read_u64::<LE>()?,
                size_compressed: cursor.read_u32::<LE>()?,
                size_decompressed: cursor.read_u32::<LE>()?,
                crc32: cursor.read_u32::<LE>()?,
            });
        }

        Ok(rows)
    }

    fn decode_row(row: &TableRow, stream: &mut dyn ReadSeek) -> Result<Vec<u8>> {
        stream.seek(SeekFrom::Start(row.offset))?;

        let mut compressed = vec![0u8; row.size_compressed as usize];
        stream.read_exact(&mut compressed)?;

        let data = if row.size_decompressed == 0 {
            Vec::new()
        } else {
            lz4_flex::block::decompress(&compressed, row.size_decompressed as usize)
                .map_err(|e| Error::Decompression(format!("{}: {e}", row.path)))?
        };

        if crc32fast::hash(&data) != row.crc32 {
            return Err(Error::ChecksumMismatch {
                path: row.path.clone(),
            });
        }

        Ok(data)
    }
}

impl ArchiveCodec for BundleCodec {
    fn name(&self) -> &'static str {
        "bundle"
    }

    fn load_archive(&self, stream: &mut dyn ReadSeek, name: &str) -> Result<ArchiveHandle> {
        stream.seek(SeekFrom::Start(0))?;

        let mut magic = [0u8; 4];
        stream.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(Error::InvalidBundleMagic);
        }

        let version = stream.read_u32::<LE>()?;
        if !(MIN_VERSION..=MAX_VERSION).contains(&version) {
            return Err(Error::UnsupportedBundleVersion { version });
        }

        let footer_offset = stream.read_u64::<LE>()?;

        tracing::debug!(archive = name, version, "opened bundle");

        Ok(ArchiveHandle::new(BundleArchive {
            version,
            footer_offset,
        }))
    }

    fn load_archive_data(
        &self,
        archive: &mut ArchiveHandle,
        stream: &mut dyn ReadSeek,
        name: &str,
    ) -> Result<LoadedArchive> {
        let bundle = archive
            .downcast_ref::<BundleArchive>()
            .ok_or_else(|| Error::InvalidPath(format!("{name}: not a bundle handle")))?;

        let rows = Self::read_table(stream, bundle.footer_offset)?;

        // Group rows by parent directory, preserving first-seen order.
        let mut groups: IndexMap<String, Vec<LoadedEntry>> = IndexMap::new();
        for row in rows {
            let (dir, file_name) = match row.path.rfind('/') {
                Some(pos) => (row.path[..pos].to_string(), row.path[pos + 1..].to_string()),
                None => (String::new(), row.path.clone()),
            };

            groups.entry(dir).or_default().push(LoadedEntry {
                name: file_name.clone(),
                handle: EntryHandle::new(BundleEntry {
                    path: row.path.clone(),
                    row: Some(row),
                }),
            });
        }

        Ok(LoadedArchive {
            directories: groups.into_iter().collect(),
            generator: Generator::new(BundleGenerator {
                version: bundle.version,
            }),
        })
    }

    fn write_archive(
        &self,
        generator: &mut Generator,
        _archive: &mut ArchiveHandle,
        source: &mut dyn ReadSeek,
        output: &mut dyn WriteSeek,
        files: &[RepackFile<'_>],
        progress: ProgressCallback<'_>,
    ) -> Result<()> {
        let version = generator
            .downcast_ref::<BundleGenerator>()
            .map_or(MAX_VERSION, |g| g.version);

        output.write_all(&MAGIC)?;
        output.write_u32::<LE>(version)?;
        // Placeholder for the footer offset, patched below.
        output.write_u64::<LE>(0)?;

        let total = files.len();
        let mut rows: Vec<TableRow> = Vec::with_capacity(total);

        for (i, file) in files.iter().enumerate() {
            progress(&OpProgress::with_file(
                OpPhase::Serializing,
                i + 1,
                total,
                file.path.clone(),
            ));

            let data = match file.pending {
                Some(bytes) => bytes.to_vec(),
                None => self.decode_entry(file.handle, source)?,
            };

            let crc32 = crc32fast::hash(&data);
            let compressed = lz4_flex::block::compress(&data);

            let size_decompressed: u32 = data.len().try_into().map_err(|_| Error::TooLarge {
                name: file.path.clone(),
                size: data.len(),
            })?;
            let size_compressed: u32 =
                compressed.len().try_into().map_err(|_| Error::TooLarge {
                    name: file.path.clone(),
                    size: compressed.len(),
                })?;

            let offset = output.stream_position()?;
            output.write_all(&compressed)?;

            rows.push(TableRow {
                path: file.path.clone(),
                offset,
                size_compressed,
                size_decompressed,
                crc32,
            });
        }

        let footer_offset = output.stream_position()?;

        let mut table = Vec::new();
        for row in &rows {
            let path_len: u16 = row.path.len().try_into().map_err(|_| Error::TooLarge {
                name: row.path.clone(),
                size: row.path.len(),
            })?;
            table.write_u16::<LE>(path_len)?;
            table.write_all(row.path.as_bytes())?;
            table.write_u64::<LE>(row.offset)?;
            table.write_u32::<LE>(row.size_compressed)?;
            table.write_u32::<LE>(row.size_decompressed)?;
            table.write_u32::<LE>(row.crc32)?;
        }

        let compressed_table = lz4_flex::block::compress(&table);

        let num_files: u32 = rows.len().try_into().map_err(|_| Error::TooLarge {
            name: "bundle entry count".to_string(),
            size: rows.len(),
        })?;
        output.write_u32::<LE>(num_files)?;
        output.write_u32::<LE>(table.len() as u32)?;
        output.write_u32::<LE>(compressed_table.len() as u32)?;
        output.write_all(&compressed_table)?;

        // Patch the footer offset in the header.
        output.seek(SeekFrom::Start(8))?;
        output.write_u64::<LE>(footer_offset)?;

        progress(&OpProgress::new(OpPhase::Complete, total, total));

        Ok(())
    }

    fn new_entry(
        &self,
        _archive: &mut ArchiveHandle,
        dir_path: &str,
        name: &str,
    ) -> Result<EntryHandle> {
        if name.is_empty() || name.contains('/') {
            return Err(Error::InvalidPath(name.to_string()));
        }

        let path = if dir_path.is_empty() {
            name.to_string()
        } else {
            format!("{dir_path}/{name}")
        };

        Ok(EntryHandle::new(BundleEntry { path, row: None }))
    }

    fn entry_size(&self, entry: &EntryHandle) -> u64 {
        entry
            .downcast_ref::<BundleEntry>()
            .and_then(|e| e.row.as_ref())
            .map_or(0, |row| u64::from(row.size_decompressed))
    }

    fn entry_metadata(&self, entry: &EntryHandle) -> EntryMetadata {
        let Some(bundle_entry) = entry.downcast_ref::<BundleEntry>() else {
            return EntryMetadata::default();
        };

        let mut meta = EntryMetadata {
            name: bundle_entry
                .path
                .rsplit('/')
                .next()
                .unwrap_or(&bundle_entry.path)
                .to_string(),
            size: self.entry_size(entry),
            fields: Vec::new(),
        };

        if let Some(row) = &bundle_entry.row {
            meta.fields.push((
                "Compressed".to_string(),
                format!("{} bytes", row.size_compressed),
            ));
            meta.fields
                .push(("CRC32".to_string(), format!("{:08x}", row.crc32)));
        }

        meta
    }

    fn decode_entry(&self, entry: &EntryHandle, stream: &mut dyn ReadSeek) -> Result<Vec<u8>> {
        let bundle_entry = entry
            .downcast_ref::<BundleEntry>()
            .ok_or_else(|| Error::InvalidPath("not a bundle entry handle".to_string()))?;

        match &bundle_entry.row {
            Some(row) => Self::decode_row(row, stream),
            // New entry with no stored bytes yet.
            None => Ok(Vec::new()),
        }
    }

    fn encode_file(
        &self,
        _input: &mut dyn Read,
        _output: &mut dyn Write,
        _entry: &EntryHandle,
        _metadata: &EntryMetadata,
    ) -> Result<u64> {
        // Bundles store entries verbatim; compression happens at repack
        // time. Zero tells the caller to pass the input through unmodified.
        Ok(0)
    }

    fn can_modify_directories(&self) -> bool {
        true
    }

    fn path_separator(&self) -> char {
        '/'
    }

    fn on_repacked(
        &self,
        paths: &[std::path::PathBuf],
        _progress: ProgressCallback<'_>,
    ) -> Result<()> {
        for path in paths {
            tracing::debug!(path = %path.display(), "bundle rewritten");
        }
        Ok(())
    }
}

/// Write a brand-new bundle from `(path, bytes)` pairs.
///
/// Used by the CLI `create` command and test fixtures; repacking an open
/// session goes through [`ArchiveCodec::write_archive`] instead.
///
/// # Errors
/// Returns an error if writing fails or an entry exceeds format limits.
pub fn write_bundle(output: &mut dyn WriteSeek, files: &[(String, Vec<u8>)]) -> Result<()> {
    let codec = BundleCodec::new();
    let mut archive = ArchiveHandle::new(BundleArchive {
        version: MAX_VERSION,
        footer_offset: 0,
    });
    let mut generator = Generator::new(BundleGenerator {
        version: MAX_VERSION,
    });

    let handles: Vec<EntryHandle> = files
        .iter()
        .map(|(path, _)| {
            EntryHandle::new(BundleEntry {
                path: path.clone(),
                row: None,
            })
        })
        .collect();

    let repack_files: Vec<RepackFile<'_>> = files
        .iter()
        .zip(&handles)
        .map(|((path, bytes), handle)| RepackFile {
            path: path.clone(),
            handle,
            pending: Some(bytes.as_slice()),
        })
        .collect();

    // New entries never touch the source stream.
    let mut empty_source = std::io::Cursor::new(Vec::new());
    codec.write_archive(
        &mut generator,
        &mut archive,
        &mut empty_source,
        output,
        &repack_files,
        &|_| {},
    )
}

//! Text descriptor: plain-text detection, no alternate formats

use std::io::{Read, Write};

use crate::error::Result;

use super::{FileFormat, FileTypeDescriptor, Thumbnail};

/// Extensions treated as text without probing
const EXTENSIONS: [&str; 8] = ["txt", "xml", "json", "ini", "cfg", "md", "lua", "csv"];

/// Fraction of printable bytes required for header-based detection
const PRINTABLE_THRESHOLD: f32 = 0.95;

/// Descriptor for plain-text entries
#[derive(Debug, Default, Clone, Copy)]
pub struct TextDescriptor;

fn looks_printable(header: &[u8]) -> bool {
    if header.is_empty() {
        return false;
    }
    let printable = header
        .iter()
        .filter(|b| b.is_ascii_graphic() || b.is_ascii_whitespace())
        .count();
    printable as f32 / header.len() as f32 >= PRINTABLE_THRESHOLD
}

impl FileTypeDescriptor for TextDescriptor {
    fn name(&self) -> &'static str {
        "text"
    }

    fn matches(&self, extension: &str, header: &[u8]) -> bool {
        EXTENSIONS.contains(&extension) || looks_printable(header)
    }

    fn import_formats(&self, _extension: &str) -> Vec<FileFormat> {
        Vec::new()
    }

    fn export_formats(&self, _extension: &str) -> Vec<FileFormat> {
        Vec::new()
    }

    fn convert_to(
        &self,
        _src_ext: &str,
        _dst_ext: &str,
        input: &mut dyn Read,
        output: &mut dyn Write,
    ) -> Result<()> {
        // Text has no alternate formats; a copy keeps callers honest if one
        // slips through with a stale format choice.
        std::io::copy(input, output)?;
        Ok(())
    }

    fn convert_from(
        &self,
        src_ext: &str,
        dst_ext: &str,
        input: &mut dyn Read,
        output: &mut dyn Write,
    ) -> Result<()> {
        self.convert_to(src_ext, dst_ext, input, output)
    }

    fn load_thumbnail(&self, _bytes: &[u8], _extension: &str) -> Result<Option<Thumbnail>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_by_extension_and_content() {
        let descriptor = TextDescriptor;
        assert!(descriptor.matches("txt", &[]));
        assert!(descriptor.matches("bin", b"key = value\nother = 2\n"));
        assert!(!descriptor.matches("bin", &[0u8, 1, 2, 3, 4, 5, 6, 7]));
    }

    #[test]
    fn has_no_alternate_formats() {
        let descriptor = TextDescriptor;
        assert!(descriptor.export_formats("txt").is_empty());
        assert!(descriptor.import_formats("txt").is_empty());
    }
}

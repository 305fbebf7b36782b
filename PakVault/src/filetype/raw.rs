//! Raw fallback and terminal error descriptors

use std::io::{Read, Write};

use crate::error::{Error, Result};

use super::{FileFormat, FileTypeDescriptor, Thumbnail};

/// Fallback descriptor for entries no detector claims.
///
/// Native-only: no conversions, no preview.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawDescriptor;

impl FileTypeDescriptor for RawDescriptor {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn matches(&self, _extension: &str, _header: &[u8]) -> bool {
        true
    }

    fn import_formats(&self, _extension: &str) -> Vec<FileFormat> {
        Vec::new()
    }

    fn export_formats(&self, _extension: &str) -> Vec<FileFormat> {
        Vec::new()
    }

    fn convert_to(
        &self,
        src_ext: &str,
        dst_ext: &str,
        _input: &mut dyn Read,
        _output: &mut dyn Write,
    ) -> Result<()> {
        Err(Error::Conversion {
            name: String::new(),
            from: src_ext.to_string(),
            to: dst_ext.to_string(),
            message: "raw entries have no conversions".to_string(),
        })
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

/// Terminal descriptor for entries whose bytes could not be decoded.
///
/// Entries are downgraded to this type for the rest of the load cycle:
/// delete and native export still work, conversions and imports do not.
#[derive(Debug, Default, Clone, Copy)]
pub struct ErrorDescriptor;

impl FileTypeDescriptor for ErrorDescriptor {
    fn name(&self) -> &'static str {
        "error"
    }

    fn matches(&self, _extension: &str, _header: &[u8]) -> bool {
        // Never chosen by detection; entries are downgraded explicitly.
        false
    }

    fn import_formats(&self, _extension: &str) -> Vec<FileFormat> {
        Vec::new()
    }

    fn export_formats(&self, _extension: &str) -> Vec<FileFormat> {
        Vec::new()
    }

    fn convert_to(
        &self,
        src_ext: &str,
        dst_ext: &str,
        _input: &mut dyn Read,
        _output: &mut dyn Write,
    ) -> Result<()> {
        Err(Error::Conversion {
            name: String::new(),
            from: src_ext.to_string(),
            to: dst_ext.to_string(),
            message: "entry is error-typed".to_string(),
        })
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

    fn is_error(&self) -> bool {
        true
    }
}

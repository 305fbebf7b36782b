//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use pakvault::codec::bundle::write_bundle;
use pakvault::prelude::*;

/// Write a bundle archive fixture and return its path
pub fn write_fixture(dir: &Path, name: &str, files: &[(&str, &[u8])]) -> PathBuf {
    let path = dir.join(name);
    let pairs: Vec<(String, Vec<u8>)> = files
        .iter()
        .map(|(p, bytes)| ((*p).to_string(), bytes.to_vec()))
        .collect();
    let mut output = std::fs::File::create(&path).unwrap();
    write_bundle(&mut output, &pairs).unwrap();
    path
}

/// Open a session over a bundle with the default registry
pub async fn open_bundle(path: &Path) -> Arc<ArchiveSession> {
    open_bundle_with(path, Arc::new(TypeRegistry::with_defaults())).await
}

/// Open a session over a bundle with a custom registry
pub async fn open_bundle_with(path: &Path, registry: Arc<TypeRegistry>) -> Arc<ArchiveSession> {
    ArchiveSession::open(path, Arc::new(BundleCodec::new()), registry)
        .await
        .unwrap()
}

/// Encode a tiny solid-color PNG
pub fn tiny_png(r: u8, g: u8, b: u8) -> Vec<u8> {
    use std::io::Cursor;
    let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([r, g, b, 255]));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// Descriptor whose converters must never run; used to prove that
/// force-native exports stay away from conversion entirely.
#[derive(Debug, Default)]
pub struct PanicConverter;

impl FileTypeDescriptor for PanicConverter {
    fn name(&self) -> &'static str {
        "panic"
    }

    fn matches(&self, _extension: &str, _header: &[u8]) -> bool {
        true
    }

    fn import_formats(&self, _extension: &str) -> Vec<FileFormat> {
        vec![FileFormat::new("alt", "Alternate format")]
    }

    fn export_formats(&self, _extension: &str) -> Vec<FileFormat> {
        vec![FileFormat::new("alt", "Alternate format")]
    }

    fn convert_to(
        &self,
        _src_ext: &str,
        _dst_ext: &str,
        _input: &mut dyn Read,
        _output: &mut dyn Write,
    ) -> pakvault::Result<()> {
        panic!("converter must not be invoked");
    }

    fn convert_from(
        &self,
        _src_ext: &str,
        _dst_ext: &str,
        _input: &mut dyn Read,
        _output: &mut dyn Write,
    ) -> pakvault::Result<()> {
        panic!("converter must not be invoked");
    }

    fn load_thumbnail(
        &self,
        _bytes: &[u8],
        _extension: &str,
    ) -> pakvault::Result<Option<Thumbnail>> {
        Ok(None)
    }
}

/// Descriptor whose converter always fails; drives the native-fallback path
#[derive(Debug, Default)]
pub struct FailingConverter;

impl FileTypeDescriptor for FailingConverter {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn matches(&self, _extension: &str, _header: &[u8]) -> bool {
        true
    }

    fn import_formats(&self, _extension: &str) -> Vec<FileFormat> {
        vec![FileFormat::new("alt", "Alternate format")]
    }

    fn export_formats(&self, _extension: &str) -> Vec<FileFormat> {
        vec![FileFormat::new("alt", "Alternate format")]
    }

    fn convert_to(
        &self,
        src_ext: &str,
        dst_ext: &str,
        _input: &mut dyn Read,
        _output: &mut dyn Write,
    ) -> pakvault::Result<()> {
        Err(pakvault::Error::Conversion {
            name: String::new(),
            from: src_ext.to_string(),
            to: dst_ext.to_string(),
            message: "always fails".to_string(),
        })
    }

    fn convert_from(
        &self,
        src_ext: &str,
        dst_ext: &str,
        input: &mut dyn Read,
        output: &mut dyn Write,
    ) -> pakvault::Result<()> {
        self.convert_to(src_ext, dst_ext, input, output)
    }

    fn load_thumbnail(
        &self,
        _bytes: &[u8],
        _extension: &str,
    ) -> pakvault::Result<Option<Thumbnail>> {
        Ok(None)
    }
}

/// Interaction handler that records prompts and returns fixed answers
#[derive(Debug, Default)]
pub struct Recorder {
    pub replace_reply: bool,
    pub format_reply: Option<FileFormat>,
    pub format_prompts: AtomicUsize,
    pub replace_messages: std::sync::Mutex<Vec<String>>,
}

impl Recorder {
    pub fn replacing(reply: bool) -> Self {
        Self {
            replace_reply: reply,
            ..Self::default()
        }
    }

    pub fn converting(format: FileFormat) -> Self {
        Self {
            format_reply: Some(format),
            ..Self::default()
        }
    }

    pub fn format_prompt_count(&self) -> usize {
        self.format_prompts.load(Ordering::SeqCst)
    }
}

impl InteractionHandler for Recorder {
    fn choose_export_format(
        &self,
        _type_name: &str,
        _formats: &[FileFormat],
    ) -> Option<FileFormat> {
        self.format_prompts.fetch_add(1, Ordering::SeqCst);
        self.format_reply.clone()
    }

    fn confirm_replace(&self, message: &str, _conflicts: &[String]) -> bool {
        self.replace_messages
            .lock()
            .unwrap()
            .push(message.to_string());
        self.replace_reply
    }
}

/// Collect every file path under a directory, relative, '/'-joined, sorted
pub fn disk_paths(root: &Path) -> Vec<String> {
    let mut out: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| {
            let entry = entry.ok()?;
            if !entry.file_type().is_file() {
                return None;
            }
            let relative = entry.path().strip_prefix(root).ok()?;
            Some(
                relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().to_string())
                    .collect::<Vec<_>>()
                    .join("/"),
            )
        })
        .collect();
    out.sort();
    out
}

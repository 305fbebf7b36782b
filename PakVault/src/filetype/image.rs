//! Image descriptor: PNG/BMP/TGA detection, transcoding and thumbnails

use std::io::{Cursor, Read, Write};

use image::{ImageFormat, imageops::FilterType};

use crate::error::{Error, Result};

use super::{FileFormat, FileTypeDescriptor, MAX_THUMBNAIL_SIZE, Thumbnail};

const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Extensions this descriptor understands
const EXTENSIONS: [&str; 3] = ["png", "bmp", "tga"];

fn format_for(ext: &str) -> Option<ImageFormat> {
    match ext {
        "png" => Some(ImageFormat::Png),
        "bmp" => Some(ImageFormat::Bmp),
        "tga" => Some(ImageFormat::Tga),
        _ => None,
    }
}

fn format_label(ext: &str) -> &'static str {
    match ext {
        "png" => "PNG image",
        "bmp" => "Windows bitmap",
        "tga" => "Targa image",
        _ => "Image",
    }
}

/// Descriptor for raster image entries
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageDescriptor;

impl ImageDescriptor {
    fn transcode(
        &self,
        src_ext: &str,
        dst_ext: &str,
        input: &mut dyn Read,
        output: &mut dyn Write,
    ) -> Result<()> {
        let conversion_error = |message: String| Error::Conversion {
            name: String::new(),
            from: src_ext.to_string(),
            to: dst_ext.to_string(),
            message,
        };

        // Entries can carry image content under a foreign extension (the
        // header decides the type): sniff on decode, store PNG on encode.
        let dst = format_for(dst_ext).unwrap_or(ImageFormat::Png);

        let mut bytes = Vec::new();
        input.read_to_end(&mut bytes)?;

        let decoded = match format_for(src_ext) {
            Some(src) => image::load_from_memory_with_format(&bytes, src),
            None => image::load_from_memory(&bytes),
        }
        .map_err(|e| conversion_error(e.to_string()))?;

        // image's encoders need Seek, so encode into a buffer first.
        let mut encoded = Cursor::new(Vec::new());
        decoded
            .write_to(&mut encoded, dst)
            .map_err(|e| conversion_error(e.to_string()))?;

        output.write_all(&encoded.into_inner())?;
        Ok(())
    }
}

impl FileTypeDescriptor for ImageDescriptor {
    fn name(&self) -> &'static str {
        "image"
    }

    fn matches(&self, extension: &str, header: &[u8]) -> bool {
        if header.starts_with(&PNG_MAGIC) || header.starts_with(b"BM") {
            return true;
        }
        // TGA has no reliable magic; trust the extension.
        EXTENSIONS.contains(&extension)
    }

    fn import_formats(&self, extension: &str) -> Vec<FileFormat> {
        EXTENSIONS
            .iter()
            .filter(|e| **e != extension)
            .map(|e| FileFormat::new(*e, format_label(e)))
            .collect()
    }

    fn export_formats(&self, extension: &str) -> Vec<FileFormat> {
        self.import_formats(extension)
    }

    fn convert_to(
        &self,
        src_ext: &str,
        dst_ext: &str,
        input: &mut dyn Read,
        output: &mut dyn Write,
    ) -> Result<()> {
        self.transcode(src_ext, dst_ext, input, output)
    }

    fn convert_from(
        &self,
        src_ext: &str,
        dst_ext: &str,
        input: &mut dyn Read,
        output: &mut dyn Write,
    ) -> Result<()> {
        self.transcode(src_ext, dst_ext, input, output)
    }

    fn load_thumbnail(&self, bytes: &[u8], extension: &str) -> Result<Option<Thumbnail>> {
        let decoded = match format_for(extension) {
            Some(format) => image::load_from_memory_with_format(bytes, format),
            None => image::load_from_memory(bytes),
        }
        .map_err(|e| Error::Conversion {
            name: String::new(),
            from: extension.to_string(),
            to: "thumbnail".to_string(),
            message: e.to_string(),
        })?;

        let (full_width, full_height) = (decoded.width(), decoded.height());

        let preview = if full_width > MAX_THUMBNAIL_SIZE || full_height > MAX_THUMBNAIL_SIZE {
            decoded.resize(MAX_THUMBNAIL_SIZE, MAX_THUMBNAIL_SIZE, FilterType::Triangle)
        } else {
            decoded
        };

        let rgba = preview.to_rgba8();
        let (width, height) = (rgba.width(), rgba.height());

        Ok(Some(Thumbnail {
            width,
            height,
            rgba: rgba.into_raw(),
            info: vec![
                (
                    "Dimensions".to_string(),
                    format!("{full_width}x{full_height}"),
                ),
                ("Format".to_string(), format_label(extension).to_string()),
            ],
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_png() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([255, 0, 0, 255]));
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn detects_png_by_magic() {
        let descriptor = ImageDescriptor;
        assert!(descriptor.matches("bin", &tiny_png()));
        assert!(descriptor.matches("tga", b"garbage"));
        assert!(!descriptor.matches("txt", b"garbage"));
    }

    #[test]
    fn png_to_bmp_round_trip() {
        let descriptor = ImageDescriptor;
        let png = tiny_png();

        let mut bmp = Vec::new();
        descriptor
            .convert_to("png", "bmp", &mut png.as_slice(), &mut bmp)
            .unwrap();
        assert!(bmp.starts_with(b"BM"));

        let mut back = Vec::new();
        descriptor
            .convert_from("bmp", "png", &mut bmp.as_slice(), &mut back)
            .unwrap();
        let img = image::load_from_memory(&back).unwrap();
        assert_eq!((img.width(), img.height()), (4, 4));
    }

    #[test]
    fn thumbnail_has_pixels_and_info() {
        let descriptor = ImageDescriptor;
        let thumb = descriptor
            .load_thumbnail(&tiny_png(), "png")
            .unwrap()
            .expect("images have previews");
        assert_eq!((thumb.width, thumb.height), (4, 4));
        assert_eq!(thumb.rgba.len(), 4 * 4 * 4);
        assert!(thumb.info.iter().any(|(k, _)| k == "Dimensions"));
    }

    #[test]
    fn garbage_bytes_fail_thumbnail() {
        let descriptor = ImageDescriptor;
        assert!(descriptor.load_thumbnail(b"not an image", "png").is_err());
    }
}

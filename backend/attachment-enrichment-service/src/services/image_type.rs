//! Image type detection from leading file bytes
use std::fmt;

/// Bytes needed to recognise every supported type
pub const SNIFF_LEN: usize = 8;

/// Image types eligible for enrichment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    Gif,
    Jpeg,
    Png,
    Bmp,
}

impl ImageType {
    pub fn mime(&self) -> &'static str {
        match self {
            ImageType::Gif => "image/gif",
            ImageType::Jpeg => "image/jpeg",
            ImageType::Png => "image/png",
            ImageType::Bmp => "image/bmp",
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// Detect the image type from the file signature
pub fn detect_image_type(head: &[u8]) -> Option<ImageType> {
    if head.starts_with(b"GIF87a") || head.starts_with(b"GIF89a") {
        Some(ImageType::Gif)
    } else if head.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(ImageType::Jpeg)
    } else if head.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some(ImageType::Png)
    } else if head.starts_with(b"BM") {
        Some(ImageType::Bmp)
    } else {
        None
    }
}

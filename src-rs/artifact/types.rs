use std::fmt;

use thiserror::Error;

/// How an artifact came to be stored. Only used for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    InlineEncoded,
    CopiedFile,
    Fallback,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::InlineEncoded => "inline-encoded",
            SourceKind::CopiedFile => "copied-file",
            SourceKind::Fallback => "fallback",
        };
        f.write_str(name)
    }
}

/// A stored diagram image.
#[derive(Clone, Debug)]
pub struct Artifact {
    pub id: String,
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

/// Internal failures of a single extraction strategy. Never leaves the
/// resolver.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("invalid base64 payload: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("decoded payload is not a recognised image")]
    NotAnImage,

    #[error("referenced file {path} is unusable: {reason}")]
    UnusableFile { path: String, reason: String },

    #[error("artifact write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Known image formats, detected from leading bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
    Svg,
}

impl ImageFormat {
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            return Some(Self::Png);
        }
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }
        if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            return Some(Self::Gif);
        }
        if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            return Some(Self::Webp);
        }
        let head = String::from_utf8_lossy(&bytes[..bytes.len().min(256)]).to_lowercase();
        let head = head.trim_start();
        if head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg")) {
            return Some(Self::Svg);
        }
        None
    }

    /// Whether `bytes` end the way a complete file of this format does.
    /// Catches payloads that were cut short but still decode.
    pub fn is_complete(self, bytes: &[u8]) -> bool {
        match self {
            Self::Png => bytes.ends_with(b"IEND\xAE\x42\x60\x82"),
            Self::Jpeg => trim_trailing_whitespace(bytes).ends_with(&[0xFF, 0xD9]),
            Self::Gif => trim_trailing_whitespace(bytes).ends_with(&[0x3B]),
            Self::Webp => {
                bytes.len() >= 12
                    && u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize
                        == bytes.len() - 8
            }
            Self::Svg => String::from_utf8_lossy(bytes).to_lowercase().contains("</svg>"),
        }
    }

    pub fn from_extension(name: &str) -> Option<Self> {
        let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::Webp),
            "svg" => Some(Self::Svg),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Svg => "svg",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
            Self::Svg => "image/svg+xml",
        }
    }
}

fn trim_trailing_whitespace(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |idx| idx + 1);
    &bytes[..end]
}

use std::path::Path;
use std::pin::Pin;

use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};

use super::super::{DEFAULT_MAX_FILE_SIZE, Document, DocumentError, DocumentLoader};
use super::{metadata_for, read_limited, strip_nulls};

pub const DEFAULT_ENCODINGS: &[&str] = &["utf-8", "utf-16le", "windows-1252"];

/// Bytes inspected by [`looks_binary`].
const SNIFF_LEN: usize = 8192;
/// Share of control bytes above which a file is treated as binary.
const MAX_CONTROL_RATIO: f64 = 0.1;

/// Plain-text loader with an ordered list of candidate encodings.
#[derive(Debug, Clone)]
pub struct TextLoader {
    pub max_file_size: u64,
    encodings: Vec<&'static Encoding>,
}

impl Default for TextLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            encodings: DEFAULT_ENCODINGS
                .iter()
                .filter_map(|l| Encoding::for_label(l.as_bytes()))
                .collect(),
        }
    }
}

impl TextLoader {
    /// Build a loader from WHATWG encoding labels. An empty list means the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::UnknownEncoding`] for an unrecognised label.
    pub fn with_encodings(labels: &[String], max_file_size: u64) -> Result<Self, DocumentError> {
        if labels.is_empty() {
            return Ok(Self {
                max_file_size,
                ..Self::default()
            });
        }
        let encodings = labels
            .iter()
            .map(|l| {
                Encoding::for_label(l.trim().as_bytes())
                    .ok_or_else(|| DocumentError::UnknownEncoding(l.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            max_file_size,
            encodings,
        })
    }
}

/// Try each encoding in order and return the first clean decode.
///
/// UTF-16 variants are only attempted when the matching byte-order mark is present;
/// a UTF-8 BOM is skipped. Returns `None` if every candidate hits a malformed sequence.
#[must_use]
pub fn decode_bytes(bytes: &[u8], encodings: &[&'static Encoding]) -> Option<(String, &'static Encoding)> {
    for &encoding in encodings {
        let body = if encoding == UTF_16LE {
            match bytes.strip_prefix(&[0xFF, 0xFE]) {
                Some(rest) => rest,
                None => continue,
            }
        } else if encoding == UTF_16BE {
            match bytes.strip_prefix(&[0xFE, 0xFF]) {
                Some(rest) => rest,
                None => continue,
            }
        } else if encoding == UTF_8 {
            bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes)
        } else {
            bytes
        };
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(body) {
            return Some((text.into_owned(), encoding));
        }
    }
    None
}

/// Whether `bytes` look like binary data rather than text.
///
/// Windows-1252 accepts every byte, so without this check images and archives
/// would be indexed as mojibake. Counts C0 control bytes other than tab, line
/// feed, form feed and carriage return in the first few kilobytes. Input with a
/// UTF-16 byte-order mark is never binary.
#[must_use]
pub fn looks_binary(bytes: &[u8]) -> bool {
    if bytes.starts_with(&[0xFF, 0xFE]) || bytes.starts_with(&[0xFE, 0xFF]) {
        return false;
    }
    let head = &bytes[..bytes.len().min(SNIFF_LEN)];
    if head.is_empty() {
        return false;
    }
    let controls = head
        .iter()
        .filter(|&&b| (b < 0x20 && !matches!(b, b'\t' | b'\n' | 0x0C | b'\r')) || b == 0x7F)
        .count();
    #[allow(clippy::cast_precision_loss)]
    let ratio = controls as f64 / head.len() as f64;
    ratio > MAX_CONTROL_RATIO
}

impl DocumentLoader for TextLoader {
    fn load(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<Document>, DocumentError>> + Send + '_>>
    {
        let path = path.to_path_buf();
        Box::pin(async move {
            let (path, bytes) = read_limited(&path, self.max_file_size).await?;
            if looks_binary(&bytes) {
                return Err(DocumentError::UnsupportedFormat(format!(
                    "binary content in {}",
                    path.display()
                )));
            }

            let Some((content, encoding)) = decode_bytes(&bytes, &self.encodings) else {
                return Err(DocumentError::Decode {
                    path: path.display().to_string(),
                    tried: self
                        .encodings
                        .iter()
                        .map(|e| e.name())
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            };
            tracing::debug!(path = %path.display(), encoding = encoding.name(), "decoded text file");

            let content_type = match path.extension().and_then(|e| e.to_str()) {
                Some("md" | "markdown") => "text/markdown",
                _ => "text/plain",
            };

            Ok(vec![Document {
                content: strip_nulls(content),
                metadata: metadata_for(&path, content_type, None),
            }])
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["txt", "md", "markdown"]
    }
}

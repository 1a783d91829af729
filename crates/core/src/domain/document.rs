// Document metadata: the rows the ingestion pipeline reads and writes

use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Ready,
    Failed,
    Deleted,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Ready => "ready",
            DocumentStatus::Failed => "failed",
            DocumentStatus::Deleted => "deleted",
        }
    }
}

impl FromStr for DocumentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(DocumentStatus::Pending),
            "processing" => Ok(DocumentStatus::Processing),
            "ready" => Ok(DocumentStatus::Ready),
            "failed" => Ok(DocumentStatus::Failed),
            "deleted" => Ok(DocumentStatus::Deleted),
            other => Err(DomainError::UnknownDocumentStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStatus {
    Pending,
    Success,
    Failed,
}

impl ParseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseStatus::Pending => "pending",
            ParseStatus::Success => "success",
            ParseStatus::Failed => "failed",
        }
    }
}

impl FromStr for ParseStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(ParseStatus::Pending),
            "success" => Ok(ParseStatus::Success),
            "failed" => Ok(ParseStatus::Failed),
            other => Err(DomainError::ValidationError(format!(
                "unknown parse status: {}",
                other
            ))),
        }
    }
}

/// How a stored object is turned into text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParserType {
    Markdown,
    #[default]
    Generic,
    Pdf,
    Image,
}

impl ParserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParserType::Markdown => "markdown",
            ParserType::Generic => "generic",
            ParserType::Pdf => "pdf",
            ParserType::Image => "image",
        }
    }

    /// Parse a stored parser type; missing or unrecognised values fall back to generic.
    pub fn from_stored(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("markdown") => ParserType::Markdown,
            Some("pdf") => ParserType::Pdf,
            Some("image") => ParserType::Image,
            _ => ParserType::Generic,
        }
    }

    /// Guess the parser from an uploaded file name's extension.
    pub fn infer(filename: &str) -> Self {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("md" | "markdown" | "txt") => ParserType::Markdown,
            Some("png" | "jpg" | "jpeg" | "webp" | "gif") => ParserType::Image,
            Some("pdf") => ParserType::Pdf,
            _ => ParserType::Generic,
        }
    }

    /// Text-based parsers only. Returns `None` for parsers this build does not ship.
    ///
    /// Invalid UTF-8 sequences are dropped rather than replaced.
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        match self {
            ParserType::Markdown | ParserType::Generic => {
                Some(bytes.utf8_chunks().map(|chunk| chunk.valid()).collect())
            }
            ParserType::Pdf | ParserType::Image => None,
        }
    }
}

impl std::fmt::Display for ParserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub tenant_id: String,
    pub workspace_id: String,
    pub kb_id: String,
    pub title: String,
    pub source_uri: Option<String>,
    pub current_version: i32,
    pub status: DocumentStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentVersion {
    pub id: String,
    pub tenant_id: String,
    pub document_id: String,
    pub version: i32,
    pub object_key: String,
    pub parser_type: ParserType,
    pub parse_status: ParseStatus,
    pub checksum: Option<String>,
    pub created_at: i64,
}

/// Read-only join of a version with its parent document, as seen by the worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSource {
    pub tenant_id: String,
    pub workspace_id: String,
    pub kb_id: String,
    pub document_id: String,
    pub document_version_id: String,
    pub object_key: Option<String>,
    pub parser_type: Option<String>,
}

impl DocumentSource {
    pub fn parser(&self) -> ParserType {
        ParserType::from_stored(self.parser_type.as_deref())
    }
}

/// Chunk to be written for a version; targeting comes from the `DocumentSource`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChunk {
    pub id: String,
    /// 1-based
    pub chunk_no: i32,
    pub content: String,
    pub token_count: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub tenant_id: String,
    pub workspace_id: String,
    pub kb_id: String,
    pub document_id: String,
    pub document_version_id: String,
    pub chunk_no: i32,
    pub content: String,
    pub token_count: i32,
    pub metadata: serde_json::Value,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_parser_from_extension() {
        assert_eq!(ParserType::infer("notes.md"), ParserType::Markdown);
        assert_eq!(ParserType::infer("README.MARKDOWN"), ParserType::Markdown);
        assert_eq!(ParserType::infer("a.txt"), ParserType::Markdown);
        assert_eq!(ParserType::infer("scan.JPEG"), ParserType::Image);
        assert_eq!(ParserType::infer("paper.pdf"), ParserType::Pdf);
        assert_eq!(ParserType::infer("data.csv"), ParserType::Generic);
        assert_eq!(ParserType::infer("noext"), ParserType::Generic);
    }

    #[test]
    fn test_unknown_stored_parser_falls_back_to_generic() {
        assert_eq!(ParserType::from_stored(None), ParserType::Generic);
        assert_eq!(ParserType::from_stored(Some("docx")), ParserType::Generic);
        assert_eq!(ParserType::from_stored(Some("pdf")), ParserType::Pdf);
    }

    #[test]
    fn test_decode_drops_invalid_bytes_and_refuses_binary_parsers() {
        let bytes = [b'h', b'i', 0xFF, b'!'];
        assert_eq!(ParserType::Generic.decode(&bytes).as_deref(), Some("hi!"));

        // Truncated multi-byte sequence at the end, valid one kept
        let bytes = [0xC3, 0xA9, b'x', 0xE2, 0x82];
        assert_eq!(ParserType::Markdown.decode(&bytes).as_deref(), Some("\u{e9}x"));

        assert!(ParserType::Pdf.decode(b"%PDF").is_none());
        assert!(ParserType::Image.decode(b"\x89PNG").is_none());
    }
}

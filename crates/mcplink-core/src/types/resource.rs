//! Resource catalog entries and read results.

use base64::Engine;
use serde::{Deserialize, Serialize};

/// A resource advertised by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource URI.
    pub uri: String,
    /// Display name.
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// MIME type.
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Declared size in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl Resource {
    /// Create a resource entry.
    #[must_use]
    pub fn new(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            description: None,
            mime_type: None,
            size: None,
        }
    }

    /// Set the declared size.
    #[must_use]
    pub const fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }
}

/// Contents of one resource: either text or a base64 blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceContents {
    /// Resource URI.
    pub uri: String,
    /// MIME type.
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Text content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Binary content as base64.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob: Option<String>,
}

impl ResourceContents {
    /// Text contents.
    #[must_use]
    pub fn text(uri: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            mime_type: Some("text/plain".to_string()),
            text: Some(text.into()),
            blob: None,
        }
    }

    /// Binary contents, base64-encoded.
    #[must_use]
    pub fn blob(uri: impl Into<String>, data: &[u8], mime_type: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            mime_type: Some(mime_type.into()),
            text: None,
            blob: Some(base64::engine::general_purpose::STANDARD.encode(data)),
        }
    }

    /// Decode the blob, if any.
    pub fn decode_blob(&self) -> Result<Option<Vec<u8>>, base64::DecodeError> {
        self.blob
            .as_ref()
            .map(|b| base64::engine::general_purpose::STANDARD.decode(b))
            .transpose()
    }

    /// Content size in bytes; blobs are measured by their decoded length.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        let text = self.text.as_ref().map_or(0, String::len);
        let blob = self.blob.as_ref().map_or(0, |b| {
            let padding = b.bytes().rev().take_while(|c| *c == b'=').count();
            (b.len() / 4 * 3).saturating_sub(padding)
        });
        text + blob
    }
}

/// `resources/list` result page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListResourcesResult {
    /// Resources on this page.
    pub resources: Vec<Resource>,
    /// Cursor for the next page.
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// `resources/read` parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResourceRequest {
    /// URI to read.
    pub uri: String,
}

/// `resources/read` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadResourceResult {
    /// One or more content entries.
    pub contents: Vec<ResourceContents>,
}

impl ReadResourceResult {
    /// Total size of all entries.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.contents.iter().map(ResourceContents::byte_len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_size_matches_decoded() {
        for data in [&b""[..], b"a", b"ab", b"abc", b"abcd", &[0u8; 1000][..]] {
            let contents = ResourceContents::blob("mem://x", data, "application/octet-stream");
            assert_eq!(contents.byte_len(), data.len());
            assert_eq!(contents.decode_blob().unwrap().unwrap(), data);
        }
    }

    #[test]
    fn test_read_result_total() {
        let result = ReadResourceResult {
            contents: vec![
                ResourceContents::text("file:///a", "hello"),
                ResourceContents::text("file:///b", "world!"),
            ],
        };
        assert_eq!(result.byte_len(), 11);
    }
}

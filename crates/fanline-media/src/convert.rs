// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Converter chain deciding how a downloaded payload becomes platform media.
//!
//! Converters are tried in registration order; the first one whose
//! `accepts` returns a media kind transforms the payload.

use fanline_core::MediaKind;

#[derive(Debug)]
pub struct ConvertError(pub String);

pub trait Converter: Send + Sync {
    /// The media kind this converter produces for the format (a lowercase
    /// file extension), or `None` if it does not handle it.
    fn accepts(&self, format: &str) -> Option<MediaKind>;

    /// Transform the payload into the platform-acceptable form.
    fn convert(&self, format: &str, data: Vec<u8>) -> Result<Vec<u8>, ConvertError>;
}

/// Pass-through converter for formats the platform accepts natively.
pub struct SupportedFormats;

impl Converter for SupportedFormats {
    fn accepts(&self, format: &str) -> Option<MediaKind> {
        match format {
            "jpg" | "jpeg" | "png" | "webp" => Some(MediaKind::Photo),
            "mp4" | "mov" => Some(MediaKind::Video),
            "gif" | "pdf" => Some(MediaKind::Document),
            _ => None,
        }
    }

    fn convert(&self, _format: &str, data: Vec<u8>) -> Result<Vec<u8>, ConvertError> {
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_formats_map_to_kinds() {
        let conv = SupportedFormats;
        assert_eq!(conv.accepts("jpg"), Some(MediaKind::Photo));
        assert_eq!(conv.accepts("mp4"), Some(MediaKind::Video));
        assert_eq!(conv.accepts("gif"), Some(MediaKind::Document));
    }

    #[test]
    fn unknown_format_is_not_accepted() {
        assert_eq!(SupportedFormats.accepts("webm"), None);
    }

    #[test]
    fn passthrough_keeps_bytes() {
        let data = vec![1, 2, 3];
        assert_eq!(SupportedFormats.convert("jpg", data.clone()).unwrap(), data);
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// QR / barcode payload capability.
//
// Certificates issued since 2020 carry a QR code whose payload repeats the
// key fields. Decoding the symbol itself is left to an external reader; this
// module defines the capability and parses the payload text it returns.

use std::collections::BTreeMap;

use docverify_core::error::Result;
use image::DynamicImage;
use tracing::debug;

/// Reads the payload of a QR code or barcode printed on a document.
pub trait CodeReader: Send + Sync {
    /// Decode the first code found in `image`. `Ok(None)` means no code was
    /// found, which is not an error.
    fn read(&self, image: &DynamicImage) -> Result<Option<String>>;
}

/// Used when no code reader is configured: never finds a code.
pub struct NoCodeReader;

impl CodeReader for NoCodeReader {
    fn read(&self, _image: &DynamicImage) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Returns a payload already decoded by an external scanner.
#[derive(Debug, Clone)]
pub struct StaticCodeReader {
    payload: String,
}

impl StaticCodeReader {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
        }
    }
}

impl CodeReader for StaticCodeReader {
    fn read(&self, _image: &DynamicImage) -> Result<Option<String>> {
        Ok(Some(self.payload.clone()))
    }
}

/// Parse a code payload into lowercase keys and trimmed values.
///
/// Accepts a flat JSON object (`{"index": "12345678001", ...}`) or
/// `KEY:VALUE` pairs separated by `|`, `;` or newlines. Unparseable segments
/// are skipped.
pub fn parse_code_payload(payload: &str) -> BTreeMap<String, String> {
    let trimmed = payload.trim();

    if trimmed.starts_with('{') {
        if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(trimmed) {
            let parsed: BTreeMap<String, String> = map
                .into_iter()
                .filter_map(|(k, v)| {
                    let value = match v {
                        serde_json::Value::String(s) => s,
                        serde_json::Value::Number(n) => n.to_string(),
                        serde_json::Value::Bool(b) => b.to_string(),
                        _ => return None,
                    };
                    Some((k.trim().to_lowercase(), value.trim().to_owned()))
                })
                .collect();
            debug!(keys = parsed.len(), "JSON code payload parsed");
            return parsed;
        }
    }

    let parsed: BTreeMap<String, String> = trimmed
        .split(['|', ';', '\n'])
        .filter_map(|segment| {
            let (key, value) = segment.split_once([':', '='])?;
            let key = key.trim().to_lowercase();
            if key.is_empty() {
                return None;
            }
            Some((key, value.trim().to_owned()))
        })
        .collect();
    debug!(keys = parsed.len(), "Delimited code payload parsed");
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimited_payload() {
        let map = parse_code_payload("INDEX:12345678001|YEAR:2023; Mean_Grade : B+\nserial=2023/000017");
        assert_eq!(map["index"], "12345678001");
        assert_eq!(map["year"], "2023");
        assert_eq!(map["mean_grade"], "B+");
        assert_eq!(map["serial"], "2023/000017");
    }

    #[test]
    fn serial_with_slash_survives_delimited_parse() {
        let map = parse_code_payload("serial:2023/000017");
        assert_eq!(map["serial"], "2023/000017");
    }

    #[test]
    fn json_payload() {
        let map = parse_code_payload(r#"{"Index": "12345678001", "year": 2023, "nested": {"a": 1}}"#);
        assert_eq!(map["index"], "12345678001");
        assert_eq!(map["year"], "2023");
        assert!(!map.contains_key("nested"));
    }

    #[test]
    fn garbage_yields_nothing() {
        assert!(parse_code_payload("no separators here").is_empty());
    }

    #[test]
    fn no_reader_finds_nothing() {
        let img = DynamicImage::new_rgb8(1, 1);
        assert_eq!(NoCodeReader.read(&img).unwrap(), None);
    }
}

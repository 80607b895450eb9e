//! Frontend status document parser.
//!
//! Implements tolerant reader pattern: unknown elements and attributes are
//! ignored, unknown status names logged.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;
use tracing::debug;

use super::types::{FrontendStatus, StatusFlags};

/// Error parsing a status document.
#[derive(Debug, Error)]
pub enum StatusParseError {
    #[error("Malformed status document: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Parse the XML document produced by `fe_status` into a snapshot.
///
/// `STATUS` elements contribute flag bits, `VALUE` elements the numeric
/// readings; both are matched by name at any nesting depth. Elements may
/// be self-closing.
pub fn parse_status(xml: &str) -> Result<FrontendStatus, StatusParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut status = FrontendStatus::default();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => apply_element(&mut status, &e),
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(status)
}

fn apply_element(status: &mut FrontendStatus, element: &BytesStart<'_>) {
    match element.name().as_ref() {
        b"STATUS" => {
            for attr in element.attributes().flatten() {
                if attr.key.as_ref() != b"status" {
                    continue;
                }
                let name = String::from_utf8_lossy(attr.value.as_ref());
                match StatusFlags::from_name(&name) {
                    Some(flag) => status.flags |= flag,
                    None => debug!(status = %name, "Ignoring unknown status flag"),
                }
            }
        }
        b"VALUE" => {
            for attr in element.attributes().flatten() {
                let key = String::from_utf8_lossy(attr.key.as_ref()).to_ascii_lowercase();
                let value = String::from_utf8_lossy(attr.value.as_ref());
                // Unparsable numbers are ignored, keeping the reader tolerant.
                match key.as_str() {
                    "bit_error_rate" => {
                        if let Ok(n) = value.parse() {
                            status.ber = n;
                        }
                    }
                    "signal_strength" => {
                        if let Ok(n) = value.parse() {
                            status.signal = n;
                        }
                    }
                    "snr" => {
                        if let Ok(n) = value.parse() {
                            status.snr = n;
                        }
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const LOCKED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<FRONTEND>
  <STATUS status="HAS_SIGNAL"/>
  <STATUS status="HAS_LOCK"/>
  <VALUE bit_error_rate="97"/>
  <VALUE signal_strength="52428"/>
  <VALUE snr="28"/>
</FRONTEND>"#;

    #[test]
    fn unions_status_flags() {
        let status = parse_status(LOCKED).unwrap();
        assert_eq!(status.flags, StatusFlags::HAS_SIGNAL | StatusFlags::HAS_LOCK);
        assert!(status.has_lock());
    }

    #[test]
    fn fills_numeric_values() {
        let status = parse_status(LOCKED).unwrap();
        assert_eq!(status.ber, 97);
        assert_eq!(status.signal, 52_428);
        assert_eq!(status.snr, 28);
    }

    #[test]
    fn value_names_are_case_insensitive() {
        let status = parse_status(r#"<FRONTEND><VALUE SNR="42"/></FRONTEND>"#).unwrap();
        assert_eq!(status.snr, 42);
    }

    #[test]
    fn ignores_unknown_status_names() {
        let xml = r#"<FRONTEND><STATUS status="HAS_FUTURE"/><STATUS status="HAS_SYNC"/></FRONTEND>"#;
        let status = parse_status(xml).unwrap();
        assert_eq!(status.flags, StatusFlags::HAS_SYNC);
    }

    #[test]
    fn ignores_unknown_elements_and_values() {
        let xml = r#"<FRONTEND><TUNER adapter="0"/><VALUE snr="7"/><VALUE lnb_voltage="13"/></FRONTEND>"#;
        let status = parse_status(xml).unwrap();
        assert_eq!(status.snr, 7);
        assert_eq!(status.ber, 0);
    }

    #[test]
    fn matches_elements_at_any_depth() {
        let xml = r#"<FRONTEND><TUNER><STATUS status="HAS_CARRIER"/></TUNER></FRONTEND>"#;
        let status = parse_status(xml).unwrap();
        assert_eq!(status.flags, StatusFlags::HAS_CARRIER);
    }

    #[test]
    fn unparsable_numbers_are_skipped() {
        let status = parse_status(r#"<FRONTEND><VALUE snr="lots"/></FRONTEND>"#).unwrap();
        assert_eq!(status.snr, 0);
    }

    #[test]
    fn empty_document_is_an_empty_snapshot() {
        let status = parse_status("<FRONTEND></FRONTEND>").unwrap();
        assert_eq!(status, FrontendStatus::default());
    }

    #[test]
    fn rejects_malformed_document() {
        assert!(parse_status("<FRONTEND><STATUS").is_err());
    }
}

//! Channel descriptors.

use std::net::SocketAddr;
use std::str::FromStr;

use thiserror::Error;

/// A tunable broadcast channel.
///
/// Parsed from the colon-separated form `name:frequency:serviceId`,
/// e.g. `"Ch1:614000:3"`. Descriptors are immutable once parsed; a new one
/// is created per start request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDescriptor {
    /// Display name of the channel.
    pub name: String,
    /// Tuning frequency in kHz.
    pub frequency: u32,
    /// DVB service id selecting the program within the multiplex.
    pub service_id: u16,
}

/// Error parsing a channel descriptor string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelParseError {
    #[error("Expected 'name:frequency:serviceId', got {found} field(s)")]
    FieldCount { found: usize },

    #[error("Invalid {field} '{value}': not a number")]
    InvalidNumber { field: &'static str, value: String },
}

impl FromStr for ChannelDescriptor {
    type Err = ChannelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split(':').collect();
        if fields.len() != 3 {
            return Err(ChannelParseError::FieldCount {
                found: fields.len(),
            });
        }
        let frequency = fields[1]
            .parse()
            .map_err(|_| ChannelParseError::InvalidNumber {
                field: "frequency",
                value: fields[1].to_string(),
            })?;
        let service_id = fields[2]
            .parse()
            .map_err(|_| ChannelParseError::InvalidNumber {
                field: "service id",
                value: fields[2].to_string(),
            })?;
        Ok(Self {
            name: fields[0].to_string(),
            frequency,
            service_id,
        })
    }
}

impl ChannelDescriptor {
    /// Render the single-line demux configuration record directing this
    /// channel's program to `udp_addr`, e.g. `"127.0.0.1:1555 1 3"`.
    pub fn config_line(&self, udp_addr: SocketAddr) -> String {
        format!("{udp_addr} 1 {}", self.service_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_descriptor() {
        let channel: ChannelDescriptor = "Ch1:614000:3".parse().unwrap();
        assert_eq!(channel.name, "Ch1");
        assert_eq!(channel.frequency, 614_000);
        assert_eq!(channel.service_id, 3);
    }

    #[test]
    fn rejects_missing_field() {
        let err = "Ch1:614000".parse::<ChannelDescriptor>().unwrap_err();
        assert_eq!(err, ChannelParseError::FieldCount { found: 2 });
    }

    #[test]
    fn rejects_extra_field() {
        let err = "Ch1:614000:3:extra".parse::<ChannelDescriptor>().unwrap_err();
        assert_eq!(err, ChannelParseError::FieldCount { found: 4 });
    }

    #[test]
    fn rejects_non_numeric_frequency() {
        let err = "Ch1:abc:3".parse::<ChannelDescriptor>().unwrap_err();
        assert!(matches!(
            err,
            ChannelParseError::InvalidNumber {
                field: "frequency",
                ..
            }
        ));
    }

    #[test]
    fn rejects_negative_service_id() {
        let err = "Ch1:614000:-1".parse::<ChannelDescriptor>().unwrap_err();
        assert!(matches!(
            err,
            ChannelParseError::InvalidNumber {
                field: "service id",
                ..
            }
        ));
    }

    #[test]
    fn renders_config_line() {
        let channel: ChannelDescriptor = "Arte:474000:2".parse().unwrap();
        let line = channel.config_line("127.0.0.1:1555".parse().unwrap());
        assert_eq!(line, "127.0.0.1:1555 1 2");
    }
}

//! Frontend status snapshot types.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Maximum raw signal strength value reported by the frontend.
pub const SIGNAL_MAX: u16 = 0xFFFF;

/// Bit flags reported by the tuner frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusFlags(u32);

impl StatusFlags {
    /// Found something above the noise level.
    pub const HAS_SIGNAL: Self = Self(0x01);
    /// Carrier detected.
    pub const HAS_CARRIER: Self = Self(0x02);
    /// Inner FEC is stable.
    pub const HAS_VITERBI: Self = Self(0x04);
    /// Sync bytes found.
    pub const HAS_SYNC: Self = Self(0x08);
    /// Union of the four lock stages.
    pub const HAS_LOCK: Self = Self(0x0F);
    /// Frontend was reinitialized.
    pub const REINIT: Self = Self(0x10);

    /// No flags set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Raw bit value.
    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Look up one status name from the control interface document.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "HAS_SIGNAL" => Some(Self::HAS_SIGNAL),
            "HAS_CARRIER" => Some(Self::HAS_CARRIER),
            "HAS_VITERBI" => Some(Self::HAS_VITERBI),
            "HAS_SYNC" => Some(Self::HAS_SYNC),
            "HAS_LOCK" => Some(Self::HAS_LOCK),
            "REINIT" => Some(Self::REINIT),
            _ => None,
        }
    }
}

impl BitOr for StatusFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for StatusFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for StatusFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let names = [
            (Self::HAS_SIGNAL, "HAS_SIGNAL"),
            (Self::HAS_CARRIER, "HAS_CARRIER"),
            (Self::HAS_VITERBI, "HAS_VITERBI"),
            (Self::HAS_SYNC, "HAS_SYNC"),
            (Self::REINIT, "REINIT"),
        ];
        let mut first = true;
        for (flag, name) in names {
            if self.contains(flag) {
                if !first {
                    f.write_str("+")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// One frontend status reading.
///
/// A fresh snapshot is produced for every successful poll; readings are
/// never merged across polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrontendStatus {
    pub flags: StatusFlags,
    /// Bit error rate counter.
    pub ber: u64,
    /// Raw signal strength, `0..=SIGNAL_MAX`.
    pub signal: u16,
    /// Signal-to-noise ratio.
    pub snr: u16,
}

impl FrontendStatus {
    /// Whether the frontend has achieved full lock.
    pub const fn has_lock(&self) -> bool {
        self.flags.contains(StatusFlags::HAS_LOCK)
    }

    /// Signal strength as a percentage of the maximum raw value.
    #[allow(clippy::cast_possible_truncation)]
    pub fn signal_percent(&self) -> u8 {
        (u32::from(self.signal) * 100 / u32::from(SIGNAL_MAX)) as u8
    }
}

impl fmt::Display for FrontendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signal: {}%, Error: {}", self.signal_percent(), self.ber)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_covers_all_four_stages() {
        let flags = StatusFlags::HAS_SIGNAL
            | StatusFlags::HAS_CARRIER
            | StatusFlags::HAS_VITERBI
            | StatusFlags::HAS_SYNC;
        assert_eq!(flags, StatusFlags::HAS_LOCK);
        assert!(flags.contains(StatusFlags::HAS_LOCK));
    }

    #[test]
    fn partial_lock_is_not_full_lock() {
        let flags = StatusFlags::HAS_SIGNAL | StatusFlags::HAS_CARRIER;
        assert!(!flags.contains(StatusFlags::HAS_LOCK));
        assert!(flags.contains(StatusFlags::HAS_SIGNAL));
    }

    #[test]
    fn unknown_name_is_none() {
        assert_eq!(StatusFlags::from_name("HAS_FUTURE"), None);
        assert_eq!(StatusFlags::from_name("REINIT"), Some(StatusFlags::REINIT));
    }

    #[test]
    fn displays_component_names() {
        let flags = StatusFlags::HAS_SIGNAL | StatusFlags::HAS_SYNC;
        assert_eq!(flags.to_string(), "HAS_SIGNAL+HAS_SYNC");
        assert_eq!(StatusFlags::empty().to_string(), "none");
    }

    #[test]
    fn signal_percent_scales_raw_value() {
        let status = FrontendStatus {
            signal: 52_428,
            ..FrontendStatus::default()
        };
        assert_eq!(status.signal_percent(), 80);
        assert_eq!(status.to_string(), "Signal: 80%, Error: 0");
    }

    #[test]
    fn full_scale_signal_is_100_percent() {
        let status = FrontendStatus {
            signal: SIGNAL_MAX,
            ..FrontendStatus::default()
        };
        assert_eq!(status.signal_percent(), 100);
    }
}

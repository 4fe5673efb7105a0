//! Per-family protocol descriptions.
//!
//! The supported sensors speak two closely related protocols. Rather than
//! branch on the model at every call site, the differences are collected in
//! a [`DeviceProfile`] that the codec and the engine are parameterized by.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Known sensor models.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new models
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[non_exhaustive]
pub enum DeviceModel {
    /// H5074 thermometer/hygrometer.
    H5074,
    /// H5075 thermometer/hygrometer with display.
    H5075,
    /// H5179 thermometer/hygrometer.
    H5179,
}

impl DeviceModel {
    /// Detect the model from an advertised or GATT device name.
    ///
    /// ```
    /// use govee_types::DeviceModel;
    ///
    /// assert_eq!(DeviceModel::from_name("GVH5075_1A2B"), Some(DeviceModel::H5075));
    /// assert_eq!(DeviceModel::from_name("Govee_H5179_0F0F"), Some(DeviceModel::H5179));
    /// assert_eq!(DeviceModel::from_name("Flower care"), None);
    /// ```
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        if name.contains("H5075") {
            Some(DeviceModel::H5075)
        } else if name.contains("H5074") {
            Some(DeviceModel::H5074)
        } else if name.contains("H5179") {
            Some(DeviceModel::H5179)
        } else {
            None
        }
    }

    /// Protocol family of this model.
    #[must_use]
    pub fn family(&self) -> DeviceFamily {
        match self {
            DeviceModel::H5179 => DeviceFamily::H5179,
            DeviceModel::H5074 | DeviceModel::H5075 => DeviceFamily::H507x,
        }
    }
}

impl fmt::Display for DeviceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceModel::H5074 => write!(f, "H5074"),
            DeviceModel::H5075 => write!(f, "H5075"),
            DeviceModel::H5179 => write!(f, "H5179"),
        }
    }
}

/// Protocol family. Unknown models are treated as [`DeviceFamily::H507x`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DeviceFamily {
    /// H5074, H5075 and compatible sensors.
    #[default]
    H507x,
    /// H5179.
    H5179,
}

impl DeviceFamily {
    /// Family for a device name, falling back to [`DeviceFamily::H507x`].
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        DeviceModel::from_name(name)
            .map(|m| m.family())
            .unwrap_or_default()
    }

    /// The protocol profile for this family.
    #[must_use]
    pub fn profile(&self) -> DeviceProfile {
        match self {
            DeviceFamily::H507x => DeviceProfile::H507X,
            DeviceFamily::H5179 => DeviceProfile::H5179,
        }
    }
}

/// Byte layout of a single history record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryDialect {
    /// 3-byte big-endian value with a sign-magnitude temperature.
    SignMagnitude24,
    /// Two 16-bit little-endian values, temperature in two's complement.
    TwosComplement16,
}

/// How a history request is framed and how batch timestamps are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryFraming {
    /// Range in minutes before now, sent as big-endian `u16`s in a padded
    /// frame. Batches carry "minutes ago" relative to the request time.
    MinutesAgo,
    /// Range in minutes since 1970-01-01, sent as little-endian `u32`s
    /// without padding. Batches carry an absolute minute stamp.
    EpochMinutes,
}

/// How the current reading is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrentReadingVariant {
    /// One request on the command channel returns measurement and battery.
    WithBattery,
    /// Measurement on the device channel; battery needs its own request.
    MeasurementOnly,
}

/// Everything that differs between protocol families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceProfile {
    /// Family this profile describes.
    pub family: DeviceFamily,
    /// History records carried by one notification.
    pub records_per_notification: u32,
    /// Record layout inside a history notification.
    pub history_dialect: HistoryDialect,
    /// History request framing and timestamp rule.
    pub history_framing: HistoryFraming,
    /// Current reading request variant.
    pub current_reading: CurrentReadingVariant,
}

impl DeviceProfile {
    /// Profile for H5074/H5075 and unknown models.
    pub const H507X: DeviceProfile = DeviceProfile {
        family: DeviceFamily::H507x,
        records_per_notification: 6,
        history_dialect: HistoryDialect::SignMagnitude24,
        history_framing: HistoryFraming::MinutesAgo,
        current_reading: CurrentReadingVariant::WithBattery,
    };

    /// Profile for the H5179.
    pub const H5179: DeviceProfile = DeviceProfile {
        family: DeviceFamily::H5179,
        records_per_notification: 4,
        history_dialect: HistoryDialect::TwosComplement16,
        history_framing: HistoryFraming::EpochMinutes,
        current_reading: CurrentReadingVariant::MeasurementOnly,
    };

    /// Profile for a device name.
    #[must_use]
    pub fn for_name(name: &str) -> Self {
        DeviceFamily::from_name(name).profile()
    }

    /// Number of history notifications expected for a range covering
    /// `range_size + 1` minutes. Saturates at the largest span.
    #[must_use]
    pub fn expected_messages(&self, range_size: u32) -> u32 {
        range_size
            .saturating_add(1)
            .div_ceil(self.records_per_notification)
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        DeviceProfile::H507X
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_from_name() {
        assert_eq!(DeviceModel::from_name("GVH5075_0000"), Some(DeviceModel::H5075));
        assert_eq!(DeviceModel::from_name("Govee_H5074_1111"), Some(DeviceModel::H5074));
        assert_eq!(DeviceModel::from_name("Govee_H5179_2222"), Some(DeviceModel::H5179));
        assert_eq!(DeviceModel::from_name("ihoment_H6199"), None);
    }

    #[test]
    fn test_unknown_names_fall_back_to_h507x() {
        assert_eq!(DeviceFamily::from_name("Mystery"), DeviceFamily::H507x);
        assert_eq!(DeviceProfile::for_name("Mystery"), DeviceProfile::H507X);
        assert_eq!(DeviceProfile::default(), DeviceProfile::H507X);
    }

    #[test]
    fn test_profiles_differ_where_expected() {
        let a = DeviceProfile::for_name("GVH5075_0000");
        let b = DeviceProfile::for_name("Govee_H5179_0000");
        assert_eq!(a.records_per_notification, 6);
        assert_eq!(b.records_per_notification, 4);
        assert_eq!(a.history_dialect, HistoryDialect::SignMagnitude24);
        assert_eq!(b.history_dialect, HistoryDialect::TwosComplement16);
        assert_eq!(a.history_framing, HistoryFraming::MinutesAgo);
        assert_eq!(b.history_framing, HistoryFraming::EpochMinutes);
        assert_eq!(a.current_reading, CurrentReadingVariant::WithBattery);
        assert_eq!(b.current_reading, CurrentReadingVariant::MeasurementOnly);
    }

    #[test]
    fn test_expected_messages_rounds_up() {
        let a = DeviceProfile::H507X;
        assert_eq!(a.expected_messages(0), 1);
        assert_eq!(a.expected_messages(5), 1);
        assert_eq!(a.expected_messages(6), 2);
        assert_eq!(a.expected_messages(60), 11);

        let b = DeviceProfile::H5179;
        assert_eq!(b.expected_messages(3), 1);
        assert_eq!(b.expected_messages(60), 16);
    }

    #[test]
    fn test_expected_messages_at_largest_span() {
        assert_eq!(DeviceProfile::H5179.expected_messages(u32::MAX), 1 << 30);
        assert_eq!(
            DeviceProfile::H507X.expected_messages(u32::MAX),
            u32::MAX.div_ceil(6)
        );
    }
}

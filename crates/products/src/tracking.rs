use serde::{Deserialize, Serialize};

/// Per-product inventory tracking policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingMode {
    /// Untracked: quantities only.
    #[default]
    None,
    /// Tracked by lot: several units may share one lot number.
    Lot,
    /// Tracked by unique serial number: one unit per serial.
    Serial,
}

impl TrackingMode {
    /// Whether stock of this product is identified by lot/serial records.
    pub fn is_tracked(self) -> bool {
        !matches!(self, TrackingMode::None)
    }

    pub fn requires_unique_serial(self) -> bool {
        matches!(self, TrackingMode::Serial)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrackingMode::None => "none",
            TrackingMode::Lot => "lot",
            TrackingMode::Serial => "serial",
        }
    }
}

impl core::fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_none_is_untracked() {
        assert!(!TrackingMode::None.is_tracked());
        assert!(TrackingMode::Lot.is_tracked());
        assert!(TrackingMode::Serial.is_tracked());
        assert!(TrackingMode::Serial.requires_unique_serial());
        assert!(!TrackingMode::Lot.requires_unique_serial());
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&TrackingMode::Serial).unwrap(), "\"serial\"");
        let mode: TrackingMode = serde_json::from_str("\"lot\"").unwrap();
        assert_eq!(mode, TrackingMode::Lot);
    }
}

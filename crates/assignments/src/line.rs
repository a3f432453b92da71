//! Assignment lines and their save-time validation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use custody_core::{DomainError, DomainResult, Quantity};
use custody_products::{ProductId, TrackingMode};

/// A line as submitted for saving.
///
/// `product_name` and `tracking` are resolved from the catalog by the caller;
/// the name is only used in validation messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDraft {
    pub product_id: ProductId,
    pub product_name: String,
    pub tracking: TrackingMode,
    pub quantity: Quantity,
    pub serial_number: Option<String>,
    pub warranty_serial: Option<String>,
    pub purchase_date: Option<NaiveDate>,
}

/// A saved assignment line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentLine {
    pub line_no: u32,
    pub product_id: ProductId,
    /// Product tracking mode at the time the line was saved.
    pub tracking: TrackingMode,
    pub quantity: Quantity,
    /// Lot/serial number consumed from inventory.
    pub serial_number: Option<String>,
    /// Informational serial (e.g. the one printed on the warranty card).
    pub warranty_serial: Option<String>,
    pub purchase_date: Option<NaiveDate>,
}

fn normalize(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl LineDraft {
    /// Serial number with surrounding whitespace removed; blank counts as absent.
    pub fn serial(&self) -> Option<String> {
        normalize(&self.serial_number)
    }

    pub fn validate(&self) -> DomainResult<()> {
        let product = &self.product_name;

        if !self.quantity.is_positive() {
            return Err(DomainError::validation(format!(
                "The quantity must be greater than 0 for product {product}."
            )));
        }

        if self.tracking.requires_unique_serial() {
            if !self.quantity.is_one() {
                return Err(DomainError::validation(format!(
                    "For product {product} (tracked by unique serial number), the quantity must be 1."
                )));
            }
            if self.serial().is_none() {
                return Err(DomainError::validation(format!(
                    "A serial number is required for product {product}."
                )));
            }
        }

        Ok(())
    }

    /// Validate and number the line.
    pub fn into_line(self, line_no: u32) -> DomainResult<AssignmentLine> {
        self.validate()?;
        Ok(AssignmentLine {
            line_no,
            product_id: self.product_id,
            tracking: self.tracking,
            quantity: self.quantity,
            serial_number: self.serial(),
            warranty_serial: normalize(&self.warranty_serial),
            purchase_date: self.purchase_date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn half() -> Quantity {
        serde_json::from_str("\"0.5\"").unwrap()
    }

    fn draft(tracking: TrackingMode, quantity: Quantity, serial: Option<&str>) -> LineDraft {
        LineDraft {
            product_id: ProductId::generate(),
            product_name: "[MON-27] Monitor".to_string(),
            tracking,
            quantity,
            serial_number: serial.map(str::to_string),
            warranty_serial: None,
            purchase_date: None,
        }
    }

    #[test]
    fn untracked_line_accepts_any_positive_quantity() {
        assert!(draft(TrackingMode::None, Quantity::from(3), None).validate().is_ok());
        assert!(draft(TrackingMode::None, half(), None).validate().is_ok());
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        for qty in [0, -1] {
            let err = draft(TrackingMode::None, Quantity::from(qty), None)
                .validate()
                .unwrap_err();
            assert_eq!(
                err,
                DomainError::validation("The quantity must be greater than 0 for product [MON-27] Monitor.")
            );
        }
    }

    #[test]
    fn serial_tracked_line_requires_quantity_one() {
        let err = draft(TrackingMode::Serial, Quantity::from(2), Some("SN-1"))
            .validate()
            .unwrap_err();
        assert!(err.message().contains("the quantity must be 1"));
    }

    #[test]
    fn serial_tracked_line_requires_serial() {
        for serial in [None, Some(""), Some("   ")] {
            let err = draft(TrackingMode::Serial, Quantity::ONE, serial)
                .validate()
                .unwrap_err();
            assert_eq!(
                err,
                DomainError::validation("A serial number is required for product [MON-27] Monitor.")
            );
        }
    }

    #[test]
    fn lot_tracked_line_may_omit_serial_at_save_time() {
        assert!(draft(TrackingMode::Lot, Quantity::from(5), None).validate().is_ok());
    }

    #[test]
    fn into_line_trims_serials() {
        let mut d = draft(TrackingMode::Serial, Quantity::ONE, Some("  SN-9 "));
        d.warranty_serial = Some(" ".to_string());
        let line = d.into_line(4).unwrap();
        assert_eq!(line.line_no, 4);
        assert_eq!(line.serial_number.as_deref(), Some("SN-9"));
        assert_eq!(line.warranty_serial, None);
    }
}

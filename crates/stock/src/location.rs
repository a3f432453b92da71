use serde::{Deserialize, Serialize};

use custody_core::{CompanyId, DomainError, DomainResult};

custody_core::aggregate_id_newtype!(
    /// Stock location identifier.
    LocationId
);

custody_core::aggregate_id_newtype!(
    /// Warehouse identifier.
    WarehouseId
);

/// What a location represents; only internal locations hold company stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationUsage {
    Internal,
    Customer,
    Supplier,
    InventoryLoss,
}

impl LocationUsage {
    pub fn holds_stock(self) -> bool {
        matches!(self, LocationUsage::Internal)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub company_id: CompanyId,
    pub name: String,
    pub usage: LocationUsage,
}

impl Location {
    pub fn new(
        id: LocationId,
        company_id: CompanyId,
        name: impl Into<String>,
        usage: LocationUsage,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("location name cannot be empty"));
        }
        Ok(Self {
            id,
            company_id,
            name,
            usage,
        })
    }
}

/// A warehouse and the internal location its stock is kept in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub company_id: CompanyId,
    pub code: String,
    pub name: String,
    pub stock_location: LocationId,
}

impl Warehouse {
    /// Build a warehouse over an existing stock location.
    ///
    /// The stock location must be internal and belong to the same company.
    pub fn new(
        id: WarehouseId,
        code: impl Into<String>,
        name: impl Into<String>,
        stock_location: &Location,
    ) -> DomainResult<Self> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(DomainError::validation("warehouse code cannot be empty"));
        }
        if !stock_location.usage.holds_stock() {
            return Err(DomainError::invariant(format!(
                "warehouse stock location '{}' must be internal",
                stock_location.name
            )));
        }
        Ok(Self {
            id,
            company_id: stock_location.company_id,
            code,
            name: name.into(),
            stock_location: stock_location.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warehouse_requires_internal_stock_location() {
        let company_id = CompanyId::new();
        let customers = Location::new(
            LocationId::generate(),
            company_id,
            "Partners/Customers",
            LocationUsage::Customer,
        )
        .unwrap();

        let err = Warehouse::new(WarehouseId::generate(), "WH", "Main", &customers).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn warehouse_inherits_company_from_location() {
        let company_id = CompanyId::new();
        let stock = Location::new(LocationId::generate(), company_id, "WH/Stock", LocationUsage::Internal).unwrap();
        let wh = Warehouse::new(WarehouseId::generate(), "WH", "Main", &stock).unwrap();
        assert_eq!(wh.company_id, company_id);
        assert_eq!(wh.stock_location, stock.id);
    }

    #[test]
    fn location_name_is_required() {
        let err = Location::new(LocationId::generate(), CompanyId::new(), " ", LocationUsage::Internal).unwrap_err();
        assert_eq!(err, DomainError::validation("location name cannot be empty"));
    }
}

use serde::{Deserialize, Serialize};

use custody_core::{CompanyId, DomainError, DomainResult};
use custody_products::ProductId;

custody_core::aggregate_id_newtype!(
    /// Lot/serial number record identifier.
    LotId
);

/// A registered lot or serial number for one product.
///
/// Names are unique per (company, product); lookups match the name exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    pub id: LotId,
    pub company_id: CompanyId,
    pub product_id: ProductId,
    pub name: String,
}

impl Lot {
    pub fn new(
        id: LotId,
        company_id: CompanyId,
        product_id: ProductId,
        name: impl Into<String>,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("lot/serial number cannot be empty"));
        }
        Ok(Self {
            id,
            company_id,
            product_id,
            name,
        })
    }

    pub fn matches(&self, company_id: CompanyId, product_id: ProductId, name: &str) -> bool {
        self.company_id == company_id && self.product_id == product_id && self.name == name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_is_exact_and_scoped() {
        let company_id = CompanyId::new();
        let product_id = ProductId::generate();
        let lot = Lot::new(LotId::generate(), company_id, product_id, "SN-001").unwrap();

        assert!(lot.matches(company_id, product_id, "SN-001"));
        assert!(!lot.matches(company_id, product_id, "sn-001"));
        assert!(!lot.matches(company_id, ProductId::generate(), "SN-001"));
        assert!(!lot.matches(CompanyId::new(), product_id, "SN-001"));
    }
}

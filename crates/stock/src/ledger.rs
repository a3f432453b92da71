use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use custody_core::{DomainError, DomainResult, Quantity};
use custody_products::ProductId;

use crate::location::LocationId;
use crate::lot::LotId;
use crate::movement::StockMove;

/// One on-hand bucket: a product at a location, optionally under a lot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuantKey {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub lot_id: Option<LotId>,
}

/// On-hand quantities per (product, location, lot).
///
/// Buckets at locations that hold stock never go negative; other locations
/// (customers, suppliers, losses) are counterparts and may.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuantLedger {
    quants: HashMap<QuantKey, Quantity>,
}

impl QuantLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_hand(&self, key: &QuantKey) -> Quantity {
        self.quants.get(key).copied().unwrap_or(Quantity::ZERO)
    }

    /// Quantity of a product at a location, across all lots.
    pub fn available(&self, product_id: ProductId, location_id: LocationId) -> DomainResult<Quantity> {
        self.quants
            .iter()
            .filter(|(k, _)| k.product_id == product_id && k.location_id == location_id)
            .try_fold(Quantity::ZERO, |acc, (_, q)| {
                acc.checked_add(*q)
                    .ok_or_else(|| DomainError::invariant("on-hand quantity is out of range"))
            })
    }

    /// Add (or remove, with a negative delta) quantity in one bucket.
    pub fn adjust(&mut self, key: QuantKey, delta: Quantity, holds_stock: bool) -> DomainResult<()> {
        if delta == Quantity::ZERO {
            return Err(DomainError::validation("delta cannot be zero"));
        }
        let current = self.on_hand(&key);
        let next = current.checked_add(delta).ok_or_else(|| {
            DomainError::invariant(format!("quantity out of range (on hand: {current}, change: {delta})"))
        })?;
        if holds_stock && next.is_negative() {
            return Err(DomainError::invariant(format!(
                "stock cannot go negative (on hand: {current}, change: {delta})"
            )));
        }
        if next == Quantity::ZERO {
            self.quants.remove(&key);
        } else {
            self.quants.insert(key, next);
        }
        Ok(())
    }

    /// Apply the quantities of a batch of moves, all or nothing.
    ///
    /// `holds_stock` tells which locations are subject to the non-negative rule.
    pub fn apply_moves<'a>(
        &mut self,
        moves: impl IntoIterator<Item = &'a StockMove>,
        holds_stock: impl Fn(LocationId) -> bool,
    ) -> DomainResult<()> {
        let mut next = self.clone();
        for mv in moves {
            let qty = mv.quantity;
            if !qty.is_positive() {
                return Err(DomainError::invariant(format!(
                    "move '{}' has no quantity to apply",
                    mv.name
                )));
            }
            next.adjust(
                QuantKey {
                    product_id: mv.product_id,
                    location_id: mv.source,
                    lot_id: mv.lot_id,
                },
                -qty,
                holds_stock(mv.source),
            )?;
            next.adjust(
                QuantKey {
                    product_id: mv.product_id,
                    location_id: mv.destination,
                    lot_id: mv.lot_id,
                },
                qty,
                holds_stock(mv.destination),
            )?;
        }
        *self = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::{NewStockMove, StockMoveId};
    use custody_core::CompanyId;
    use rust_decimal::Decimal;

    fn key(product_id: ProductId, location_id: LocationId, lot_id: Option<LotId>) -> QuantKey {
        QuantKey {
            product_id,
            location_id,
            lot_id,
        }
    }

    fn picked_move(product_id: ProductId, from: LocationId, to: LocationId, qty: i64) -> StockMove {
        let mut mv = StockMove::draft(
            StockMoveId::generate(),
            NewStockMove {
                company_id: CompanyId::new(),
                name: "move".to_string(),
                product_id,
                demand: Quantity::from(qty),
                source: from,
                destination: to,
                origin: None,
            },
        )
        .unwrap();
        mv.confirm().unwrap();
        mv.record_picked(Quantity::from(qty), None).unwrap();
        mv
    }

    #[test]
    fn available_sums_lots() {
        let mut ledger = QuantLedger::new();
        let product = ProductId::generate();
        let stock = LocationId::generate();

        ledger.adjust(key(product, stock, None), Quantity::from(2), true).unwrap();
        ledger.adjust(key(product, stock, Some(LotId::generate())), Quantity::from(1), true).unwrap();
        ledger.adjust(key(product, LocationId::generate(), None), Quantity::from(7), true).unwrap();

        assert_eq!(ledger.available(product, stock).unwrap(), Quantity::from(3));
        assert_eq!(ledger.available(ProductId::generate(), stock).unwrap(), Quantity::ZERO);
    }

    #[test]
    fn internal_buckets_cannot_go_negative() {
        let mut ledger = QuantLedger::new();
        let k = key(ProductId::generate(), LocationId::generate(), None);
        ledger.adjust(k, Quantity::from(1), true).unwrap();

        let err = ledger.adjust(k, Quantity::from(-2), true).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(ledger.on_hand(&k), Quantity::from(1));

        // Counterpart locations may go negative.
        ledger.adjust(k, Quantity::from(-2), false).unwrap();
        assert_eq!(ledger.on_hand(&k), Quantity::from(-1));
    }

    #[test]
    fn totals_out_of_range_are_errors() {
        let mut ledger = QuantLedger::new();
        let product = ProductId::generate();
        let stock = LocationId::generate();
        let max = Quantity::new(Decimal::MAX);

        let k = key(product, stock, None);
        ledger.adjust(k, max, true).unwrap();
        assert!(matches!(ledger.adjust(k, max, true), Err(DomainError::InvariantViolation(_))));
        assert_eq!(ledger.on_hand(&k), max);

        // Each lot fits, their sum does not.
        ledger.adjust(key(product, stock, Some(LotId::generate())), max, true).unwrap();
        assert!(ledger.available(product, stock).is_err());
    }

    #[test]
    fn batch_is_all_or_nothing() {
        let mut ledger = QuantLedger::new();
        let product = ProductId::generate();
        let stock = LocationId::generate();
        let customer = LocationId::generate();
        ledger.adjust(key(product, stock, None), Quantity::from(4), true).unwrap();

        let first = picked_move(product, stock, customer, 3);
        let second = picked_move(product, stock, customer, 3);
        let err = ledger
            .apply_moves([&first, &second], |loc| loc == stock)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(ledger.available(product, stock).unwrap(), Quantity::from(4));
        assert_eq!(ledger.available(product, customer).unwrap(), Quantity::ZERO);

        ledger.apply_moves([&first], |loc| loc == stock).unwrap();
        assert_eq!(ledger.available(product, stock).unwrap(), Quantity::from(1));
        assert_eq!(ledger.available(product, customer).unwrap(), Quantity::from(3));
    }
}

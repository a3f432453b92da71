use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use custody_core::{CompanyId, DomainError, Quantity};
use custody_products::ProductId;
use custody_stock::{
    Location, LocationId, Lot, LotId, NewStockMove, QuantKey, QuantLedger, StockMove, StockMoveId,
    Warehouse,
};

use super::InventoryError;
use crate::ports::{InventoryEngine, WarehouseRegistry};

#[derive(Debug, Default)]
struct State {
    locations: HashMap<LocationId, Location>,
    /// Registration order; the first warehouse of a company is its primary one.
    warehouses: Vec<Warehouse>,
    lots: Vec<Lot>,
    moves: HashMap<StockMoveId, StockMove>,
    ledger: QuantLedger,
}

impl State {
    fn location(&self, company_id: CompanyId, id: LocationId) -> Result<&Location, InventoryError> {
        self.locations
            .get(&id)
            .filter(|l| l.company_id == company_id)
            .ok_or(InventoryError::UnknownLocation(id))
    }

    fn holds_stock(&self, id: LocationId) -> bool {
        self.locations.get(&id).is_some_and(|l| l.usage.holds_stock())
    }

    fn company_move(&self, company_id: CompanyId, id: StockMoveId) -> Result<&StockMove, InventoryError> {
        self.moves
            .get(&id)
            .filter(|m| m.company_id == company_id)
            .ok_or(InventoryError::MoveNotFound(id))
    }
}

/// In-memory inventory: locations, warehouses, lots, moves and quants behind
/// one lock.
#[derive(Debug, Default)]
pub struct InMemoryInventory {
    state: RwLock<State>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, InventoryError> {
        self.state.read().map_err(|_| InventoryError::Poisoned)
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, State>, InventoryError> {
        self.state.write().map_err(|_| InventoryError::Poisoned)
    }

    pub fn add_location(&self, location: Location) -> Result<(), InventoryError> {
        let mut state = self.write()?;
        if state.locations.contains_key(&location.id) {
            return Err(DomainError::conflict(format!("location '{}' already exists", location.name)).into());
        }
        tracing::debug!(location = %location.id, name = %location.name, "location added");
        state.locations.insert(location.id, location);
        Ok(())
    }

    pub fn add_warehouse(&self, warehouse: Warehouse) -> Result<(), InventoryError> {
        let mut state = self.write()?;
        let location = state.location(warehouse.company_id, warehouse.stock_location)?;
        if !location.usage.holds_stock() {
            return Err(DomainError::invariant(format!(
                "warehouse stock location '{}' must be internal",
                location.name
            ))
            .into());
        }
        if state
            .warehouses
            .iter()
            .any(|w| w.company_id == warehouse.company_id && w.code == warehouse.code)
        {
            return Err(DomainError::conflict(format!("warehouse '{}' already exists", warehouse.code)).into());
        }
        tracing::debug!(warehouse = %warehouse.id, code = %warehouse.code, "warehouse added");
        state.warehouses.push(warehouse);
        Ok(())
    }

    /// Register a lot/serial number; names are unique per product.
    pub fn register_lot(&self, lot: Lot) -> Result<(), InventoryError> {
        let mut state = self.write()?;
        if state
            .lots
            .iter()
            .any(|l| l.matches(lot.company_id, lot.product_id, &lot.name))
        {
            return Err(DomainError::conflict(format!(
                "lot/serial number '{}' already exists for this product",
                lot.name
            ))
            .into());
        }
        state.lots.push(lot);
        Ok(())
    }

    /// Put stock on hand at an internal location (inventory adjustment).
    pub fn receive(
        &self,
        company_id: CompanyId,
        product_id: ProductId,
        location_id: LocationId,
        quantity: Quantity,
        lot_id: Option<LotId>,
    ) -> Result<(), InventoryError> {
        if !quantity.is_positive() {
            return Err(DomainError::validation("received quantity must be positive").into());
        }
        let mut state = self.write()?;
        let holds_stock = state.location(company_id, location_id)?.usage.holds_stock();
        if !holds_stock {
            return Err(DomainError::invariant("stock can only be received at an internal location").into());
        }
        state.ledger.adjust(
            QuantKey {
                product_id,
                location_id,
                lot_id,
            },
            quantity,
            holds_stock,
        )?;
        tracing::debug!(product = %product_id, location = %location_id, %quantity, "stock received");
        Ok(())
    }

    pub fn location(&self, company_id: CompanyId, id: LocationId) -> Result<Location, InventoryError> {
        Ok(self.read()?.location(company_id, id)?.clone())
    }
}

impl InventoryEngine for InMemoryInventory {
    fn available_quantity(
        &self,
        company_id: CompanyId,
        product_id: ProductId,
        location_id: LocationId,
    ) -> Result<Quantity, InventoryError> {
        let state = self.read()?;
        state.location(company_id, location_id)?;
        Ok(state.ledger.available(product_id, location_id)?)
    }

    fn find_lot(
        &self,
        company_id: CompanyId,
        product_id: ProductId,
        name: &str,
    ) -> Result<Option<Lot>, InventoryError> {
        let state = self.read()?;
        Ok(state
            .lots
            .iter()
            .find(|l| l.matches(company_id, product_id, name))
            .cloned())
    }

    fn create_move(&self, new: NewStockMove) -> Result<StockMove, InventoryError> {
        let mut state = self.write()?;
        state.location(new.company_id, new.source)?;
        state.location(new.company_id, new.destination)?;

        let mut mv = StockMove::draft(StockMoveId::generate(), new)?;
        mv.confirm()?;
        tracing::debug!(stock_move = %mv.id, name = %mv.name, demand = %mv.demand, "stock move created");

        state.moves.insert(mv.id, mv.clone());
        Ok(mv)
    }

    fn record_picked(
        &self,
        company_id: CompanyId,
        move_id: StockMoveId,
        quantity: Quantity,
        lot_id: Option<LotId>,
    ) -> Result<(), InventoryError> {
        let mut state = self.write()?;
        state.company_move(company_id, move_id)?;
        let mv = state
            .moves
            .get_mut(&move_id)
            .ok_or(InventoryError::MoveNotFound(move_id))?;
        mv.record_picked(quantity, lot_id)?;
        Ok(())
    }

    fn complete_moves(
        &self,
        company_id: CompanyId,
        move_ids: &[StockMoveId],
        at: DateTime<Utc>,
    ) -> Result<(), InventoryError> {
        let mut state = self.write()?;

        let mut batch = Vec::with_capacity(move_ids.len());
        for id in move_ids {
            let mv = state.company_move(company_id, *id)?;
            mv.ensure_completable()?;
            batch.push(mv.clone());
        }

        let mut ledger = state.ledger.clone();
        ledger.apply_moves(batch.iter(), |loc| state.holds_stock(loc))?;

        for mut mv in batch {
            mv.mark_done(at)?;
            state.moves.insert(mv.id, mv);
        }
        state.ledger = ledger;

        tracing::info!(moves = move_ids.len(), "stock moves completed");
        Ok(())
    }

    fn cancel_moves(&self, company_id: CompanyId, move_ids: &[StockMoveId]) -> Result<(), InventoryError> {
        let mut state = self.write()?;
        for id in move_ids {
            state.company_move(company_id, *id)?;
        }

        let mut cancelled = 0usize;
        for id in move_ids {
            if let Some(mv) = state.moves.get_mut(id) {
                if mv.is_open() {
                    mv.cancel()?;
                    cancelled += 1;
                }
            }
        }

        tracing::debug!(cancelled, "stock moves cancelled");
        Ok(())
    }

    fn moves(&self, company_id: CompanyId, move_ids: &[StockMoveId]) -> Result<Vec<StockMove>, InventoryError> {
        let state = self.read()?;
        move_ids
            .iter()
            .map(|id| state.company_move(company_id, *id).cloned())
            .collect()
    }
}

impl WarehouseRegistry for InMemoryInventory {
    fn primary_warehouse(&self, company_id: CompanyId) -> Option<Warehouse> {
        let state = self.state.read().ok()?;
        state
            .warehouses
            .iter()
            .find(|w| w.company_id == company_id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use custody_stock::{LocationUsage, MoveState, WarehouseId};

    struct Site {
        inventory: InMemoryInventory,
        company_id: CompanyId,
        stock: LocationId,
        customer: LocationId,
    }

    fn site() -> Site {
        let inventory = InMemoryInventory::new();
        let company_id = CompanyId::new();
        let stock = Location::new(LocationId::generate(), company_id, "WH/Stock", LocationUsage::Internal).unwrap();
        let customer = Location::new(LocationId::generate(), company_id, "Customers", LocationUsage::Customer).unwrap();
        let (stock_id, customer_id) = (stock.id, customer.id);

        inventory.add_location(stock.clone()).unwrap();
        inventory.add_location(customer).unwrap();
        inventory
            .add_warehouse(Warehouse::new(WarehouseId::generate(), "WH", "Main", &stock).unwrap())
            .unwrap();

        Site {
            inventory,
            company_id,
            stock: stock_id,
            customer: customer_id,
        }
    }

    impl Site {
        fn picked_move(&self, product_id: ProductId, qty: i64) -> StockMoveId {
            let mv = self
                .inventory
                .create_move(NewStockMove {
                    company_id: self.company_id,
                    name: "Assignment: ASG/00001".to_string(),
                    product_id,
                    demand: Quantity::from(qty),
                    source: self.stock,
                    destination: self.customer,
                    origin: Some("ASG/00001".to_string()),
                })
                .unwrap();
            self.inventory
                .record_picked(self.company_id, mv.id, Quantity::from(qty), None)
                .unwrap();
            mv.id
        }
    }

    #[test]
    fn primary_warehouse_is_first_registered() {
        let s = site();
        let second = Location::new(LocationId::generate(), s.company_id, "WH2/Stock", LocationUsage::Internal).unwrap();
        s.inventory.add_location(second.clone()).unwrap();
        s.inventory
            .add_warehouse(Warehouse::new(WarehouseId::generate(), "WH2", "Overflow", &second).unwrap())
            .unwrap();

        let primary = s.inventory.primary_warehouse(s.company_id).unwrap();
        assert_eq!(primary.code, "WH");
        assert!(s.inventory.primary_warehouse(CompanyId::new()).is_none());
    }

    #[test]
    fn created_moves_are_confirmed() {
        let s = site();
        let id = s.picked_move(ProductId::generate(), 2);
        let moves = s.inventory.moves(s.company_id, &[id]).unwrap();
        assert_eq!(moves[0].state, MoveState::Confirmed);
        assert!(moves[0].picked);
    }

    #[test]
    fn completing_moves_transfers_stock() {
        let s = site();
        let product = ProductId::generate();
        s.inventory
            .receive(s.company_id, product, s.stock, Quantity::from(5), None)
            .unwrap();

        let id = s.picked_move(product, 3);
        s.inventory.complete_moves(s.company_id, &[id], Utc::now()).unwrap();

        assert_eq!(
            s.inventory.available_quantity(s.company_id, product, s.stock).unwrap(),
            Quantity::from(2)
        );
        assert_eq!(
            s.inventory.available_quantity(s.company_id, product, s.customer).unwrap(),
            Quantity::from(3)
        );
        assert_eq!(s.inventory.moves(s.company_id, &[id]).unwrap()[0].state, MoveState::Done);
    }

    #[test]
    fn receiving_past_the_decimal_range_is_rejected() {
        let s = site();
        let product = ProductId::generate();
        let huge = Quantity::new(rust_decimal::Decimal::MAX);
        s.inventory.receive(s.company_id, product, s.stock, huge, None).unwrap();

        let err = s
            .inventory
            .receive(s.company_id, product, s.stock, huge, None)
            .unwrap_err();
        assert!(matches!(err, InventoryError::Rejected(DomainError::InvariantViolation(_))));
        assert_eq!(
            s.inventory.available_quantity(s.company_id, product, s.stock).unwrap(),
            huge
        );
    }

    #[test]
    fn batch_completion_is_all_or_nothing() {
        let s = site();
        let product = ProductId::generate();
        s.inventory
            .receive(s.company_id, product, s.stock, Quantity::from(4), None)
            .unwrap();

        let first = s.picked_move(product, 3);
        let second = s.picked_move(product, 3);
        let err = s
            .inventory
            .complete_moves(s.company_id, &[first, second], Utc::now())
            .unwrap_err();
        assert!(matches!(err, InventoryError::Rejected(DomainError::InvariantViolation(_))));

        let moves = s.inventory.moves(s.company_id, &[first, second]).unwrap();
        assert!(moves.iter().all(|m| m.state == MoveState::Confirmed));
        assert_eq!(
            s.inventory.available_quantity(s.company_id, product, s.stock).unwrap(),
            Quantity::from(4)
        );
    }

    #[test]
    fn cancel_skips_done_moves() {
        let s = site();
        let product = ProductId::generate();
        s.inventory
            .receive(s.company_id, product, s.stock, Quantity::from(1), None)
            .unwrap();
        let done = s.picked_move(product, 1);
        s.inventory.complete_moves(s.company_id, &[done], Utc::now()).unwrap();
        let open = s.picked_move(product, 1);

        s.inventory.cancel_moves(s.company_id, &[done, open]).unwrap();

        let moves = s.inventory.moves(s.company_id, &[done, open]).unwrap();
        assert_eq!(moves[0].state, MoveState::Done);
        assert_eq!(moves[1].state, MoveState::Cancelled);
    }

    #[test]
    fn lots_are_unique_per_product_and_matched_exactly() {
        let s = site();
        let product = ProductId::generate();
        let lot = Lot::new(LotId::generate(), s.company_id, product, "SN-001").unwrap();
        s.inventory.register_lot(lot.clone()).unwrap();

        let dup = Lot::new(LotId::generate(), s.company_id, product, "SN-001").unwrap();
        assert!(s.inventory.register_lot(dup).is_err());

        assert_eq!(s.inventory.find_lot(s.company_id, product, "SN-001").unwrap(), Some(lot));
        assert_eq!(s.inventory.find_lot(s.company_id, product, "SN-00").unwrap(), None);
        assert_eq!(s.inventory.find_lot(CompanyId::new(), product, "SN-001").unwrap(), None);
    }

    #[test]
    fn other_company_locations_are_invisible() {
        let s = site();
        let err = s
            .inventory
            .available_quantity(CompanyId::new(), ProductId::generate(), s.stock)
            .unwrap_err();
        assert!(matches!(err, InventoryError::UnknownLocation(_)));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: a batch either moves exactly its total or nothing,
            /// and the warehouse never goes negative.
            #[test]
            fn batch_completion_conserves_stock(
                on_hand in 1i64..20,
                demands in proptest::collection::vec(1i64..8, 1..5),
            ) {
                let s = site();
                let product = ProductId::generate();
                s.inventory
                    .receive(s.company_id, product, s.stock, Quantity::from(on_hand), None)
                    .unwrap();
                let ids: Vec<_> = demands.iter().map(|d| s.picked_move(product, *d)).collect();
                let total: i64 = demands.iter().sum();

                let result = s.inventory.complete_moves(s.company_id, &ids, Utc::now());

                let at_stock = s.inventory.available_quantity(s.company_id, product, s.stock).unwrap();
                let at_customer = s.inventory.available_quantity(s.company_id, product, s.customer).unwrap();
                prop_assert_eq!(at_stock.checked_add(at_customer), Some(Quantity::from(on_hand)));
                if total <= on_hand {
                    prop_assert!(result.is_ok());
                    prop_assert_eq!(at_customer, Quantity::from(total));
                } else {
                    prop_assert!(result.is_err());
                    prop_assert_eq!(at_customer, Quantity::ZERO);
                }
            }
        }
    }
}

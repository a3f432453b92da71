use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use custody_core::{CompanyId, DomainError, DomainResult, Quantity};
use custody_products::ProductId;

use crate::location::LocationId;
use crate::lot::LotId;

custody_core::aggregate_id_newtype!(
    /// Stock move identifier.
    StockMoveId
);

/// Stock move lifecycle: draft → confirmed → done, or cancelled before done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveState {
    Draft,
    Confirmed,
    Done,
    Cancelled,
}

/// Input for creating a stock move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStockMove {
    pub company_id: CompanyId,
    pub name: String,
    pub product_id: ProductId,
    /// Demanded quantity.
    pub demand: Quantity,
    pub source: LocationId,
    pub destination: LocationId,
    /// Reference of the document that caused the move.
    pub origin: Option<String>,
}

/// A transfer of one product between two locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMove {
    pub id: StockMoveId,
    pub company_id: CompanyId,
    pub name: String,
    pub product_id: ProductId,
    pub demand: Quantity,
    /// Quantity actually moved (set when picked).
    pub quantity: Quantity,
    pub picked: bool,
    pub lot_id: Option<LotId>,
    pub source: LocationId,
    pub destination: LocationId,
    pub origin: Option<String>,
    pub state: MoveState,
    pub date_done: Option<DateTime<Utc>>,
}

impl StockMove {
    /// Create a draft move.
    pub fn draft(id: StockMoveId, new: NewStockMove) -> DomainResult<Self> {
        if !new.demand.is_positive() {
            return Err(DomainError::validation("move quantity must be positive"));
        }
        if new.source == new.destination {
            return Err(DomainError::validation(
                "source and destination locations must differ",
            ));
        }
        Ok(Self {
            id,
            company_id: new.company_id,
            name: new.name,
            product_id: new.product_id,
            demand: new.demand,
            quantity: Quantity::ZERO,
            picked: false,
            lot_id: None,
            source: new.source,
            destination: new.destination,
            origin: new.origin,
            state: MoveState::Draft,
            date_done: None,
        })
    }

    pub fn confirm(&mut self) -> DomainResult<()> {
        match self.state {
            MoveState::Draft => {
                self.state = MoveState::Confirmed;
                Ok(())
            }
            MoveState::Confirmed => Ok(()),
            other => Err(DomainError::invariant(format!(
                "cannot confirm a move in state {other:?}"
            ))),
        }
    }

    /// Record the picked quantity (and lot, for tracked products).
    pub fn record_picked(&mut self, quantity: Quantity, lot_id: Option<LotId>) -> DomainResult<()> {
        if !self.is_open() {
            return Err(DomainError::invariant(format!(
                "cannot pick a move in state {:?}",
                self.state
            )));
        }
        if !quantity.is_positive() {
            return Err(DomainError::validation("picked quantity must be positive"));
        }
        self.quantity = quantity;
        self.picked = true;
        if lot_id.is_some() {
            self.lot_id = lot_id;
        }
        Ok(())
    }

    /// Check that the move can be completed, without changing it.
    pub fn ensure_completable(&self) -> DomainResult<()> {
        if self.state != MoveState::Confirmed {
            return Err(DomainError::invariant(format!(
                "move '{}' must be confirmed to be completed (state: {:?})",
                self.name, self.state
            )));
        }
        if !self.picked || !self.quantity.is_positive() {
            return Err(DomainError::invariant(format!(
                "move '{}' has no picked quantity",
                self.name
            )));
        }
        Ok(())
    }

    pub fn mark_done(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_completable()?;
        self.state = MoveState::Done;
        self.date_done = Some(at);
        Ok(())
    }

    pub fn cancel(&mut self) -> DomainResult<()> {
        match self.state {
            MoveState::Done => Err(DomainError::invariant(format!(
                "move '{}' is done and cannot be cancelled",
                self.name
            ))),
            MoveState::Cancelled => Ok(()),
            MoveState::Draft | MoveState::Confirmed => {
                self.state = MoveState::Cancelled;
                Ok(())
            }
        }
    }

    /// Neither done nor cancelled.
    pub fn is_open(&self) -> bool {
        matches!(self.state, MoveState::Draft | MoveState::Confirmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_move(demand: i64) -> NewStockMove {
        NewStockMove {
            company_id: CompanyId::new(),
            name: "Assignment: ASG/00001".to_string(),
            product_id: ProductId::generate(),
            demand: Quantity::from(demand),
            source: LocationId::generate(),
            destination: LocationId::generate(),
            origin: Some("ASG/00001".to_string()),
        }
    }

    fn confirmed(demand: i64) -> StockMove {
        let mut mv = StockMove::draft(StockMoveId::generate(), new_move(demand)).unwrap();
        mv.confirm().unwrap();
        mv
    }

    #[test]
    fn draft_rejects_non_positive_demand() {
        let err = StockMove::draft(StockMoveId::generate(), new_move(0)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn draft_rejects_same_source_and_destination() {
        let mut new = new_move(1);
        new.destination = new.source;
        assert!(StockMove::draft(StockMoveId::generate(), new).is_err());
    }

    #[test]
    fn picked_confirmed_move_can_be_done() {
        let mut mv = confirmed(3);
        mv.record_picked(Quantity::from(3), None).unwrap();
        let now = Utc::now();
        mv.mark_done(now).unwrap();

        assert_eq!(mv.state, MoveState::Done);
        assert_eq!(mv.date_done, Some(now));
        assert_eq!(mv.quantity, Quantity::from(3));
        assert!(!mv.is_open());
    }

    #[test]
    fn unpicked_move_cannot_be_done() {
        let mut mv = confirmed(3);
        assert!(mv.mark_done(Utc::now()).is_err());
        assert_eq!(mv.state, MoveState::Confirmed);
    }

    #[test]
    fn picking_stamps_lot() {
        let mut mv = confirmed(1);
        let lot = LotId::generate();
        mv.record_picked(Quantity::ONE, Some(lot)).unwrap();
        assert_eq!(mv.lot_id, Some(lot));
        assert!(mv.picked);
    }

    #[test]
    fn done_moves_cannot_be_cancelled() {
        let mut mv = confirmed(1);
        mv.record_picked(Quantity::ONE, None).unwrap();
        mv.mark_done(Utc::now()).unwrap();
        assert!(mv.cancel().is_err());
        assert_eq!(mv.state, MoveState::Done);
    }

    #[test]
    fn cancel_is_idempotent_and_blocks_picking() {
        let mut mv = confirmed(2);
        mv.cancel().unwrap();
        mv.cancel().unwrap();
        assert_eq!(mv.state, MoveState::Cancelled);
        assert!(mv.record_picked(Quantity::from(2), None).is_err());
        assert!(mv.confirm().is_err());
    }
}

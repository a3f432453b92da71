//! Completion and cancellation: the two transitions that touch stock.

use chrono::Utc;

use custody_assignments::{
    Assignment, AssignmentCommand, AssignmentId, CancelAssignment, CompleteAssignment,
};
use custody_core::{CompanyId, Quantity};
use custody_products::ProductId;
use custody_stock::{LocationId, LotId, NewStockMove, StockMoveId};

use super::{CustodyServices, ServiceError};
use crate::command_dispatcher::DispatchError;
use crate::projections::AssignmentReadModel;

/// One move to create, fully checked.
#[derive(Debug)]
struct PlannedMove {
    product_id: ProductId,
    quantity: Quantity,
    lot_id: Option<LotId>,
}

#[derive(Debug)]
struct CompletionPlan {
    source: LocationId,
    destination: LocationId,
    moves: Vec<PlannedMove>,
}

impl CustodyServices {
    /// Assigned → done: move every line's stock to the contact and complete
    /// the moves as one batch.
    ///
    /// Nothing is created unless every line passes its checks. If creating or
    /// completing the moves fails, the moves created here are cancelled.
    pub fn complete(&self, company_id: CompanyId, assignment_id: AssignmentId) -> Result<AssignmentReadModel, ServiceError> {
        let _claim = self.claims.claim(company_id, assignment_id)?;
        let assignment = self.load_assignment(company_id, assignment_id)?;
        assignment
            .ensure_completable()
            .map_err(|e| ServiceError::Dispatch(DispatchError::from(e)))?;

        let plan = self.plan_completion(company_id, &assignment)?;
        let move_ids = self.execute_plan(company_id, &assignment, plan)?;

        let completed = self.commit_assignment(
            company_id,
            assignment_id,
            AssignmentCommand::CompleteAssignment(CompleteAssignment {
                company_id,
                assignment_id,
                stock_moves: move_ids.clone(),
                occurred_at: Utc::now(),
            }),
        );
        if let Err(err) = completed {
            // Only reachable on a store failure: the claim keeps other writers out.
            tracing::error!(
                company = %company_id,
                assignment = %assignment_id,
                moves = move_ids.len(),
                error = %err,
                "stock moves completed but the assignment could not be marked done"
            );
            return Err(err);
        }

        tracing::info!(
            company = %company_id,
            assignment = %assignment_id,
            code = assignment.code(),
            moves = move_ids.len(),
            "assignment done"
        );
        self.get(company_id, assignment_id)
    }

    /// Cancel the assignment and its open stock moves.
    pub fn cancel(&self, company_id: CompanyId, assignment_id: AssignmentId) -> Result<AssignmentReadModel, ServiceError> {
        let _claim = self.claims.claim(company_id, assignment_id)?;
        let assignment = self.load_assignment(company_id, assignment_id)?;
        assignment
            .ensure_cancellable()
            .map_err(|e| ServiceError::Dispatch(DispatchError::from(e)))?;

        if !assignment.stock_moves().is_empty() {
            self.inventory.cancel_moves(company_id, assignment.stock_moves())?;
        }

        let committed = self.commit_assignment(
            company_id,
            assignment_id,
            AssignmentCommand::CancelAssignment(CancelAssignment {
                company_id,
                assignment_id,
                occurred_at: Utc::now(),
            }),
        )?;
        if !committed.is_empty() {
            tracing::info!(company = %company_id, assignment = %assignment_id, "assignment cancelled");
        }
        self.get(company_id, assignment_id)
    }

    fn plan_completion(&self, company_id: CompanyId, assignment: &Assignment) -> Result<CompletionPlan, ServiceError> {
        let warehouse = self
            .warehouses
            .primary_warehouse(company_id)
            .ok_or(ServiceError::NoWarehouse(company_id))?;

        let destination = assignment
            .contact_id()
            .and_then(|contact_id| self.contacts.get(company_id, &contact_id))
            .and_then(|contact| contact.outbound_location)
            .ok_or(ServiceError::MissingCustomerLocation)?;

        let mut moves = Vec::with_capacity(assignment.lines().len());
        for line in assignment.lines() {
            let product = self
                .products
                .get(company_id, &line.product_id)
                .ok_or(ServiceError::UnknownProduct(line.product_id))?;
            let product_name = product.display_name();
            let serial = line.serial_number.as_deref().map(str::trim).filter(|s| !s.is_empty());

            if product.tracking.is_tracked() && serial.is_none() {
                return Err(ServiceError::MissingSerial { product: product_name });
            }

            let available =
                self.inventory
                    .available_quantity(company_id, line.product_id, warehouse.stock_location)?;
            if available < line.quantity {
                return Err(ServiceError::InsufficientStock {
                    product: product_name,
                    available,
                    requested: line.quantity,
                });
            }

            let lot_id = match serial {
                Some(serial) if product.tracking.is_tracked() => {
                    let lot = self
                        .inventory
                        .find_lot(company_id, line.product_id, serial)?
                        .ok_or_else(|| ServiceError::SerialNotFound {
                            serial: serial.to_string(),
                            product: product_name.clone(),
                        })?;
                    Some(lot.id)
                }
                _ => None,
            };

            moves.push(PlannedMove {
                product_id: line.product_id,
                quantity: line.quantity,
                lot_id,
            });
        }

        Ok(CompletionPlan {
            source: warehouse.stock_location,
            destination,
            moves,
        })
    }

    fn execute_plan(
        &self,
        company_id: CompanyId,
        assignment: &Assignment,
        plan: CompletionPlan,
    ) -> Result<Vec<StockMoveId>, ServiceError> {
        let mut created = Vec::with_capacity(plan.moves.len());
        let outcome = self.create_and_complete(company_id, assignment.code(), &plan, &mut created);

        if let Err(err) = outcome {
            if !created.is_empty() {
                if let Err(cancel_err) = self.inventory.cancel_moves(company_id, &created) {
                    tracing::warn!(
                        company = %company_id,
                        moves = created.len(),
                        error = %cancel_err,
                        "could not cancel moves after a failed completion"
                    );
                }
            }
            tracing::warn!(company = %company_id, code = assignment.code(), error = %err, "assignment completion failed");
            return Err(err);
        }
        Ok(created)
    }

    fn create_and_complete(
        &self,
        company_id: CompanyId,
        code: &str,
        plan: &CompletionPlan,
        created: &mut Vec<StockMoveId>,
    ) -> Result<(), ServiceError> {
        for planned in &plan.moves {
            let mv = self.inventory.create_move(NewStockMove {
                company_id,
                name: format!("Assignment: {code}"),
                product_id: planned.product_id,
                demand: planned.quantity,
                source: plan.source,
                destination: plan.destination,
                origin: Some(code.to_string()),
            })?;
            created.push(mv.id);
            self.inventory
                .record_picked(company_id, mv.id, planned.quantity, planned.lot_id)?;
        }
        self.inventory.complete_moves(company_id, created, Utc::now())?;
        Ok(())
    }
}

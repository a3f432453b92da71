use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use custody_core::CompanyId;
use custody_events::EventEnvelope;
use custody_products::{ProductEvent, ProductId, ProductStatus, TrackingMode, display_name};

use super::ProjectionError;
use super::cursor::StreamCursors;
use crate::ports::ProductCatalog;
use crate::read_model::CompanyStore;

pub const PRODUCT_AGGREGATE: &str = "products.product";

/// Queryable product read model (catalog).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductReadModel {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub tracking: TrackingMode,
    pub status: ProductStatus,
}

impl ProductReadModel {
    pub fn display_name(&self) -> String {
        display_name(&self.sku, &self.name)
    }
}

#[derive(Debug)]
pub struct ProductCatalogProjection<S>
where
    S: CompanyStore<ProductId, ProductReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> ProductCatalogProjection<S>
where
    S: CompanyStore<ProductId, ProductReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, company_id: CompanyId, product_id: &ProductId) -> Option<ProductReadModel> {
        self.store.get(company_id, product_id)
    }

    pub fn list(&self, company_id: CompanyId) -> Vec<ProductReadModel> {
        self.store.list(company_id)
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != PRODUCT_AGGREGATE {
            return Ok(());
        }

        let company_id = envelope.company_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.should_apply(company_id, aggregate_id, seq)? {
            return Ok(());
        }

        let ev: ProductEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        if ev.company_id() != company_id {
            return Err(ProjectionError::CompanyIsolation(
                "event company_id does not match envelope company_id".to_string(),
            ));
        }
        if ev.product_id().0 != aggregate_id {
            return Err(ProjectionError::CompanyIsolation(
                "event product_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            ProductEvent::ProductCreated(e) => {
                self.store.upsert(
                    company_id,
                    e.product_id,
                    ProductReadModel {
                        product_id: e.product_id,
                        sku: e.sku,
                        name: e.name,
                        tracking: e.tracking,
                        status: ProductStatus::Active,
                    },
                );
            }
            ProductEvent::TrackingChanged(e) => {
                if let Some(mut rm) = self.store.get(company_id, &e.product_id) {
                    rm.tracking = e.tracking;
                    self.store.upsert(company_id, e.product_id, rm);
                }
            }
            ProductEvent::ProductArchived(e) => {
                if let Some(mut rm) = self.store.get(company_id, &e.product_id) {
                    rm.status = ProductStatus::Archived;
                    self.store.upsert(company_id, e.product_id, rm);
                }
            }
        }

        self.cursors.advance(company_id, aggregate_id, seq);
        Ok(())
    }

    /// Drop the company's read models and replay its events.
    pub fn rebuild(
        &self,
        company_id: CompanyId,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        self.store.clear_company(company_id);
        self.cursors.clear_company(company_id);

        let mut envs: Vec<_> = envelopes
            .into_iter()
            .filter(|e| e.company_id() == company_id)
            .collect();
        envs.sort_by_key(|e| (e.aggregate_id().as_uuid().as_u128(), e.sequence_number()));

        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}

impl<S> ProductCatalog for ProductCatalogProjection<S>
where
    S: CompanyStore<ProductId, ProductReadModel>,
{
    fn product(&self, company_id: CompanyId, product_id: ProductId) -> Option<ProductReadModel> {
        self.get(company_id, &product_id)
    }
}

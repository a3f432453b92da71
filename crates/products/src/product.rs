use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use custody_core::{Aggregate, AggregateRoot, CompanyId, DomainError};
use custody_events::Event;

use crate::tracking::TrackingMode;

custody_core::aggregate_id_newtype!(
    /// Product identifier (company-scoped via `company_id` fields in events/commands).
    ProductId
);

/// Product status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Active,
    Archived,
}

/// Aggregate root: Product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    company_id: Option<CompanyId>,
    sku: String,
    name: String,
    tracking: TrackingMode,
    status: ProductStatus,
    version: u64,
    created: bool,
}

impl Product {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            company_id: None,
            sku: String::new(),
            name: String::new(),
            tracking: TrackingMode::None,
            status: ProductStatus::Active,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn company_id(&self) -> Option<CompanyId> {
        self.company_id
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display name: `[SKU] Name`.
    pub fn display_name(&self) -> String {
        display_name(&self.sku, &self.name)
    }

    pub fn tracking(&self) -> TrackingMode {
        self.tracking
    }

    pub fn status(&self) -> ProductStatus {
        self.status
    }
}

/// Display name as shown in validation messages and pickers.
pub fn display_name(sku: &str, name: &str) -> String {
    if sku.is_empty() {
        name.to_string()
    } else {
        format!("[{sku}] {name}")
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub company_id: CompanyId,
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub tracking: TrackingMode,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeTracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeTracking {
    pub company_id: CompanyId,
    pub product_id: ProductId,
    pub tracking: TrackingMode,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ArchiveProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveProduct {
    pub company_id: CompanyId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    CreateProduct(CreateProduct),
    ChangeTracking(ChangeTracking),
    ArchiveProduct(ArchiveProduct),
}

/// Event: ProductCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub company_id: CompanyId,
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub tracking: TrackingMode,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TrackingChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingChanged {
    pub company_id: CompanyId,
    pub product_id: ProductId,
    pub tracking: TrackingMode,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductArchived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductArchived {
    pub company_id: CompanyId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    TrackingChanged(TrackingChanged),
    ProductArchived(ProductArchived),
}

impl ProductEvent {
    pub fn company_id(&self) -> CompanyId {
        match self {
            ProductEvent::ProductCreated(e) => e.company_id,
            ProductEvent::TrackingChanged(e) => e.company_id,
            ProductEvent::ProductArchived(e) => e.company_id,
        }
    }

    pub fn product_id(&self) -> ProductId {
        match self {
            ProductEvent::ProductCreated(e) => e.product_id,
            ProductEvent::TrackingChanged(e) => e.product_id,
            ProductEvent::ProductArchived(e) => e.product_id,
        }
    }
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "products.product.created",
            ProductEvent::TrackingChanged(_) => "products.product.tracking_changed",
            ProductEvent::ProductArchived(_) => "products.product.archived",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::TrackingChanged(e) => e.occurred_at,
            ProductEvent::ProductArchived(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.company_id = Some(e.company_id);
                self.sku = e.sku.clone();
                self.name = e.name.clone();
                self.tracking = e.tracking;
                self.status = ProductStatus::Active;
                self.created = true;
            }
            ProductEvent::TrackingChanged(e) => {
                self.tracking = e.tracking;
            }
            ProductEvent::ProductArchived(_) => {
                self.status = ProductStatus::Archived;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::CreateProduct(cmd) => self.handle_create(cmd),
            ProductCommand::ChangeTracking(cmd) => self.handle_change_tracking(cmd),
            ProductCommand::ArchiveProduct(cmd) => self.handle_archive(cmd),
        }
    }
}

impl Product {
    fn ensure_company(&self, company_id: CompanyId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.company_id != Some(company_id) {
            return Err(DomainError::invariant("company mismatch"));
        }
        Ok(())
    }

    fn ensure_product_id(&self, product_id: ProductId) -> Result<(), DomainError> {
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn ensure_existing(&self, company_id: CompanyId, product_id: ProductId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_company(company_id)?;
        self.ensure_product_id(product_id)
    }

    fn handle_create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.sku.trim().is_empty() {
            return Err(DomainError::validation("SKU cannot be empty"));
        }

        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            company_id: cmd.company_id,
            product_id: cmd.product_id,
            sku: cmd.sku.trim().to_string(),
            name: cmd.name.trim().to_string(),
            tracking: cmd.tracking,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_tracking(&self, cmd: &ChangeTracking) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_existing(cmd.company_id, cmd.product_id)?;

        if self.status == ProductStatus::Archived {
            return Err(DomainError::invariant("archived products cannot be changed"));
        }
        if self.tracking == cmd.tracking {
            return Ok(vec![]);
        }

        Ok(vec![ProductEvent::TrackingChanged(TrackingChanged {
            company_id: cmd.company_id,
            product_id: cmd.product_id,
            tracking: cmd.tracking,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_archive(&self, cmd: &ArchiveProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_existing(cmd.company_id, cmd.product_id)?;

        if self.status == ProductStatus::Archived {
            return Err(DomainError::conflict("product is already archived"));
        }

        Ok(vec![ProductEvent::ProductArchived(ProductArchived {
            company_id: cmd.company_id,
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use custody_events::execute;

    fn test_company_id() -> CompanyId {
        CompanyId::new()
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn create_cmd(company_id: CompanyId, product_id: ProductId, tracking: TrackingMode) -> ProductCommand {
        ProductCommand::CreateProduct(CreateProduct {
            company_id,
            product_id,
            sku: "LAP-01".to_string(),
            name: "Laptop".to_string(),
            tracking,
            occurred_at: test_time(),
        })
    }

    #[test]
    fn create_product_emits_product_created_event() {
        let company_id = test_company_id();
        let product_id = ProductId::generate();
        let mut product = Product::empty(product_id);

        let events = execute(&mut product, &create_cmd(company_id, product_id, TrackingMode::Serial)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "products.product.created");
        assert_eq!(product.tracking(), TrackingMode::Serial);
        assert_eq!(product.status(), ProductStatus::Active);
        assert_eq!(product.display_name(), "[LAP-01] Laptop");
        assert_eq!(product.version(), 1);
    }

    #[test]
    fn create_product_rejects_empty_name() {
        let product_id = ProductId::generate();
        let product = Product::empty(product_id);
        let cmd = ProductCommand::CreateProduct(CreateProduct {
            company_id: test_company_id(),
            product_id,
            sku: "X".to_string(),
            name: "   ".to_string(),
            tracking: TrackingMode::None,
            occurred_at: test_time(),
        });

        let err = product.handle(&cmd).unwrap_err();
        assert_eq!(err, DomainError::validation("name cannot be empty"));
    }

    #[test]
    fn create_product_rejects_duplicate_creation() {
        let company_id = test_company_id();
        let product_id = ProductId::generate();
        let mut product = Product::empty(product_id);
        execute(&mut product, &create_cmd(company_id, product_id, TrackingMode::None)).unwrap();

        let err = product
            .handle(&create_cmd(company_id, product_id, TrackingMode::None))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn change_tracking_is_noop_when_unchanged() {
        let company_id = test_company_id();
        let product_id = ProductId::generate();
        let mut product = Product::empty(product_id);
        execute(&mut product, &create_cmd(company_id, product_id, TrackingMode::Lot)).unwrap();

        let same = ProductCommand::ChangeTracking(ChangeTracking {
            company_id,
            product_id,
            tracking: TrackingMode::Lot,
            occurred_at: test_time(),
        });
        assert!(product.handle(&same).unwrap().is_empty());

        let to_serial = ProductCommand::ChangeTracking(ChangeTracking {
            company_id,
            product_id,
            tracking: TrackingMode::Serial,
            occurred_at: test_time(),
        });
        execute(&mut product, &to_serial).unwrap();
        assert_eq!(product.tracking(), TrackingMode::Serial);
    }

    #[test]
    fn archived_products_cannot_change_tracking() {
        let company_id = test_company_id();
        let product_id = ProductId::generate();
        let mut product = Product::empty(product_id);
        execute(&mut product, &create_cmd(company_id, product_id, TrackingMode::None)).unwrap();
        execute(
            &mut product,
            &ProductCommand::ArchiveProduct(ArchiveProduct {
                company_id,
                product_id,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        let err = product
            .handle(&ProductCommand::ChangeTracking(ChangeTracking {
                company_id,
                product_id,
                tracking: TrackingMode::Serial,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn commands_on_missing_product_are_not_found() {
        let product_id = ProductId::generate();
        let product = Product::empty(product_id);
        let err = product
            .handle(&ProductCommand::ArchiveProduct(ArchiveProduct {
                company_id: test_company_id(),
                product_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn archive_rejects_wrong_company() {
        let product_id = ProductId::generate();
        let mut product = Product::empty(product_id);
        execute(&mut product, &create_cmd(test_company_id(), product_id, TrackingMode::None)).unwrap();

        let err = product
            .handle(&ProductCommand::ArchiveProduct(ArchiveProduct {
                company_id: test_company_id(),
                product_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::invariant("company mismatch"));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn tracking_strategy() -> impl Strategy<Value = TrackingMode> {
            prop_oneof![
                Just(TrackingMode::None),
                Just(TrackingMode::Lot),
                Just(TrackingMode::Serial),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: handle never mutates state and is repeatable.
            #[test]
            fn handle_is_deterministic(
                sku in "[A-Z0-9]{1,20}",
                name in "[A-Za-z][A-Za-z0-9 ]{0,60}",
                tracking in tracking_strategy(),
                next in tracking_strategy(),
            ) {
                let company_id = CompanyId::new();
                let product_id = ProductId::generate();
                let mut product = Product::empty(product_id);
                let create = ProductCommand::CreateProduct(CreateProduct {
                    company_id,
                    product_id,
                    sku,
                    name,
                    tracking,
                    occurred_at: Utc::now(),
                });
                execute(&mut product, &create).unwrap();
                let before = product.clone();

                let change = ProductCommand::ChangeTracking(ChangeTracking {
                    company_id,
                    product_id,
                    tracking: next,
                    occurred_at: Utc::now(),
                });
                let first = product.handle(&change);
                let second = product.handle(&change);

                prop_assert_eq!(&before, &product);
                prop_assert_eq!(first, second);
            }
        }
    }
}

//! Service layer API for custody workflow operations
use super::block::{Block, BlockData};
use super::config::CustodyConfig;
use super::error::{CustodyError, Forbidden, StoreError};
use super::ledger::{ChainVerification, Ledger, SledLedgerStore};
use super::product::{HistoryRecord, Product, Role, Status, User};
use super::rules;
use super::store::{self, ProductStore, SledProductStore};
use super::utils;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::str::FromStr;
use std::sync::Arc;

/// The custody state machine. It is the only writer of product events to the ledger.
pub struct CustodyService<S: ProductStore = SledProductStore> {
    store: S,
    ledger: Arc<Ledger>,
    // held across read -> validate -> commit -> append
    write_lock: Mutex<()>,
}

/// A request to create a product, built like a draft.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub actor: String,
    pub role: Role,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// A requested status change, optionally handing the product to someone else.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub product_id: String,
    pub status: Status,
    pub actor: String,
    pub role: Role,
    pub transfer_to: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Result of an accepted create or transition. `block` is `None` when the
/// projection committed but the ledger append failed.
#[derive(Debug, Clone)]
pub struct CustodyOutcome {
    pub product: Product,
    pub block: Option<Block>,
}

#[derive(Debug, Clone)]
pub struct Deletion {
    pub product_id: String,
    pub block: Option<Block>,
}

/// Ledger events of one product alongside the verdict on the whole chain.
#[derive(Debug, Clone)]
pub struct ProductTimeline {
    pub product: Product,
    pub events: Vec<BlockData>,
    pub verification: ChainVerification,
}

/// Narrows product listings. Everything is optional, an empty filter lists all,
/// newest first, ten per page.
#[derive(Debug, Clone)]
pub struct ProductFilter {
    pub viewer: Option<(String, Role)>,
    pub status: Option<Status>,
    pub owner: Option<String>,
    pub text: Option<String>,
    /// Inclusive bounds on `created_at`.
    pub created: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub sort: ProductSort,
    pub page: usize,
    pub per_page: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    Name,
    Status,
    Owner,
    Custodian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Listing order, written `field:direction` as in `created_at:desc`. A bare field
/// sorts ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductSort {
    pub field: SortField,
    pub order: SortOrder,
}

/// One page of a listing. `total` counts every match, not just this page.
#[derive(Debug, Clone)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
}

impl NewProduct {
    pub fn new(name: impl Into<String>, actor: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            actor: actor.into(),
            role,
            latitude: None,
            longitude: None,
        }
    }
    pub fn set_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
    pub fn set_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }
}

impl TransitionRequest {
    pub fn new(
        product_id: impl Into<String>,
        status: Status,
        actor: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            status,
            actor: actor.into(),
            role,
            transfer_to: None,
            latitude: None,
            longitude: None,
        }
    }
    pub fn transfer_to(mut self, username: impl Into<String>) -> Self {
        self.transfer_to = Some(username.into());
        self
    }
    pub fn set_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }
}

impl Default for ProductSort {
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            order: SortOrder::Desc,
        }
    }
}

impl ProductSort {
    pub fn new(field: SortField, order: SortOrder) -> Self {
        Self { field, order }
    }

    pub fn compare(&self, a: &Product, b: &Product) -> Ordering {
        let ordering = match self.field {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::Name => a.name.cmp(&b.name),
            SortField::Status => a.current_status.cmp(&b.current_status),
            SortField::Owner => a.owner.cmp(&b.owner),
            SortField::Custodian => a.custodian.cmp(&b.custodian),
        };
        match self.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

impl FromStr for ProductSort {
    type Err = CustodyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, order) = s.split_once(':').unwrap_or((s, "asc"));
        let field = match field {
            "created_at" => SortField::CreatedAt,
            "name" => SortField::Name,
            "current_status" | "status" => SortField::Status,
            "owner" => SortField::Owner,
            "custodian" => SortField::Custodian,
            other => {
                return Err(CustodyError::Validation(format!(
                    "cannot sort products by '{other}'"
                )));
            }
        };
        let order = match order {
            "asc" => SortOrder::Asc,
            "desc" => SortOrder::Desc,
            other => {
                return Err(CustodyError::Validation(format!(
                    "unknown sort direction '{other}'"
                )));
            }
        };
        Ok(Self { field, order })
    }
}

impl Default for ProductFilter {
    fn default() -> Self {
        Self {
            viewer: None,
            status: None,
            owner: None,
            text: None,
            created: None,
            sort: ProductSort::default(),
            page: 1,
            per_page: 10,
        }
    }
}

impl ProductFilter {
    pub fn new() -> Self {
        Self::default()
    }
    /// Only products the viewer owns or holds, unless the viewer is an admin.
    pub fn visible_to(mut self, username: impl Into<String>, role: Role) -> Self {
        self.viewer = Some((username.into(), role));
        self
    }
    pub fn set_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }
    pub fn set_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
    /// Case insensitive match on name or description.
    pub fn matching(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
    pub fn created_between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.created = Some((from, to));
        self
    }
    pub fn sort_by(mut self, sort: ProductSort) -> Self {
        self.sort = sort;
        self
    }
    /// Pages count from 1.
    pub fn set_page(mut self, page: usize, per_page: usize) -> Self {
        self.page = page;
        self.per_page = per_page;
        self
    }

    pub fn matches(&self, product: &Product) -> bool {
        if let Some((viewer, role)) = &self.viewer {
            if *role != Role::SuperAdmin && product.owner != *viewer && product.custodian != *viewer
            {
                return false;
            }
        }
        if self.status.is_some_and(|status| status != product.current_status) {
            return false;
        }
        if self.owner.as_ref().is_some_and(|owner| *owner != product.owner) {
            return false;
        }
        if let Some((from, to)) = &self.created {
            let created_at = product.created_at.to_datetime_utc();
            if created_at < *from || created_at > *to {
                return false;
            }
        }
        if let Some(text) = &self.text {
            let needle = text.to_lowercase();
            return product.name.to_lowercase().contains(&needle)
                || product.description.to_lowercase().contains(&needle);
        }
        true
    }
}

impl CustodyService<SledProductStore> {
    /// Projection and ledger share one sled database, the ledger in its own tree.
    pub fn new(instance: Arc<sled::Db>) -> Result<Self, CustodyError> {
        let ledger = Ledger::open(SledLedgerStore::open(&instance)?)?;
        Ok(Self::with_parts(
            SledProductStore::new(instance),
            Arc::new(ledger),
        ))
    }

    pub fn open(config: &CustodyConfig) -> Result<Self, CustodyError> {
        let db = config.open_db().map_err(StoreError::from)?;
        tracing::info!(path = %config.storage.path.display(), "opened custody database");
        Self::new(Arc::new(db))
    }
}

impl<S: ProductStore> CustodyService<S> {
    pub fn with_parts(store: S, ledger: Arc<Ledger>) -> Self {
        Self {
            store,
            ledger,
            write_lock: Mutex::new(()),
        }
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Make a user known so that custody can be handed to them.
    pub fn register_user(&self, username: &str, role: Role) -> Result<User, CustodyError> {
        if username.trim().is_empty() {
            return Err(CustodyError::Validation("username is required".into()));
        }

        let _guard = self.write_lock.lock();
        if self.store.get_user(username)?.is_some() {
            return Err(CustodyError::Validation(format!(
                "username '{username}' is already registered"
            )));
        }
        let user = User::new(username, role);
        self.store.put_user(&user)?;

        Ok(user)
    }

    pub fn users_by_role(&self, role: Role) -> Result<Vec<User>, CustodyError> {
        Ok(store::users_with_role(&self.store, role)?)
    }

    /// Create a product. Restricted to manufacturers, who become owner and custodian.
    pub fn create_product(&self, new_product: NewProduct) -> Result<CustodyOutcome, CustodyError> {
        if new_product.role != Role::Manufacturer {
            return Err(Forbidden::RoleNotPermitted {
                role: new_product.role,
                action: "create products",
            }
            .into());
        }
        if new_product.name.trim().is_empty() {
            return Err(CustodyError::Validation("Product name is required".into()));
        }
        if new_product.actor.trim().is_empty() {
            return Err(CustodyError::Validation("actor is required".into()));
        }

        let _guard = self.write_lock.lock();

        let product_id = utils::new_uuid_to_bech32("prod_")?;
        let product = Product::new(
            product_id.clone(),
            new_product.name,
            new_product.description,
            new_product.actor.clone(),
        );
        let record = HistoryRecord::new(
            product_id.clone(),
            Status::Created,
            new_product.actor.clone(),
            new_product.latitude,
            new_product.longitude,
        );
        self.store.commit_product(&product, &record)?;

        tracing::info!(%product_id, owner = %product.owner, "product created");

        let block = self.append_block(BlockData::CreateProduct {
            product_id,
            owner: new_product.actor.clone(),
            initial_custodian: new_product.actor,
            location: utils::location_label(new_product.latitude, new_product.longitude),
        });

        Ok(CustodyOutcome { product, block })
    }

    /// Apply a status change. Every check runs before anything is written.
    pub fn transition(&self, request: TransitionRequest) -> Result<CustodyOutcome, CustodyError> {
        if request.product_id.trim().is_empty() || request.actor.trim().is_empty() {
            return Err(CustodyError::Validation(
                "product_id and actor are required".into(),
            ));
        }

        let _guard = self.write_lock.lock();

        let mut product = self.load_product(&request.product_id)?;
        let new_custodian = match self.validate_transition(&product, &request) {
            Ok(custodian) => custodian,
            Err(err) => {
                tracing::debug!(
                    product_id = %request.product_id,
                    actor = %request.actor,
                    status = %request.status,
                    %err,
                    "transition rejected"
                );
                return Err(err);
            }
        };

        let previous = product.current_status;
        product.custodian = new_custodian.clone();
        product.current_status = request.status;

        let record = HistoryRecord::new(
            product.product_id.clone(),
            request.status,
            request.actor.clone(),
            request.latitude,
            request.longitude,
        );
        self.store.commit_product(&product, &record)?;

        tracing::info!(
            product_id = %product.product_id,
            from = %previous,
            to = %request.status,
            custodian = %product.custodian,
            "product transitioned"
        );

        let location = utils::location_label(request.latitude, request.longitude);
        let data = if rules::is_handoff(request.status) {
            BlockData::CustodyTransfer {
                product_id: product.product_id.clone(),
                status: request.status,
                actor: request.actor,
                new_custodian,
                location,
            }
        } else {
            BlockData::StatusUpdate {
                product_id: product.product_id.clone(),
                status: request.status,
                actor: request.actor,
                new_custodian,
                location,
            }
        };
        let block = self.append_block(data);

        Ok(CustodyOutcome { product, block })
    }

    /// Returns the custodian the product will have once the transition is applied.
    fn validate_transition(
        &self,
        product: &Product,
        request: &TransitionRequest,
    ) -> Result<String, CustodyError> {
        let current = product.current_status;
        let status = request.status;

        if product.custodian != request.actor && request.role != Role::SuperAdmin {
            return Err(Forbidden::WrongCustodian {
                custodian: product.custodian.clone(),
            }
            .into());
        }
        if !rules::can_set_status(request.role, status) {
            return Err(Forbidden::RoleCannotSetStatus {
                role: request.role,
                status,
            }
            .into());
        }
        if status.index() <= current.index() {
            return Err(CustodyError::InvalidTransition {
                from: current,
                to: status,
            });
        }
        if let Some(required) = rules::required_predecessor(request.role, status) {
            if current != required {
                return Err(CustodyError::InvalidSequence { status, required });
            }
        }

        let Some(expected) = rules::handoff_role(status) else {
            return Ok(product.custodian.clone());
        };
        let target = request
            .transfer_to
            .as_deref()
            .filter(|username| !username.trim().is_empty())
            .ok_or(CustodyError::MissingTransferTarget { status })?;
        let recipient = self
            .store
            .get_user(target)?
            .ok_or_else(|| CustodyError::NotFound(format!("Recipient '{target}'")))?;
        if recipient.role != expected {
            return Err(CustodyError::RoleMismatch {
                expected,
                username: recipient.username,
                actual: recipient.role,
            });
        }

        Ok(recipient.username)
    }

    /// Remove a product from the projection. Admin only; the ledger keeps its
    /// blocks and records the deletion as one more.
    pub fn delete_product(
        &self,
        product_id: &str,
        actor: &str,
        role: Role,
    ) -> Result<Deletion, CustodyError> {
        if role != Role::SuperAdmin {
            return Err(Forbidden::RoleNotPermitted {
                role,
                action: "delete products",
            }
            .into());
        }

        let _guard = self.write_lock.lock();

        let product = self.load_product(product_id)?;
        self.store.remove_product(&product.product_id)?;

        tracing::info!(%product_id, deleted_by = %actor, "product deleted");

        let block = self.append_block(BlockData::DeleteProduct {
            product_id: product.product_id.clone(),
            deleted_by: actor.to_string(),
        });

        Ok(Deletion {
            product_id: product.product_id,
            block,
        })
    }

    // The projection has already committed when this runs. A failed append is
    // logged and reported as a missing block instead of undoing the transition.
    fn append_block(&self, data: BlockData) -> Option<Block> {
        let kind = data.kind();
        let product_id = data.product_id().map(str::to_owned);

        match self.ledger.add_block(data) {
            Ok(block) => Some(block),
            Err(err) => {
                tracing::error!(
                    kind,
                    product_id = product_id.as_deref().unwrap_or("-"),
                    %err,
                    "ledger append failed, projection update kept"
                );
                None
            }
        }
    }

    fn load_product(&self, product_id: &str) -> Result<Product, CustodyError> {
        self.store
            .get_product(product_id)?
            .ok_or_else(|| CustodyError::NotFound(format!("Product '{product_id}'")))
    }

    pub fn get_product(&self, product_id: &str) -> Result<Product, CustodyError> {
        self.load_product(product_id)
    }

    /// One page of the products passing `filter`, in the filter's sort order.
    pub fn list_products(&self, filter: &ProductFilter) -> Result<ProductPage, CustodyError> {
        if filter.page == 0 || filter.per_page == 0 {
            return Err(CustodyError::Validation(
                "page and per_page start at 1".into(),
            ));
        }

        let products = self.filtered_products(filter)?;
        let total = products.len();
        let products = products
            .into_iter()
            .skip((filter.page - 1).saturating_mul(filter.per_page))
            .take(filter.per_page)
            .collect();

        Ok(ProductPage {
            products,
            page: filter.page,
            per_page: filter.per_page,
            total,
        })
    }

    /// Every product matching `query`, unpaged.
    pub fn search_products(
        &self,
        query: &str,
        filter: ProductFilter,
    ) -> Result<Vec<Product>, CustodyError> {
        self.filtered_products(&filter.matching(query))
    }

    fn filtered_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, CustodyError> {
        let mut products: Vec<Product> = self
            .store
            .list_products()?
            .into_iter()
            .filter(|product| filter.matches(product))
            .collect();
        products.sort_by(|a, b| filter.sort.compare(a, b));

        Ok(products)
    }

    /// Audit trail kept in the projection, oldest first.
    pub fn product_history(&self, product_id: &str) -> Result<Vec<HistoryRecord>, CustodyError> {
        let history = self.store.query_history(product_id)?;
        if history.is_empty() {
            return Err(CustodyError::NotFound(format!(
                "History for product '{product_id}'"
            )));
        }
        Ok(history)
    }

    /// The product's events as recorded in the ledger, with the chain verdict.
    pub fn product_timeline(&self, product_id: &str) -> Result<ProductTimeline, CustodyError> {
        let product = self.load_product(product_id)?;
        let events = self
            .ledger
            .blocks_for_product(product_id)
            .map(|block| block.data)
            .collect();

        Ok(ProductTimeline {
            product,
            events,
            verification: self.ledger.verify_chain(),
        })
    }

    pub fn chain(&self) -> Vec<Block> {
        self.ledger.chain()
    }

    pub fn chain_for_product(&self, product_id: &str) -> Vec<Block> {
        self.ledger.blocks_for_product(product_id).collect()
    }

    pub fn verify_chain(&self) -> ChainVerification {
        self.ledger.verify_chain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> CustodyService {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let service = CustodyService::new(Arc::new(db)).unwrap();
        service.register_user("alice", Role::Manufacturer).unwrap();
        service.register_user("bob", Role::Distributor).unwrap();
        service.register_user("dan", Role::Retailer).unwrap();
        service
    }

    fn created(service: &CustodyService) -> Product {
        service
            .create_product(NewProduct::new("Espresso machine", "alice", Role::Manufacturer))
            .unwrap()
            .product
    }

    #[test]
    fn open_from_config_starts_with_genesis() {
        let service = CustodyService::open(&CustodyConfig::temporary()).unwrap();

        assert_eq!(service.ledger().len(), 1);
        assert_eq!(service.verify_chain().message, "Blockchain is valid");
    }

    #[test]
    fn create_requires_manufacturer() {
        let service = service();

        let err = service
            .create_product(NewProduct::new("Kettle", "bob", Role::Distributor))
            .unwrap_err();

        assert!(matches!(
            err,
            CustodyError::Forbidden(Forbidden::RoleNotPermitted { .. })
        ));
        assert_eq!(service.chain().len(), 1);
    }

    #[test]
    fn create_requires_a_name() {
        let service = service();

        let err = service
            .create_product(NewProduct::new("  ", "alice", Role::Manufacturer))
            .unwrap_err();

        assert!(matches!(err, CustodyError::Validation(_)));
    }

    #[test]
    fn unknown_product_is_not_found() {
        let service = service();

        let err = service
            .transition(TransitionRequest::new(
                "prod_1missing",
                Status::Shipped,
                "bob",
                Role::Distributor,
            ))
            .unwrap_err();

        assert!(matches!(err, CustodyError::NotFound(_)));
    }

    #[test]
    fn role_cannot_set_foreign_status() {
        let service = service();
        let product = created(&service);

        let err = service
            .transition(TransitionRequest::new(
                &product.product_id,
                Status::Sold,
                "alice",
                Role::Manufacturer,
            ))
            .unwrap_err();

        assert!(matches!(
            err,
            CustodyError::Forbidden(Forbidden::RoleCannotSetStatus {
                role: Role::Manufacturer,
                status: Status::Sold,
            })
        ));
    }

    #[test]
    fn handoff_target_must_exist() {
        let service = service();
        let product = created(&service);

        let err = service
            .transition(
                TransitionRequest::new(
                    &product.product_id,
                    Status::ReadyForShipping,
                    "alice",
                    Role::Manufacturer,
                )
                .transfer_to("nobody"),
            )
            .unwrap_err();

        assert!(matches!(err, CustodyError::NotFound(_)));
        assert_eq!(
            service.get_product(&product.product_id).unwrap().custodian,
            "alice"
        );
    }

    #[test]
    fn admin_can_recall_without_custody() {
        let service = service();
        let product = created(&service);

        let outcome = service
            .transition(TransitionRequest::new(
                &product.product_id,
                Status::Recalled,
                "root",
                Role::SuperAdmin,
            ))
            .unwrap();

        assert_eq!(outcome.product.current_status, Status::Recalled);
        assert_eq!(outcome.product.custodian, "alice");
        assert_eq!(outcome.block.unwrap().data.kind(), "status_update");
    }

    #[test]
    fn filter_limits_listing_to_viewer() {
        let service = service();
        let product = created(&service);
        service
            .create_product(
                NewProduct::new("Grinder", "alice", Role::Manufacturer)
                    .set_description("Burr grinder"),
            )
            .unwrap();

        let for_bob = service
            .list_products(&ProductFilter::new().visible_to("bob", Role::Distributor))
            .unwrap();
        let for_admin = service
            .list_products(&ProductFilter::new().visible_to("root", Role::SuperAdmin))
            .unwrap();
        let found = service
            .search_products("BURR", ProductFilter::new())
            .unwrap();

        assert_eq!(for_bob.total, 0);
        assert!(for_bob.products.is_empty());
        assert_eq!(for_admin.total, 2);
        assert_eq!(found.len(), 1);
        assert_ne!(found[0].product_id, product.product_id);
    }

    #[test]
    fn listing_is_paged_newest_first() {
        let service = service();
        let ids: Vec<String> = ["Kettle", "Grinder", "Scale"]
            .into_iter()
            .map(|name| {
                let product = service
                    .create_product(NewProduct::new(name, "alice", Role::Manufacturer))
                    .unwrap()
                    .product;
                std::thread::sleep(std::time::Duration::from_millis(2));
                product.product_id
            })
            .collect();

        let first = service
            .list_products(&ProductFilter::new().set_page(1, 2))
            .unwrap();
        let second = service
            .list_products(&ProductFilter::new().set_page(2, 2))
            .unwrap();
        let past_end = service
            .list_products(&ProductFilter::new().set_page(3, 2))
            .unwrap();

        assert_eq!((first.page, first.per_page, first.total), (1, 2, 3));
        let first_ids: Vec<&str> = first.products.iter().map(|p| p.product_id.as_str()).collect();
        assert_eq!(first_ids, vec![ids[2].as_str(), ids[1].as_str()]);
        assert_eq!(second.products.len(), 1);
        assert_eq!(second.products[0].product_id, ids[0]);
        assert_eq!(past_end.total, 3);
        assert!(past_end.products.is_empty());
        assert!(matches!(
            service.list_products(&ProductFilter::new().set_page(0, 10)),
            Err(CustodyError::Validation(_))
        ));
    }

    #[test]
    fn listing_sorts_by_requested_field() {
        let service = service();
        for name in ["Scale", "Grinder", "Kettle"] {
            service
                .create_product(NewProduct::new(name, "alice", Role::Manufacturer))
                .unwrap();
        }

        let by_name = service
            .list_products(&ProductFilter::new().sort_by("name:asc".parse().unwrap()))
            .unwrap();
        let names: Vec<&str> = by_name.products.iter().map(|p| p.name.as_str()).collect();

        assert_eq!(names, vec!["Grinder", "Kettle", "Scale"]);
        assert_eq!(
            "name".parse::<ProductSort>().unwrap(),
            ProductSort::new(SortField::Name, SortOrder::Asc)
        );
        assert_eq!(
            "created_at:desc".parse::<ProductSort>().unwrap(),
            ProductSort::default()
        );
        assert!("weight:asc".parse::<ProductSort>().is_err());
        assert!("name:sideways".parse::<ProductSort>().is_err());
    }

    #[test]
    fn listing_filters_by_creation_window() {
        let service = service();
        let product = created(&service);
        let created_at = product.created_at.to_datetime_utc();
        let minute = chrono::Duration::minutes(1);

        let inside = service
            .list_products(
                &ProductFilter::new().created_between(created_at - minute, created_at + minute),
            )
            .unwrap();
        let exact = service
            .list_products(&ProductFilter::new().created_between(created_at, created_at))
            .unwrap();
        let before = service
            .list_products(
                &ProductFilter::new()
                    .created_between(created_at - minute * 2, created_at - minute),
            )
            .unwrap();

        assert_eq!(inside.total, 1);
        assert_eq!(exact.total, 1);
        assert_eq!(before.total, 0);
    }

    #[test]
    fn duplicate_users_are_rejected() {
        let service = service();

        let err = service.register_user("bob", Role::Retailer).unwrap_err();

        assert!(matches!(err, CustodyError::Validation(_)));
        assert_eq!(service.users_by_role(Role::Distributor).unwrap().len(), 1);
    }
}

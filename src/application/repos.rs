//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::application::pagination::{PageRequest, PaginatedResult};
use crate::domain::entities::{CategoryRecord, ProductRecord};
use crate::domain::money::Money;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Optional predicates for product listings. A `None` field never restricts
/// the result set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductQueryFilter {
    pub category: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct CreateProductParams {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock_quantity: u32,
    pub category: String,
    pub sku: String,
}

#[derive(Debug, Clone)]
pub struct UpdateProductParams {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Money,
    /// `None` leaves the stored quantity untouched.
    pub stock_quantity: Option<u32>,
    pub category: String,
    pub sku: String,
    pub is_active: bool,
}

#[async_trait]
pub trait ProductsRepo: Send + Sync {
    async fn find_product(&self, id: Uuid) -> Result<Option<ProductRecord>, RepoError>;

    /// Newest first, ties broken by id descending.
    async fn page_products(
        &self,
        filter: &ProductQueryFilter,
        page: PageRequest,
    ) -> Result<PaginatedResult<ProductRecord>, RepoError>;

    /// Whether `sku` belongs to a product other than `exclude`.
    async fn sku_exists(&self, sku: &str, exclude: Option<Uuid>) -> Result<bool, RepoError>;

    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, RepoError>;
}

#[async_trait]
pub trait ProductsWriteRepo: Send + Sync {
    async fn create_product(&self, params: CreateProductParams)
    -> Result<ProductRecord, RepoError>;

    async fn update_product(&self, params: UpdateProductParams)
    -> Result<ProductRecord, RepoError>;

    /// Marks the product inactive. Returns `RepoError::NotFound` when absent.
    async fn deactivate_product(&self, id: Uuid) -> Result<ProductRecord, RepoError>;
}

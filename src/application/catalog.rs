//! Product catalog service: validated commands, cached reads and
//! post-write invalidation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::application::pagination::{PageRequest, PaginatedResult, PaginationError};
use crate::application::repos::{
    CreateProductParams, ProductQueryFilter, ProductsRepo, ProductsWriteRepo, RepoError,
    UpdateProductParams,
};
use crate::cache::{CacheClient, CacheConfig, CacheInvalidator, CacheKeys, CacheStore, Canceled};
use crate::domain::entities::{CategoryRecord, ProductRecord};
use crate::domain::error::DomainError;
use crate::domain::money::Money;

pub const MAX_NAME_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 1000;
pub const MAX_CATEGORY_LEN: usize = 100;
pub const MAX_SKU_LEN: usize = 50;
/// Prices are stored as `NUMERIC(18,2)`.
pub const MAX_PRICE_SCALE: u32 = 2;
pub const MAX_PRICE_INTEGER_DIGITS: u32 = 16;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid `{field}`: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    #[error("product `{0}` not found")]
    NotFound(Uuid),
    #[error("a product with SKU `{sku}` already exists")]
    Conflict { sku: String },
    #[error("catalog storage unavailable")]
    Unavailable(#[source] RepoError),
    #[error("catalog data is inconsistent")]
    Internal(#[source] DomainError),
    #[error("operation canceled")]
    Canceled,
}

impl CatalogError {
    fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Transient storage failures that a client may retry as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(RepoError::Timeout | RepoError::Persistence(_))
        )
    }

    fn from_repo(err: RepoError, id: Option<Uuid>, sku: Option<&str>) -> Self {
        match err {
            RepoError::NotFound => match id {
                Some(id) => Self::NotFound(id),
                None => Self::Unavailable(RepoError::NotFound),
            },
            RepoError::Duplicate { constraint } => match sku {
                Some(sku) => Self::Conflict {
                    sku: sku.to_string(),
                },
                None => Self::Unavailable(RepoError::Duplicate { constraint }),
            },
            RepoError::InvalidInput { message } => Self::validation("request", message),
            other => Self::Unavailable(other),
        }
    }
}

impl From<Canceled> for CatalogError {
    fn from(_: Canceled) -> Self {
        Self::Canceled
    }
}

impl From<DomainError> for CatalogError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation { field, message } => Self::Validation { field, message },
            invariant @ DomainError::Invariant { .. } => Self::Internal(invariant),
        }
    }
}

impl From<PaginationError> for CatalogError {
    fn from(err: PaginationError) -> Self {
        match err {
            PaginationError::InvalidPageNumber(_) => Self::validation("page", err.to_string()),
            PaginationError::InvalidPageSize(_) => Self::validation("page_size", err.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateProductCommand {
    pub name: String,
    pub description: String,
    pub price_amount: Decimal,
    pub price_currency: String,
    pub stock_quantity: i64,
    pub category: String,
    pub sku: String,
}

#[derive(Debug, Clone)]
pub struct UpdateProductCommand {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price_amount: Decimal,
    pub price_currency: String,
    /// `None` keeps the current quantity.
    pub stock_quantity: Option<i64>,
    pub category: String,
    pub sku: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ListProductsQuery {
    pub category: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub is_active: Option<bool>,
    pub page_number: u32,
    pub page_size: u32,
}

#[derive(Clone)]
pub struct CatalogService {
    reader: Arc<dyn ProductsRepo>,
    writer: Arc<dyn ProductsWriteRepo>,
    cache: CacheClient,
    keys: CacheKeys,
    invalidator: CacheInvalidator,
    product_ttl: Duration,
    list_ttl: Duration,
}

impl CatalogService {
    pub fn new(
        reader: Arc<dyn ProductsRepo>,
        writer: Arc<dyn ProductsWriteRepo>,
        store: Arc<dyn CacheStore>,
        config: &CacheConfig,
    ) -> Self {
        let keys = CacheKeys::new(config.key_prefix.clone());
        let cache = CacheClient::new(store).with_generation_key(keys.generation());
        let invalidator = CacheInvalidator::new(cache.clone(), keys.clone());
        Self {
            reader,
            writer,
            cache,
            keys,
            invalidator,
            product_ttl: config.product_ttl,
            list_ttl: config.list_ttl,
        }
    }

    #[instrument(skip(self, cancel))]
    pub async fn get_product(
        &self,
        id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<ProductRecord, CatalogError> {
        let key = self.keys.product(id);
        let found: Option<ProductRecord> = self
            .cache
            .get_or_load(&key, self.product_ttl, cancel, || async {
                self.reader
                    .find_product(id)
                    .await
                    .map_err(|err| CatalogError::from_repo(err, Some(id), None))
            })
            .await?;
        found.ok_or(CatalogError::NotFound(id))
    }

    #[instrument(skip(self, cancel))]
    pub async fn list_products(
        &self,
        query: ListProductsQuery,
        cancel: &CancellationToken,
    ) -> Result<PaginatedResult<ProductRecord>, CatalogError> {
        let page = PageRequest::new(query.page_number, query.page_size)?;
        let filter = normalize_filter(query)?;
        let key = self.keys.product_list(&filter, page);

        self.cache
            .get_or_load(&key, self.list_ttl, cancel, || async {
                self.reader
                    .page_products(&filter, page)
                    .await
                    .map_err(|err| CatalogError::from_repo(err, None, None))
            })
            .await
    }

    pub async fn list_categories(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<CategoryRecord>, CatalogError> {
        until_canceled(cancel, async {
            self.reader
                .list_categories()
                .await
                .map_err(|err| CatalogError::from_repo(err, None, None))
        })
        .await
    }

    /// Creates a product. Cancellation is honored up to the point the write is
    /// issued; after that the write and its invalidation run to completion.
    #[instrument(skip(self, command, cancel), fields(sku = %command.sku))]
    pub async fn create_product(
        &self,
        command: CreateProductCommand,
        cancel: &CancellationToken,
    ) -> Result<ProductRecord, CatalogError> {
        let params = validate_create(command)?;

        let taken = until_canceled(cancel, async {
            self.reader
                .sku_exists(&params.sku, None)
                .await
                .map_err(|err| CatalogError::from_repo(err, None, None))
        })
        .await?;
        if taken {
            return Err(CatalogError::Conflict { sku: params.sku });
        }
        if cancel.is_cancelled() {
            return Err(CatalogError::Canceled);
        }

        let sku = params.sku.clone();
        let product = self
            .writer
            .create_product(params)
            .await
            .map_err(|err| CatalogError::from_repo(err, None, Some(&sku)))?;

        self.invalidator.product_changed(product.id).await;
        info!(product_id = %product.id, sku = %product.sku, "Product created");
        Ok(product)
    }

    #[instrument(skip(self, command, cancel), fields(product_id = %command.id))]
    pub async fn update_product(
        &self,
        command: UpdateProductCommand,
        cancel: &CancellationToken,
    ) -> Result<ProductRecord, CatalogError> {
        let params = validate_update(command)?;
        let id = params.id;

        let existing = until_canceled(cancel, async {
            self.reader
                .find_product(id)
                .await
                .map_err(|err| CatalogError::from_repo(err, Some(id), None))
        })
        .await?
        .ok_or(CatalogError::NotFound(id))?;

        if existing.sku != params.sku {
            let taken = until_canceled(cancel, async {
                self.reader
                    .sku_exists(&params.sku, Some(id))
                    .await
                    .map_err(|err| CatalogError::from_repo(err, Some(id), None))
            })
            .await?;
            if taken {
                return Err(CatalogError::Conflict { sku: params.sku });
            }
        }
        if cancel.is_cancelled() {
            return Err(CatalogError::Canceled);
        }

        let sku = params.sku.clone();
        let product = self
            .writer
            .update_product(params)
            .await
            .map_err(|err| CatalogError::from_repo(err, Some(id), Some(&sku)))?;

        self.invalidator.product_changed(id).await;
        info!(product_id = %id, "Product updated");
        Ok(product)
    }

    /// Soft delete: the product is deactivated and stays readable by id.
    #[instrument(skip(self, cancel))]
    pub async fn delete_product(
        &self,
        id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<ProductRecord, CatalogError> {
        if cancel.is_cancelled() {
            return Err(CatalogError::Canceled);
        }

        let product = self
            .writer
            .deactivate_product(id)
            .await
            .map_err(|err| CatalogError::from_repo(err, Some(id), None))?;

        self.invalidator.product_changed(id).await;
        info!(product_id = %id, "Product deactivated");
        Ok(product)
    }
}

async fn until_canceled<T>(
    cancel: &CancellationToken,
    op: impl Future<Output = Result<T, CatalogError>>,
) -> Result<T, CatalogError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CatalogError::Canceled),
        result = op => result,
    }
}

fn normalize_filter(query: ListProductsQuery) -> Result<ProductQueryFilter, CatalogError> {
    let category = query
        .category
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    if let (Some(min), Some(max)) = (query.min_price, query.max_price) {
        if min > max {
            return Err(CatalogError::validation(
                "min_price",
                "minimum price cannot exceed maximum price",
            ));
        }
    }

    Ok(ProductQueryFilter {
        category,
        min_price: query.min_price,
        max_price: query.max_price,
        active: query.is_active,
    })
}

fn validate_create(command: CreateProductCommand) -> Result<CreateProductParams, CatalogError> {
    let CreateProductCommand {
        name,
        description,
        price_amount,
        price_currency,
        stock_quantity,
        category,
        sku,
    } = command;

    Ok(CreateProductParams {
        name: required_text(&name, "name", MAX_NAME_LEN)?,
        description: optional_text(&description, "description", MAX_DESCRIPTION_LEN)?,
        price: price(price_amount, &price_currency)?,
        stock_quantity: stock(stock_quantity)?,
        category: required_text(&category, "category", MAX_CATEGORY_LEN)?,
        sku: required_text(&sku, "sku", MAX_SKU_LEN)?,
    })
}

fn validate_update(command: UpdateProductCommand) -> Result<UpdateProductParams, CatalogError> {
    let UpdateProductCommand {
        id,
        name,
        description,
        price_amount,
        price_currency,
        stock_quantity,
        category,
        sku,
        is_active,
    } = command;

    Ok(UpdateProductParams {
        id,
        name: required_text(&name, "name", MAX_NAME_LEN)?,
        description: optional_text(&description, "description", MAX_DESCRIPTION_LEN)?,
        price: price(price_amount, &price_currency)?,
        stock_quantity: stock_quantity.map(stock).transpose()?,
        category: required_text(&category, "category", MAX_CATEGORY_LEN)?,
        sku: required_text(&sku, "sku", MAX_SKU_LEN)?,
        is_active,
    })
}

fn price(amount: Decimal, currency: &str) -> Result<Money, CatalogError> {
    if amount.normalize().scale() > MAX_PRICE_SCALE {
        return Err(CatalogError::validation(
            "price_amount",
            format!("amount cannot have more than {MAX_PRICE_SCALE} decimal places"),
        ));
    }
    if amount.abs() >= Decimal::from(10_u64.pow(MAX_PRICE_INTEGER_DIGITS)) {
        return Err(CatalogError::validation(
            "price_amount",
            format!("amount must have at most {MAX_PRICE_INTEGER_DIGITS} integer digits"),
        ));
    }
    Ok(Money::new(amount, currency)?)
}

fn required_text(value: &str, field: &'static str, max: usize) -> Result<String, CatalogError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::validation(field, "must not be empty"));
    }
    optional_text(trimmed, field, max)
}

fn optional_text(value: &str, field: &'static str, max: usize) -> Result<String, CatalogError> {
    let trimmed = value.trim();
    if trimmed.chars().count() > max {
        return Err(CatalogError::validation(
            field,
            format!("must be at most {max} characters"),
        ));
    }
    Ok(trimmed.to_string())
}

fn stock(value: i64) -> Result<u32, CatalogError> {
    if value < 0 {
        return Err(CatalogError::validation(
            "stock_quantity",
            "stock quantity cannot be negative",
        ));
    }
    i32::try_from(value)
        .ok()
        .and_then(|value| u32::try_from(value).ok())
        .ok_or_else(|| {
            CatalogError::validation("stock_quantity", "stock quantity is too large")
        })
}

//! In-memory repositories and cache stores shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use catalog::application::catalog::CatalogService;
use catalog::application::pagination::{PageRequest, PaginatedResult};
use catalog::application::repos::{
    CreateProductParams, ProductQueryFilter, ProductsRepo, ProductsWriteRepo, RepoError,
    UpdateProductParams,
};
use catalog::cache::{CacheConfig, CacheError, CacheStore};
use catalog::domain::entities::{CategoryRecord, ProductRecord};

#[derive(Default)]
pub struct InMemoryCatalog {
    products: Mutex<Vec<ProductRecord>>,
    categories: Mutex<Vec<CategoryRecord>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl InMemoryCatalog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of product reads that reached the repository.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn product_count(&self) -> usize {
        self.products.lock().await.len()
    }

    async fn ensure_category(&self, name: &str) {
        let mut categories = self.categories.lock().await;
        if categories.iter().all(|category| category.name != name) {
            let now = OffsetDateTime::now_utc();
            categories.push(CategoryRecord {
                id: Uuid::new_v4(),
                name: name.to_string(),
                description: String::new(),
                created_at: now,
                updated_at: now,
            });
        }
    }
}

fn matches(filter: &ProductQueryFilter, product: &ProductRecord) -> bool {
    filter
        .category
        .as_ref()
        .is_none_or(|category| &product.category == category)
        && filter
            .min_price
            .is_none_or(|min| product.price.amount() >= min)
        && filter
            .max_price
            .is_none_or(|max| product.price.amount() <= max)
        && filter.active.is_none_or(|active| product.is_active == active)
}

#[async_trait]
impl ProductsRepo for InMemoryCatalog {
    async fn find_product(&self, id: Uuid) -> Result<Option<ProductRecord>, RepoError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let products = self.products.lock().await;
        Ok(products.iter().find(|product| product.id == id).cloned())
    }

    async fn page_products(
        &self,
        filter: &ProductQueryFilter,
        page: PageRequest,
    ) -> Result<PaginatedResult<ProductRecord>, RepoError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let products = self.products.lock().await;
        // Insertion order is creation order; newest first.
        let matching: Vec<ProductRecord> = products
            .iter()
            .rev()
            .filter(|product| matches(filter, product))
            .cloned()
            .collect();
        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();
        Ok(PaginatedResult::new(items, total, page))
    }

    async fn sku_exists(&self, sku: &str, exclude: Option<Uuid>) -> Result<bool, RepoError> {
        let products = self.products.lock().await;
        Ok(products
            .iter()
            .any(|product| product.sku == sku && Some(product.id) != exclude))
    }

    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, RepoError> {
        let mut categories = self.categories.lock().await.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }
}

#[async_trait]
impl ProductsWriteRepo for InMemoryCatalog {
    async fn create_product(
        &self,
        params: CreateProductParams,
    ) -> Result<ProductRecord, RepoError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.ensure_category(&params.category).await;
        let mut products = self.products.lock().await;
        if products.iter().any(|product| product.sku == params.sku) {
            return Err(RepoError::Duplicate {
                constraint: "products_sku_key".to_string(),
            });
        }
        let record = ProductRecord {
            id: Uuid::new_v4(),
            name: params.name,
            description: params.description,
            price: params.price,
            stock_quantity: params.stock_quantity,
            category: params.category,
            sku: params.sku,
            is_active: true,
            created_at: OffsetDateTime::now_utc(),
            updated_at: None,
        };
        products.push(record.clone());
        Ok(record)
    }

    async fn update_product(
        &self,
        params: UpdateProductParams,
    ) -> Result<ProductRecord, RepoError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.ensure_category(&params.category).await;
        let mut products = self.products.lock().await;
        let product = products
            .iter_mut()
            .find(|product| product.id == params.id)
            .ok_or(RepoError::NotFound)?;
        product.name = params.name;
        product.description = params.description;
        product.price = params.price;
        if let Some(stock) = params.stock_quantity {
            product.stock_quantity = stock;
        }
        product.category = params.category;
        product.sku = params.sku;
        product.is_active = params.is_active;
        product.updated_at = Some(OffsetDateTime::now_utc());
        Ok(product.clone())
    }

    async fn deactivate_product(&self, id: Uuid) -> Result<ProductRecord, RepoError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut products = self.products.lock().await;
        let product = products
            .iter_mut()
            .find(|product| product.id == id)
            .ok_or(RepoError::NotFound)?;
        product.is_active = false;
        product.updated_at = Some(OffsetDateTime::now_utc());
        Ok(product.clone())
    }
}

/// Store whose every operation fails, standing in for an unreachable backend.
pub struct FailingStore;

#[async_trait]
impl CacheStore for FailingStore {
    fn backend(&self) -> &'static str {
        "failing"
    }

    async fn get(&self, _key: &str) -> Result<Option<Bytes>, CacheError> {
        Err(CacheError::backend("failing", "connection refused"))
    }

    async fn set(&self, _key: &str, _value: Bytes, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::backend("failing", "connection refused"))
    }

    async fn remove(&self, _key: &str) -> Result<(), CacheError> {
        Err(CacheError::backend("failing", "connection refused"))
    }

    async fn remove_prefix(&self, _prefix: &str) -> Result<u64, CacheError> {
        Err(CacheError::backend("failing", "connection refused"))
    }

    async fn exists(&self, _key: &str) -> Result<bool, CacheError> {
        Err(CacheError::backend("failing", "connection refused"))
    }

    async fn generation(&self, _counter: &str) -> Result<u64, CacheError> {
        Err(CacheError::backend("failing", "connection refused"))
    }

    async fn bump_generation(&self, _counter: &str) -> Result<u64, CacheError> {
        Err(CacheError::backend("failing", "connection refused"))
    }

    async fn set_if_generation(
        &self,
        _key: &str,
        _value: Bytes,
        _ttl: Duration,
        _counter: &str,
        _expected: u64,
    ) -> Result<bool, CacheError> {
        Err(CacheError::backend("failing", "connection refused"))
    }
}

/// Reader that can hold one `find_product` call after it has read its row,
/// so a test can commit a write while that read is still in flight.
pub struct GatedReader {
    inner: Arc<InMemoryCatalog>,
    armed: AtomicBool,
    loaded: Notify,
    release: Notify,
}

impl GatedReader {
    pub fn new(inner: Arc<InMemoryCatalog>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            armed: AtomicBool::new(false),
            loaded: Notify::new(),
            release: Notify::new(),
        })
    }

    /// Holds the next `find_product` call until [`GatedReader::release`].
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Resolves once the held call has read its row.
    pub async fn loaded(&self) {
        self.loaded.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl ProductsRepo for GatedReader {
    async fn find_product(&self, id: Uuid) -> Result<Option<ProductRecord>, RepoError> {
        let found = self.inner.find_product(id).await?;
        if self.armed.swap(false, Ordering::SeqCst) {
            self.loaded.notify_one();
            self.release.notified().await;
        }
        Ok(found)
    }

    async fn page_products(
        &self,
        filter: &ProductQueryFilter,
        page: PageRequest,
    ) -> Result<PaginatedResult<ProductRecord>, RepoError> {
        self.inner.page_products(filter, page).await
    }

    async fn sku_exists(&self, sku: &str, exclude: Option<Uuid>) -> Result<bool, RepoError> {
        self.inner.sku_exists(sku, exclude).await
    }

    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, RepoError> {
        self.inner.list_categories().await
    }
}

pub fn service(repo: &Arc<InMemoryCatalog>, store: Arc<dyn CacheStore>) -> CatalogService {
    let reader: Arc<dyn ProductsRepo> = repo.clone();
    let writer: Arc<dyn ProductsWriteRepo> = repo.clone();
    CatalogService::new(reader, writer, store, &CacheConfig::default())
}

pub fn gated_service(
    reader: &Arc<GatedReader>,
    repo: &Arc<InMemoryCatalog>,
    store: Arc<dyn CacheStore>,
) -> CatalogService {
    let reader: Arc<dyn ProductsRepo> = reader.clone();
    let writer: Arc<dyn ProductsWriteRepo> = repo.clone();
    CatalogService::new(reader, writer, store, &CacheConfig::default())
}

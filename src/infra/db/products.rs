use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::pagination::{PageRequest, PaginatedResult},
    application::repos::{
        CreateProductParams, ProductQueryFilter, ProductsRepo, ProductsWriteRepo, RepoError,
        UpdateProductParams,
    },
    domain::entities::{CategoryRecord, ProductRecord, stock_from_db, stock_to_db},
    domain::error::DomainError,
    domain::money::Money,
};

use super::{PostgresRepositories, map_sqlx_error};

const PRODUCT_FROM: &str = " FROM products p INNER JOIN categories c ON c.id = p.category_id";

const PRODUCT_COLUMNS: &str = "SELECT p.id, p.name, p.description, p.price_amount, \
    p.price_currency, p.stock_quantity, c.name AS category, p.sku, p.is_active, \
    p.created_at, p.updated_at";

const PRODUCT_BY_ID: &str = "SELECT p.id, p.name, p.description, p.price_amount, \
    p.price_currency, p.stock_quantity, c.name AS category, p.sku, p.is_active, \
    p.created_at, p.updated_at \
    FROM products p INNER JOIN categories c ON c.id = p.category_id \
    WHERE p.id = $1";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    description: String,
    price_amount: Decimal,
    price_currency: String,
    stock_quantity: i32,
    category: String,
    sku: String,
    is_active: bool,
    created_at: OffsetDateTime,
    updated_at: Option<OffsetDateTime>,
}

impl TryFrom<ProductRow> for ProductRecord {
    type Error = RepoError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price: Money::new(row.price_amount, &row.price_currency).map_err(integrity)?,
            stock_quantity: stock_from_db(row.stock_quantity).map_err(integrity)?,
            category: row.category,
            sku: row.sku,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    description: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<CategoryRow> for CategoryRecord {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn integrity(err: DomainError) -> RepoError {
    RepoError::Integrity {
        message: err.to_string(),
    }
}

fn stock_param(value: u32) -> Result<i32, RepoError> {
    stock_to_db(value).map_err(|err| RepoError::InvalidInput {
        message: err.to_string(),
    })
}

impl PostgresRepositories {
    fn apply_product_filter<'q>(
        qb: &mut QueryBuilder<'q, Postgres>,
        filter: &'q ProductQueryFilter,
    ) {
        qb.push(" WHERE TRUE");

        if let Some(category) = filter.category.as_ref() {
            qb.push(" AND c.name = ");
            qb.push_bind(category);
        }
        if let Some(min) = filter.min_price {
            qb.push(" AND p.price_amount >= ");
            qb.push_bind(min);
        }
        if let Some(max) = filter.max_price {
            qb.push(" AND p.price_amount <= ");
            qb.push_bind(max);
        }
        if let Some(active) = filter.active {
            qb.push(" AND p.is_active = ");
            qb.push_bind(active);
        }
    }

    async fn product_in(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<ProductRecord>, RepoError> {
        let row = sqlx::query_as::<_, ProductRow>(PRODUCT_BY_ID)
            .bind(id)
            .fetch_optional(conn)
            .await
            .map_err(map_sqlx_error)?;

        row.map(ProductRecord::try_from).transpose()
    }

    /// Resolves a category id by name, creating the category when missing.
    async fn ensure_category(conn: &mut PgConnection, name: &str) -> Result<Uuid, RepoError> {
        sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO categories (id, name, description, created_at, updated_at) \
             VALUES ($1, $2, '', now(), now()) \
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
             RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_one(conn)
        .await
        .map_err(map_sqlx_error)
    }
}

#[async_trait]
impl ProductsRepo for PostgresRepositories {
    async fn find_product(&self, id: Uuid) -> Result<Option<ProductRecord>, RepoError> {
        let row = sqlx::query_as::<_, ProductRow>(PRODUCT_BY_ID)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(ProductRecord::try_from).transpose()
    }

    async fn page_products(
        &self,
        filter: &ProductQueryFilter,
        page: PageRequest,
    ) -> Result<PaginatedResult<ProductRecord>, RepoError> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*)");
        count_qb.push(PRODUCT_FROM);
        Self::apply_product_filter(&mut count_qb, filter);

        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        let total_count = Self::convert_count(total)?;

        if total_count <= page.offset() {
            return Ok(PaginatedResult::new(Vec::new(), total_count, page));
        }

        let limit = i64::try_from(page.limit())
            .map_err(|_| RepoError::from_persistence("page size exceeds supported range"))?;
        let offset = i64::try_from(page.offset())
            .map_err(|_| RepoError::from_persistence("page offset exceeds supported range"))?;

        let mut data_qb = QueryBuilder::new(PRODUCT_COLUMNS);
        data_qb.push(PRODUCT_FROM);
        Self::apply_product_filter(&mut data_qb, filter);
        data_qb.push(" ORDER BY p.created_at DESC, p.id DESC LIMIT ");
        data_qb.push_bind(limit);
        data_qb.push(" OFFSET ");
        data_qb.push_bind(offset);

        let rows = data_qb
            .build_query_as::<ProductRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let items = rows
            .into_iter()
            .map(ProductRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PaginatedResult::new(items, total_count, page))
    }

    async fn sku_exists(&self, sku: &str, exclude: Option<Uuid>) -> Result<bool, RepoError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS ( \
                SELECT 1 FROM products \
                WHERE sku = $1 AND ($2::uuid IS NULL OR id <> $2) \
             )",
        )
        .bind(sku)
        .bind(exclude)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, RepoError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, description, created_at, updated_at \
             FROM categories \
             ORDER BY name",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CategoryRecord::from).collect())
    }
}

#[async_trait]
impl ProductsWriteRepo for PostgresRepositories {
    async fn create_product(
        &self,
        params: CreateProductParams,
    ) -> Result<ProductRecord, RepoError> {
        let stock = stock_param(params.stock_quantity)?;
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let category_id = Self::ensure_category(&mut tx, &params.category).await?;

        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO products \
                (id, name, description, price_amount, price_currency, stock_quantity, \
                 category_id, sku, is_active, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE, now())",
        )
        .bind(id)
        .bind(&params.name)
        .bind(&params.description)
        .bind(params.price.amount())
        .bind(params.price.currency())
        .bind(stock)
        .bind(category_id)
        .bind(&params.sku)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let product = Self::product_in(&mut tx, id)
            .await?
            .ok_or_else(|| RepoError::from_persistence("inserted product was not readable"))?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(product)
    }

    async fn update_product(
        &self,
        params: UpdateProductParams,
    ) -> Result<ProductRecord, RepoError> {
        let stock = params.stock_quantity.map(stock_param).transpose()?;
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let category_id = Self::ensure_category(&mut tx, &params.category).await?;

        let result = sqlx::query(
            "UPDATE products SET \
                name = $2, \
                description = $3, \
                price_amount = $4, \
                price_currency = $5, \
                stock_quantity = COALESCE($6, stock_quantity), \
                category_id = $7, \
                sku = $8, \
                is_active = $9, \
                updated_at = now() \
             WHERE id = $1",
        )
        .bind(params.id)
        .bind(&params.name)
        .bind(&params.description)
        .bind(params.price.amount())
        .bind(params.price.currency())
        .bind(stock)
        .bind(category_id)
        .bind(&params.sku)
        .bind(params.is_active)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        let product = Self::product_in(&mut tx, params.id)
            .await?
            .ok_or(RepoError::NotFound)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(product)
    }

    async fn deactivate_product(&self, id: Uuid) -> Result<ProductRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let result = sqlx::query(
            "UPDATE products SET is_active = FALSE, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        let product = Self::product_in(&mut tx, id)
            .await?
            .ok_or(RepoError::NotFound)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(product)
    }
}

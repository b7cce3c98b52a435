use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::catalog::{
    CreateProductCommand, ListProductsQuery, UpdateProductCommand,
};
use crate::application::pagination::DEFAULT_PAGE_SIZE;
use crate::domain::money::DEFAULT_CURRENCY;

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ProductCreateRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price_amount: Decimal,
    #[serde(default = "default_currency")]
    pub price_currency: String,
    pub stock_quantity: i64,
    pub category: String,
    pub sku: String,
}

impl From<ProductCreateRequest> for CreateProductCommand {
    fn from(request: ProductCreateRequest) -> Self {
        Self {
            name: request.name,
            description: request.description,
            price_amount: request.price_amount,
            price_currency: request.price_currency,
            stock_quantity: request.stock_quantity,
            category: request.category,
            sku: request.sku,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ProductUpdateRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price_amount: Decimal,
    #[serde(default = "default_currency")]
    pub price_currency: String,
    #[serde(default)]
    pub stock_quantity: Option<i64>,
    pub category: String,
    pub sku: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl ProductUpdateRequest {
    pub fn into_command(self, id: Uuid) -> UpdateProductCommand {
        UpdateProductCommand {
            id,
            name: self.name,
            description: self.description,
            price_amount: self.price_amount,
            price_currency: self.price_currency,
            stock_quantity: self.stock_quantity,
            category: self.category,
            sku: self.sku,
            is_active: self.is_active,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductListParams {
    pub category: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub is_active: Option<bool>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl From<ProductListParams> for ListProductsQuery {
    fn from(params: ProductListParams) -> Self {
        Self {
            category: params.category,
            min_price: params.min_price,
            max_price: params.max_price,
            is_active: params.is_active,
            page_number: params.page.unwrap_or(1),
            page_size: params.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub cache_backend: &'static str,
}

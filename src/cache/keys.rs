//! Cache key construction.
//!
//! Point lookups use `<namespace>product_<id>`. List pages use
//! `<namespace>products_list_<filter tuple>`, so a single prefix covers every
//! cached page regardless of its filters. The invalidation counter lives at
//! `<namespace>generation`, outside both prefixes.

use std::fmt::Write as _;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::application::pagination::PageRequest;
use crate::application::repos::ProductQueryFilter;

const PRODUCT: &str = "product_";
const PRODUCT_LIST: &str = "products_list_";
const GENERATION: &str = "generation";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeys {
    namespace: String,
}

impl CacheKeys {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn product(&self, id: Uuid) -> String {
        format!("{}{PRODUCT}{id}", self.namespace)
    }

    pub fn generation(&self) -> String {
        format!("{}{GENERATION}", self.namespace)
    }

    pub fn product_list_prefix(&self) -> String {
        format!("{}{PRODUCT_LIST}", self.namespace)
    }

    /// Key for one filtered page.
    ///
    /// Every component is written in a fixed order with an explicit marker for
    /// absent filters, and free text is percent-escaped, so distinct tuples
    /// never collide and equal tuples always agree.
    pub fn product_list(&self, filter: &ProductQueryFilter, page: PageRequest) -> String {
        let mut key = self.product_list_prefix();
        key.push('c');
        match filter.category.as_deref() {
            Some(category) => {
                key.push('=');
                escape_into(&mut key, category);
            }
            None => key.push('!'),
        }
        push_decimal(&mut key, "min", filter.min_price);
        push_decimal(&mut key, "max", filter.max_price);
        match filter.active {
            Some(active) => {
                let _ = write!(key, ";a={active}");
            }
            None => key.push_str(";a!"),
        }
        let _ = write!(key, ";p={};s={}", page.page_number(), page.page_size());
        key
    }
}

fn push_decimal(key: &mut String, label: &str, value: Option<Decimal>) {
    match value {
        Some(value) => {
            let _ = write!(key, ";{label}={}", value.normalize());
        }
        None => {
            let _ = write!(key, ";{label}!");
        }
    }
}

fn escape_into(key: &mut String, raw: &str) {
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.') {
            key.push(char::from(byte));
        } else {
            let _ = write!(key, "%{byte:02X}");
        }
    }
}

//! Postgres repository queries against a migrated test database.

use std::collections::HashSet;
use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use catalog::application::pagination::PageRequest;
use catalog::application::repos::{
    CreateProductParams, ProductQueryFilter, ProductsRepo, ProductsWriteRepo, RepoError,
    UpdateProductParams,
};
use catalog::domain::entities::ProductRecord;
use catalog::domain::money::Money;
use catalog::infra::db::PostgresRepositories;

fn usd(amount: &str) -> Money {
    Money::new(Decimal::from_str(amount).expect("decimal"), "USD").expect("money")
}

fn params(sku: &str, category: &str, price: &str) -> CreateProductParams {
    CreateProductParams {
        name: format!("Product {sku}"),
        description: String::new(),
        price: usd(price),
        stock_quantity: 4,
        category: category.to_string(),
        sku: sku.to_string(),
    }
}

fn page(number: u32, size: u32) -> PageRequest {
    PageRequest::new(number, size).expect("valid page")
}

async fn seed(repos: &PostgresRepositories, rows: &[(&str, &str, &str)]) -> Vec<ProductRecord> {
    let mut created = Vec::with_capacity(rows.len());
    for (sku, category, price) in rows {
        let product = repos
            .create_product(params(sku, category, price))
            .await
            .expect("create product");
        created.push(product);
    }
    created
}

#[sqlx::test(migrations = "./migrations")]
async fn filters_apply_to_both_count_and_rows(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let created = seed(
        &repos,
        &[
            ("E-1", "Electronics", "199.99"),
            ("E-2", "Electronics", "49.00"),
            ("E-3", "Electronics", "5.00"),
            ("B-1", "Books", "12.50"),
        ],
    )
    .await;
    repos
        .deactivate_product(created[2].id)
        .await
        .expect("deactivate");

    let filter = ProductQueryFilter {
        category: Some("Electronics".to_string()),
        min_price: Some(Decimal::from(10)),
        max_price: Some(Decimal::from(200)),
        active: Some(true),
    };
    let result = repos.page_products(&filter, page(1, 10)).await.expect("page");

    assert_eq!(result.total_count, 2);
    assert_eq!(result.total_pages, 1);
    let skus: Vec<&str> = result.items.iter().map(|p| p.sku.as_str()).collect();
    assert_eq!(skus, ["E-2", "E-1"]);

    let inactive = ProductQueryFilter {
        active: Some(false),
        ..Default::default()
    };
    let result = repos.page_products(&inactive, page(1, 10)).await.expect("page");
    assert_eq!(result.total_count, 1);
    assert_eq!(result.items[0].sku, "E-3");

    let all = repos
        .page_products(&ProductQueryFilter::default(), page(1, 10))
        .await
        .expect("page");
    assert_eq!(all.total_count, 4);
    assert_eq!(all.items.len(), 4);
}

#[sqlx::test(migrations = "./migrations")]
async fn pages_walk_newest_first_without_overlap(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let skus: Vec<String> = (0..12).map(|n| format!("P-{n:02}")).collect();
    for sku in &skus {
        repos
            .create_product(params(sku, "Garden", "1.00"))
            .await
            .expect("create product");
    }

    let filter = ProductQueryFilter::default();
    let first = repos.page_products(&filter, page(1, 5)).await.expect("page");
    assert_eq!(first.total_count, 12);
    assert_eq!(first.total_pages, 3);

    let mut seen = HashSet::new();
    let mut walked = Vec::new();
    for number in 1..=3 {
        let result = repos.page_products(&filter, page(number, 5)).await.expect("page");
        assert_eq!(result.total_count, 12, "count is stable across pages");
        assert_eq!(result.items.len(), if number == 3 { 2 } else { 5 });
        for product in result.items {
            assert!(seen.insert(product.id), "{} appeared twice", product.sku);
            walked.push(product);
        }
    }
    assert_eq!(seen.len(), 12);

    for pair in walked.windows(2) {
        let (newer, older) = (&pair[0], &pair[1]);
        assert!(
            (newer.created_at, newer.id) > (older.created_at, older.id),
            "{} listed before {}",
            newer.sku,
            older.sku
        );
    }

    let beyond = repos.page_products(&filter, page(4, 5)).await.expect("page");
    assert!(beyond.items.is_empty());
    assert_eq!(beyond.total_count, 12);
}

#[sqlx::test(migrations = "./migrations")]
async fn categories_are_created_once_per_name(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    seed(
        &repos,
        &[
            ("K-1", "Kitchen", "3.00"),
            ("K-2", "Kitchen", "4.00"),
            ("T-1", "Toys", "5.00"),
        ],
    )
    .await;

    let names: Vec<String> = repos
        .list_categories()
        .await
        .expect("categories")
        .into_iter()
        .map(|category| category.name)
        .collect();
    assert_eq!(names, ["Kitchen", "Toys"]);
}

#[sqlx::test(migrations = "./migrations")]
async fn duplicate_sku_maps_to_duplicate(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    seed(&repos, &[("DUP-1", "Books", "1.00")]).await;

    let err = repos
        .create_product(params("DUP-1", "Books", "2.00"))
        .await
        .expect_err("duplicate sku");
    assert!(
        matches!(err, RepoError::Duplicate { ref constraint } if constraint == "products_sku_key"),
        "{err:?}"
    );
    assert!(repos.sku_exists("DUP-1", None).await.expect("exists"));
}

#[sqlx::test(migrations = "./migrations")]
async fn update_keeps_stock_when_omitted_and_soft_delete_keeps_row(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let product = seed(&repos, &[("U-1", "Books", "9.99")]).await.remove(0);

    let updated = repos
        .update_product(UpdateProductParams {
            id: product.id,
            name: "Renamed".to_string(),
            description: "Second edition".to_string(),
            price: usd("11.00"),
            stock_quantity: None,
            category: "Rare Books".to_string(),
            sku: product.sku.clone(),
            is_active: true,
        })
        .await
        .expect("update");
    assert_eq!(updated.name, "Renamed");
    assert_eq!(updated.category, "Rare Books");
    assert_eq!(updated.stock_quantity, product.stock_quantity);
    assert!(updated.updated_at.is_some());

    let deactivated = repos.deactivate_product(product.id).await.expect("deactivate");
    assert!(!deactivated.is_active);
    let found = repos
        .find_product(product.id)
        .await
        .expect("find")
        .expect("row kept");
    assert!(!found.is_active);

    let missing = repos.deactivate_product(Uuid::new_v4()).await;
    assert!(matches!(missing, Err(RepoError::NotFound)));
}

#[sqlx::test(migrations = "./migrations")]
async fn out_of_range_values_are_invalid_input(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);

    let err = repos
        .create_product(params("HUGE-1", "Books", "100000000000000000"))
        .await
        .expect_err("numeric overflow");
    assert!(matches!(err, RepoError::InvalidInput { .. }), "{err:?}");

    let mut long_name = params("LONG-1", "Books", "1.00");
    long_name.name = "n".repeat(201);
    let err = repos
        .create_product(long_name)
        .await
        .expect_err("value too long");
    assert!(matches!(err, RepoError::InvalidInput { .. }), "{err:?}");
}

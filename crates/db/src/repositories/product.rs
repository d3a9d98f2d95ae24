use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::Row;

use shopkeep_core::domain::product::{CatalogField, NewProduct, Product, ProductId, ProductPatch};

use super::{CatalogRepository, RepositoryError};
use crate::DbPool;

const PRODUCT_COLUMNS: &str = "id, name, price, stock, category, created_at, updated_at";

pub struct SqlCatalogRepository {
    pool: DbPool,
}

impl SqlCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode<T>(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<T, RepositoryError>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn parse_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("{column} `{raw}`: {e}")))
}

fn row_to_product(row: &sqlx::sqlite::SqliteRow) -> Result<Product, RepositoryError> {
    let id: String = decode(row, "id")?;
    let price_str: String = decode(row, "price")?;
    let stock: i64 = decode(row, "stock")?;
    let created_at_str: String = decode(row, "created_at")?;
    let updated_at_str: String = decode(row, "updated_at")?;

    let price = Decimal::from_str(&price_str)
        .map_err(|e| RepositoryError::Decode(format!("price `{price_str}` for {id}: {e}")))?;
    let stock = u32::try_from(stock)
        .map_err(|_| RepositoryError::Decode(format!("stock `{stock}` for {id} is out of range")))?;

    Ok(Product {
        name: decode(row, "name")?,
        category: decode(row, "category")?,
        price,
        stock,
        created_at: parse_timestamp("created_at", &created_at_str)?,
        updated_at: parse_timestamp("updated_at", &updated_at_str)?,
        id: ProductId(id),
    })
}

async fn write_product<'e, E>(executor: E, product: &Product) -> Result<(), RepositoryError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        "INSERT INTO product (id, name, price, stock, category, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
             name = excluded.name,
             price = excluded.price,
             stock = excluded.stock,
             category = excluded.category,
             updated_at = excluded.updated_at",
    )
    .bind(&product.id.0)
    .bind(&product.name)
    .bind(product.price.to_string())
    .bind(i64::from(product.stock))
    .bind(&product.category)
    .bind(product.created_at.to_rfc3339())
    .bind(product.updated_at.to_rfc3339())
    .execute(executor)
    .await?;

    Ok(())
}

#[async_trait::async_trait]
impl CatalogRepository for SqlCatalogRepository {
    async fn list_all(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM product ORDER BY rowid"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_product).collect()
    }

    async fn find_by_exact(
        &self,
        field: CatalogField,
        value: &str,
    ) -> Result<Vec<Product>, RepositoryError> {
        // `field` comes from a closed enum, never from user input.
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM product WHERE {} = ? ORDER BY rowid",
            field.as_str()
        );
        let rows = sqlx::query(&sql).bind(value).fetch_all(&self.pool).await?;

        rows.iter().map(row_to_product).collect()
    }

    async fn get(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM product WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn create(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        product.validate()?;
        let product = product.normalized();
        let now = Utc::now();
        let created = Product {
            id: ProductId(uuid::Uuid::new_v4().to_string()),
            name: product.name,
            price: product.price,
            stock: product.stock,
            category: product.category,
            created_at: now,
            updated_at: now,
        };

        write_product(&self.pool, &created).await?;
        tracing::debug!(product_id = %created.id, "catalog record created");
        Ok(created)
    }

    async fn update_partial(
        &self,
        id: &ProductId,
        patch: ProductPatch,
    ) -> Result<Option<Product>, RepositoryError> {
        patch.validate()?;

        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM product WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut product = row_to_product(&row)?;
        patch.apply_to(&mut product, Utc::now());
        write_product(&mut *tx, &product).await?;
        tx.commit().await?;

        Ok(Some(product))
    }

    async fn delete(&self, id: &ProductId) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM product WHERE id = ?").bind(&id.0).execute(&self.pool).await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use shopkeep_core::domain::product::{CatalogField, NewProduct, ProductId, ProductPatch};

    use super::SqlCatalogRepository;
    use crate::repositories::{CatalogRepository, RepositoryError};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> SqlCatalogRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlCatalogRepository::new(pool)
    }

    fn iphone() -> NewProduct {
        NewProduct {
            name: "iPhone 15".to_string(),
            price: Decimal::new(35000, 0),
            stock: 100,
            category: "Smartphones".to_string(),
        }
    }

    fn laptop(name: &str, price: i64) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            price: Decimal::new(price, 0),
            stock: 50,
            category: "Laptops".to_string(),
        }
    }

    #[tokio::test]
    async fn created_product_is_found_by_exact_name() {
        let repo = setup().await;
        let created = repo.create(iphone()).await.expect("create");

        let found = repo.find_by_exact(CatalogField::Name, "iPhone 15").await.expect("find");

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, created.id);
        assert_eq!(found[0].name, "iPhone 15");
        assert_eq!(found[0].price, Decimal::new(35000, 0));
        assert_eq!(found[0].stock, 100);
        assert_eq!(found[0].category, "Smartphones");
    }

    #[tokio::test]
    async fn exact_match_does_not_fold_case_or_match_prefixes() {
        let repo = setup().await;
        repo.create(iphone()).await.expect("create");

        let lower = repo.find_by_exact(CatalogField::Name, "iphone 15").await.expect("find");
        let prefix = repo.find_by_exact(CatalogField::Name, "iPhone").await.expect("find");

        assert!(lower.is_empty());
        assert!(prefix.is_empty());
    }

    #[tokio::test]
    async fn list_all_keeps_insertion_order() {
        let repo = setup().await;
        repo.create(laptop("MacBook Air M3", 45000)).await.expect("create");
        repo.create(iphone()).await.expect("create");
        repo.create(laptop("Dell XPS 15", 55000)).await.expect("create");

        let names: Vec<String> =
            repo.list_all().await.expect("list").into_iter().map(|p| p.name).collect();

        assert_eq!(names, vec!["MacBook Air M3", "iPhone 15", "Dell XPS 15"]);
    }

    #[tokio::test]
    async fn category_lookup_returns_every_match() {
        let repo = setup().await;
        repo.create(laptop("MacBook Air M3", 45000)).await.expect("create");
        repo.create(laptop("Dell XPS 15", 55000)).await.expect("create");
        repo.create(iphone()).await.expect("create");

        let laptops = repo.find_by_exact(CatalogField::Category, "Laptops").await.expect("find");

        assert_eq!(laptops.len(), 2);
    }

    #[tokio::test]
    async fn fractional_price_survives_storage() {
        let repo = setup().await;
        let mut keyboard = iphone();
        keyboard.name = "Keyboard".to_string();
        keyboard.price = Decimal::new(149950, 2);

        let created = repo.create(keyboard).await.expect("create");
        let loaded = repo.get(&created.id).await.expect("get").expect("present");

        assert_eq!(loaded.price, Decimal::new(149950, 2));
    }

    #[tokio::test]
    async fn partial_update_keeps_unspecified_fields() {
        let repo = setup().await;
        let created = repo.create(iphone()).await.expect("create");

        let patch = ProductPatch { stock: Some(42), ..ProductPatch::default() };
        let updated =
            repo.update_partial(&created.id, patch).await.expect("update").expect("present");

        assert_eq!(updated.stock, 42);
        assert_eq!(updated.name, created.name);
        assert_eq!(updated.price, created.price);
        assert_eq!(updated.category, created.category);
        assert_eq!(repo.get(&created.id).await.expect("get"), Some(updated));
    }

    #[tokio::test]
    async fn partial_update_of_missing_id_returns_none() {
        let repo = setup().await;

        let updated = repo
            .update_partial(&ProductId("missing".to_string()), ProductPatch::default())
            .await
            .expect("update");

        assert!(updated.is_none());
    }

    #[tokio::test]
    async fn negative_price_is_rejected_before_write() {
        let repo = setup().await;
        let mut invalid = iphone();
        invalid.price = Decimal::new(-1, 0);

        let result = repo.create(invalid).await;

        assert!(matches!(result, Err(RepositoryError::Invalid(_))));
        assert!(repo.list_all().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn deleting_missing_id_is_not_an_error() {
        let repo = setup().await;
        repo.create(iphone()).await.expect("create");

        let removed = repo.delete(&ProductId("missing".to_string())).await.expect("delete");

        assert!(!removed);
        assert_eq!(repo.list_all().await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_the_record() {
        let repo = setup().await;
        let created = repo.create(iphone()).await.expect("create");

        assert!(repo.delete(&created.id).await.expect("delete"));
        assert_eq!(repo.get(&created.id).await.expect("get"), None);
    }
}

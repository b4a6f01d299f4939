use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use parkwise_core::domain::conditions::SpecialCondition;
use parkwise_core::domain::product::{Product, ProductCode};

use super::{ProductRepository, RepositoryError};
use crate::DbPool;

const SELECT_PRODUCT: &str = "SELECT code, name, company_name, base_rate, top_rate, \
     categories_json, special_conditions_json FROM product";

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ProductRepository for SqlProductRepository {
    async fn fetch_all(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(&format!("{SELECT_PRODUCT} ORDER BY catalog_position ASC"))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(product_from_row).collect()
    }

    async fn find_by_code(&self, code: &ProductCode) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_PRODUCT} WHERE code = ?1"))
            .bind(&code.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn save(&self, product: Product) -> Result<(), RepositoryError> {
        let categories = serde_json::to_string(&product.categories)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;
        let flags = serde_json::to_string(&product.special_conditions)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        sqlx::query(
            "INSERT INTO product (
                code, name, company_name, base_rate, top_rate,
                categories_json, special_conditions_json, catalog_position, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7,
                (SELECT COALESCE(MAX(catalog_position) + 1, 0) FROM product), ?8
            )
            ON CONFLICT(code) DO UPDATE SET
                name = excluded.name,
                company_name = excluded.company_name,
                base_rate = excluded.base_rate,
                top_rate = excluded.top_rate,
                categories_json = excluded.categories_json,
                special_conditions_json = excluded.special_conditions_json,
                updated_at = excluded.updated_at",
        )
        .bind(&product.code.0)
        .bind(&product.name)
        .bind(&product.company_name)
        .bind(product.base_rate)
        .bind(product.top_rate)
        .bind(categories)
        .bind(flags)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn product_from_row(row: &SqliteRow) -> Result<Product, RepositoryError> {
    let categories_json: String = row.try_get("categories_json")?;
    let flags_json: String = row.try_get("special_conditions_json")?;

    let categories: BTreeSet<String> = serde_json::from_str(&categories_json).map_err(|error| {
        RepositoryError::Decode(format!("invalid categories_json: {error}"))
    })?;
    let special_conditions: BTreeMap<SpecialCondition, bool> = serde_json::from_str(&flags_json)
        .map_err(|error| {
            RepositoryError::Decode(format!("invalid special_conditions_json: {error}"))
        })?;

    Ok(Product {
        code: ProductCode(row.try_get("code")?),
        name: row.try_get("name")?,
        company_name: row.try_get("company_name")?,
        base_rate: row.try_get("base_rate")?,
        top_rate: row.try_get("top_rate")?,
        categories,
        special_conditions,
    })
}

use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};

use parkwise_core::domain::product::{ChunkType, ProductChunk, ProductCode};

use super::{order_chunks, ChunkRepository, RepositoryError};
use crate::DbPool;

pub struct SqlChunkRepository {
    pool: DbPool,
}

impl SqlChunkRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ChunkRepository for SqlChunkRepository {
    async fn fetch_for_products(
        &self,
        codes: &[ProductCode],
        chunk_types: &[ChunkType],
    ) -> Result<Vec<ProductChunk>, RepositoryError> {
        if codes.is_empty() || chunk_types.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "SELECT product_code, product_name, chunk_type, chunk_index, content \
             FROM product_chunk WHERE product_code IN (",
        );
        let mut separated = builder.separated(", ");
        for code in codes {
            separated.push_bind(code.0.as_str());
        }
        separated.push_unseparated(") AND chunk_type IN (");
        let mut separated = builder.separated(", ");
        for chunk_type in chunk_types {
            separated.push_bind(chunk_type.as_str());
        }
        separated.push_unseparated(")");

        let rows = builder.build().fetch_all(&self.pool).await?;
        let mut chunks = rows.iter().map(chunk_from_row).collect::<Result<Vec<_>, _>>()?;
        order_chunks(codes, &mut chunks);
        Ok(chunks)
    }

    async fn fetch_all(&self) -> Result<Vec<ProductChunk>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT product_code, product_name, chunk_type, chunk_index, content
             FROM product_chunk
             ORDER BY product_code, chunk_type, chunk_index",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(chunk_from_row).collect()
    }

    async fn save_all(&self, chunks: Vec<ProductChunk>) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        for chunk in chunks {
            sqlx::query(
                "INSERT INTO product_chunk (product_code, chunk_type, chunk_index, product_name, content)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(product_code, chunk_type, chunk_index) DO UPDATE SET
                    product_name = excluded.product_name,
                    content = excluded.content",
            )
            .bind(&chunk.product_code.0)
            .bind(chunk.chunk_type.as_str())
            .bind(i64::from(chunk.chunk_index))
            .bind(&chunk.product_name)
            .bind(&chunk.content)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

fn chunk_from_row(row: &SqliteRow) -> Result<ProductChunk, RepositoryError> {
    let chunk_type: String = row.try_get("chunk_type")?;
    let chunk_index: i64 = row.try_get("chunk_index")?;
    let chunk_index = u32::try_from(chunk_index)
        .map_err(|_| RepositoryError::Decode(format!("chunk_index {chunk_index} out of range")))?;

    Ok(ProductChunk {
        product_code: ProductCode(row.try_get("product_code")?),
        product_name: row.try_get("product_name")?,
        chunk_type: ChunkType::parse(&chunk_type),
        chunk_index,
        content: row.try_get("content")?,
    })
}

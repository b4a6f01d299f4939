use async_trait::async_trait;
use thiserror::Error;

use parkwise_core::domain::product::{ChunkType, Product, ProductChunk, ProductCode};
use parkwise_core::errors::ApplicationError;

pub mod chunk;
pub mod memory;
pub mod product;

pub use chunk::SqlChunkRepository;
pub use memory::{InMemoryChunkRepository, InMemoryProductRepository};
pub use product::SqlProductRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        ApplicationError::Persistence(value.to_string())
    }
}

/// Product catalog. `fetch_all` returns products in catalog order, which the
/// eligibility filter relies on for tie-breaking.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<Product>, RepositoryError>;
    async fn find_by_code(&self, code: &ProductCode) -> Result<Option<Product>, RepositoryError>;
    async fn save(&self, product: Product) -> Result<(), RepositoryError>;
}

/// Natural-language attribute chunks per product.
#[async_trait]
pub trait ChunkRepository: Send + Sync {
    /// Chunks of the given products restricted to `chunk_types`, ordered by the
    /// position of the product code in `codes`, then by type and index.
    async fn fetch_for_products(
        &self,
        codes: &[ProductCode],
        chunk_types: &[ChunkType],
    ) -> Result<Vec<ProductChunk>, RepositoryError>;

    async fn fetch_all(&self) -> Result<Vec<ProductChunk>, RepositoryError>;

    async fn save_all(&self, chunks: Vec<ProductChunk>) -> Result<(), RepositoryError>;
}

pub(crate) fn order_chunks(codes: &[ProductCode], chunks: &mut [ProductChunk]) {
    chunks.sort_by_key(|chunk| {
        let position = codes.iter().position(|code| code == &chunk.product_code);
        (position.unwrap_or(usize::MAX), chunk.chunk_type, chunk.chunk_index)
    });
}

use std::collections::HashMap;

use tokio::sync::RwLock;

use parkwise_core::domain::product::{ChunkType, Product, ProductChunk, ProductCode};

use super::{order_chunks, ChunkRepository, ProductRepository, RepositoryError};

/// Keeps insertion order so `fetch_all` matches the order products were saved.
#[derive(Default)]
pub struct InMemoryProductRepository {
    products: RwLock<Vec<Product>>,
}

impl InMemoryProductRepository {
    pub fn with_products(products: Vec<Product>) -> Self {
        Self { products: RwLock::new(products) }
    }
}

#[async_trait::async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn fetch_all(&self) -> Result<Vec<Product>, RepositoryError> {
        Ok(self.products.read().await.clone())
    }

    async fn find_by_code(&self, code: &ProductCode) -> Result<Option<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.iter().find(|product| &product.code == code).cloned())
    }

    async fn save(&self, product: Product) -> Result<(), RepositoryError> {
        let mut products = self.products.write().await;
        match products.iter_mut().find(|existing| existing.code == product.code) {
            Some(existing) => *existing = product,
            None => products.push(product),
        }
        Ok(())
    }
}

type ChunkKey = (ProductCode, ChunkType, u32);

#[derive(Default)]
pub struct InMemoryChunkRepository {
    chunks: RwLock<HashMap<ChunkKey, ProductChunk>>,
}

impl InMemoryChunkRepository {
    pub fn with_chunks(chunks: Vec<ProductChunk>) -> Self {
        let chunks = chunks.into_iter().map(|chunk| (chunk_key(&chunk), chunk)).collect();
        Self { chunks: RwLock::new(chunks) }
    }
}

fn chunk_key(chunk: &ProductChunk) -> ChunkKey {
    (chunk.product_code.clone(), chunk.chunk_type, chunk.chunk_index)
}

#[async_trait::async_trait]
impl ChunkRepository for InMemoryChunkRepository {
    async fn fetch_for_products(
        &self,
        codes: &[ProductCode],
        chunk_types: &[ChunkType],
    ) -> Result<Vec<ProductChunk>, RepositoryError> {
        let chunks = self.chunks.read().await;
        let mut selected: Vec<ProductChunk> = chunks
            .values()
            .filter(|chunk| codes.contains(&chunk.product_code))
            .filter(|chunk| chunk_types.contains(&chunk.chunk_type))
            .cloned()
            .collect();
        order_chunks(codes, &mut selected);
        Ok(selected)
    }

    async fn fetch_all(&self) -> Result<Vec<ProductChunk>, RepositoryError> {
        let chunks = self.chunks.read().await;
        let mut all: Vec<ProductChunk> = chunks.values().cloned().collect();
        all.sort_by(|left, right| chunk_key(left).cmp(&chunk_key(right)));
        Ok(all)
    }

    async fn save_all(&self, chunks: Vec<ProductChunk>) -> Result<(), RepositoryError> {
        let mut stored = self.chunks.write().await;
        for chunk in chunks {
            stored.insert(chunk_key(&chunk), chunk);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use parkwise_core::domain::product::{ChunkType, Product, ProductChunk, ProductCode};

    use crate::repositories::{
        ChunkRepository, InMemoryChunkRepository, InMemoryProductRepository, ProductRepository,
    };

    fn product(code: &str, top_rate: f64) -> Product {
        Product {
            code: ProductCode::from(code),
            name: format!("Bank {code}"),
            company_name: "Bank".to_owned(),
            base_rate: 1.0,
            top_rate,
            categories: BTreeSet::new(),
            special_conditions: BTreeMap::new(),
        }
    }

    fn chunk(code: &str, chunk_type: ChunkType, index: u32) -> ProductChunk {
        ProductChunk {
            product_code: ProductCode::from(code),
            product_name: format!("Bank {code}"),
            chunk_type,
            chunk_index: index,
            content: format!("{code} {} {index}", chunk_type.as_str()),
        }
    }

    #[tokio::test]
    async fn product_repo_keeps_catalog_order_and_replaces_in_place() {
        let repo = InMemoryProductRepository::default();
        repo.save(product("B", 2.0)).await.expect("save B");
        repo.save(product("A", 3.0)).await.expect("save A");
        repo.save(product("B", 4.0)).await.expect("update B");

        let all = repo.fetch_all().await.expect("fetch all");
        let codes: Vec<&str> = all.iter().map(|product| product.code.0.as_str()).collect();
        assert_eq!(codes, vec!["B", "A"]);
        assert_eq!(all[0].top_rate, 4.0);

        let found = repo.find_by_code(&ProductCode::from("A")).await.expect("find");
        assert_eq!(found.map(|product| product.top_rate), Some(3.0));
        assert!(repo.find_by_code(&ProductCode::from("Z")).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn chunk_repo_filters_by_code_and_type_in_requested_order() {
        let repo = InMemoryChunkRepository::with_chunks(vec![
            chunk("A", ChunkType::BasicRateInfo, 0),
            chunk("A", ChunkType::ProductGuide, 0),
            chunk("B", ChunkType::PreferentialDetails, 1),
            chunk("B", ChunkType::BasicRateInfo, 0),
            chunk("C", ChunkType::BasicRateInfo, 0),
        ]);

        let codes = [ProductCode::from("B"), ProductCode::from("A")];
        let chunks = repo
            .fetch_for_products(&codes, &ChunkType::rate_and_preferential())
            .await
            .expect("fetch");

        let keys: Vec<(String, ChunkType)> =
            chunks.iter().map(|chunk| (chunk.product_code.0.clone(), chunk.chunk_type)).collect();
        assert_eq!(
            keys,
            vec![
                ("B".to_owned(), ChunkType::BasicRateInfo),
                ("B".to_owned(), ChunkType::PreferentialDetails),
                ("A".to_owned(), ChunkType::BasicRateInfo),
            ]
        );
        assert_eq!(repo.fetch_all().await.expect("all").len(), 5);
    }
}

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::conditions::SpecialCondition;

#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductCode(pub String);

impl fmt::Display for ProductCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProductCode {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// A savings product as published by the catalog. Rates are annual percentages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub code: ProductCode,
    pub name: String,
    #[serde(default)]
    pub company_name: String,
    pub base_rate: f64,
    pub top_rate: f64,
    #[serde(default)]
    pub categories: BTreeSet<String>,
    #[serde(default)]
    pub special_conditions: BTreeMap<SpecialCondition, bool>,
}

impl Product {
    pub fn best_rate(&self) -> f64 {
        self.base_rate.max(self.top_rate)
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.categories.contains(category)
    }

    /// Missing flags count as `false`.
    pub fn offers(&self, condition: SpecialCondition) -> bool {
        self.special_conditions.get(&condition).copied().unwrap_or(false)
    }

    pub fn summary(&self) -> SimpleProduct {
        SimpleProduct { code: self.code.clone(), name: self.name.clone() }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimpleProduct {
    pub code: ProductCode,
    pub name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    BasicRateInfo,
    PreferentialDetails,
    ProductGuide,
    Other,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BasicRateInfo => "basic_rate_info",
            Self::PreferentialDetails => "preferential_details",
            Self::ProductGuide => "product_guide",
            Self::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "basic_rate_info" => Self::BasicRateInfo,
            "preferential_details" => Self::PreferentialDetails,
            "product_guide" => Self::ProductGuide,
            _ => Self::Other,
        }
    }

    /// The chunk types consumed by the clarification and strategy phases.
    pub fn rate_and_preferential() -> [ChunkType; 2] {
        [Self::BasicRateInfo, Self::PreferentialDetails]
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductChunk {
    pub product_code: ProductCode,
    pub product_name: String,
    pub chunk_type: ChunkType,
    pub chunk_index: u32,
    pub content: String,
}

/// Chunks of one product, grouped for prompt building.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetail {
    pub product_code: ProductCode,
    pub product_name: String,
    pub chunks: Vec<ProductChunk>,
}

impl ProductDetail {
    pub fn group(chunks: Vec<ProductChunk>) -> Vec<ProductDetail> {
        let mut grouped: Vec<ProductDetail> = Vec::new();
        for chunk in chunks {
            match grouped.iter_mut().find(|detail| detail.product_code == chunk.product_code) {
                Some(detail) => detail.chunks.push(chunk),
                None => grouped.push(ProductDetail {
                    product_code: chunk.product_code.clone(),
                    product_name: chunk.product_name.clone(),
                    chunks: vec![chunk],
                }),
            }
        }
        for detail in &mut grouped {
            detail.chunks.sort_by_key(|chunk| (chunk.chunk_type, chunk.chunk_index));
        }
        grouped
    }

    pub fn bank_name(&self) -> &str {
        self.product_name.split_whitespace().next().unwrap_or_default()
    }
}

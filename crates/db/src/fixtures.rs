use std::collections::{BTreeMap, BTreeSet};

use parkwise_core::domain::conditions::SpecialCondition;
use parkwise_core::domain::product::{ChunkType, Product, ProductChunk, ProductCode};

use crate::repositories::{ChunkRepository, ProductRepository, RepositoryError};

/// Demo parking-account catalog used by `parkwise seed` and integration tests.
const DEMO_PRODUCTS: &[SeedProduct] = &[
    SeedProduct::new("PK-001", "Toss", "Toss Bank Parking Account", 1.80, 1.80, &["online", "anyone"], &[]),
    SeedProduct::new("PK-002", "Kakao", "Kakao Bank Safe Box", 1.80, 1.80, &["online", "anyone"], &["bank_app"]),
    SeedProduct::new("PK-003", "KBank", "KBank Daily Parking", 2.00, 2.30, &["online", "anyone"], &["bank_app", "online"]),
    SeedProduct::new("PK-004", "OK", "OK Savings Parking OK Account", 1.50, 7.00, &["online"], &["using_utility_bill", "first_banking"]),
    SeedProduct::new("PK-005", "SBI", "SBI Savings Sabi Parking", 2.50, 3.20, &["online", "anyone"], &["online", "bank_app"]),
    SeedProduct::new("PK-006", "Welcome", "Welcome Savings Direct Parking", 2.00, 3.00, &["online"], &["using_card"]),
    SeedProduct::new("PK-007", "Pepper", "Pepper Savings Pepper Parking", 2.20, 3.40, &["online", "specialOffer"], &["first_banking", "bank_app"]),
    SeedProduct::new("PK-008", "Aqon", "Aqon Savings Free Parking", 2.80, 2.80, &["online", "anyone"], &[]),
    SeedProduct::new("PK-009", "Shinhan", "Shinhan Bank Smart Parking", 0.10, 1.90, &["online"], &["using_salary_account", "using_card"]),
    SeedProduct::new("PK-010", "Hana", "Hana Bank Daily Keeper", 0.10, 3.00, &["online", "specialOffer"], &["first_banking", "using_salary_account"]),
    SeedProduct::new("PK-011", "Woori", "Woori Bank WON Parking", 0.10, 2.50, &["online"], &["bank_app", "using_card"]),
    SeedProduct::new("PK-012", "KB", "KB Star Parking Account", 0.10, 2.20, &["online", "anyone"], &["bank_app", "using_utility_bill"]),
    SeedProduct::new("PK-013", "NH", "NH Nonghyup Parking Plus", 0.20, 2.40, &["online"], &["using_salary_account", "using_utility_bill"]),
    SeedProduct::new("PK-014", "IBK", "IBK i-ONE Parking", 0.10, 2.60, &["online"], &["first_banking", "bank_app"]),
    SeedProduct::new("PK-015", "SC", "SC First Bank Dream Parking", 1.00, 3.10, &["online", "anyone"], &["online", "using_card"]),
    SeedProduct::new("PK-016", "iM", "iM Bank Hi Parking", 1.50, 2.90, &["online"], &["online", "first_banking"]),
    SeedProduct::new("PK-017", "Busan", "Busan Bank Mobile Parking", 1.20, 2.70, &["online"], &["bank_app"]),
    SeedProduct::new("PK-018", "Kyongnam", "Kyongnam Bank Parking Mate", 1.10, 2.50, &["online", "specialOffer"], &["first_banking"]),
    SeedProduct::new("PK-019", "Kwangju", "Kwangju Bank Plus Parking", 2.00, 3.30, &["online", "anyone"], &["bank_app", "online"]),
    SeedProduct::new("PK-020", "Jeonbuk", "Jeonbuk Bank JB Parking", 2.10, 3.50, &["online"], &["first_banking", "using_utility_bill"]),
    SeedProduct::new("PK-021", "Jeju", "Jeju Bank Island Parking", 1.00, 2.00, &[], &["using_salary_account"]),
    SeedProduct::new("PK-022", "Suhyup", "Suhyup Bank Sea Parking", 1.30, 2.60, &["online"], &["using_card", "bank_app"]),
    SeedProduct::new("PK-023", "Daishin", "Daishin Savings Parking Plus", 2.60, 3.00, &["online", "anyone"], &["online"]),
    SeedProduct::new("PK-024", "Korea", "Korea Investment Savings Parking", 2.70, 3.10, &["online", "anyone"], &["bank_app"]),
    SeedProduct::new("PK-025", "JT", "JT Savings Parking Deposit", 2.30, 2.90, &["online"], &["first_banking"]),
    SeedProduct::new("PK-026", "Dongyang", "Dongyang Savings Parking Box", 1.90, 2.40, &["online", "anyone"], &[]),
    SeedProduct::new("PK-027", "Sangsangin", "Sangsangin Savings Parking", 2.40, 3.60, &["online", "specialOffer"], &["first_banking", "bank_app", "online"]),
    SeedProduct::new("PK-028", "Yuanta", "Yuanta Savings Parking", 2.00, 2.20, &["online"], &[]),
    SeedProduct::new("PK-029", "Hanwha", "Hanwha Savings Smart Parking", 2.10, 2.80, &["online", "anyone"], &["using_card"]),
    SeedProduct::new("PK-030", "Shinhan", "Shinhan Savings Easy Parking", 2.00, 2.60, &["online"], &["bank_app"]),
    SeedProduct::new("PK-031", "Kiwoom", "Kiwoom Yes Savings Parking", 2.50, 2.50, &["online", "anyone"], &[]),
    SeedProduct::new("PK-032", "Moa", "Moa Savings Parking Plus", 2.30, 3.20, &["online"], &["using_utility_bill", "online"]),
    SeedProduct::new("PK-033", "Daol", "Daol Savings Fi Parking", 3.00, 3.20, &["online", "anyone"], &["bank_app"]),
    SeedProduct::new("PK-034", "Kakao", "Kakao Bank Parking Plus", 1.50, 2.00, &["online", "anyone"], &["bank_app", "online"]),
    SeedProduct::new("PK-035", "Toss", "Toss Bank Daily Interest Account", 1.80, 2.30, &["online", "specialOffer"], &["first_banking", "bank_app"]),
    SeedProduct::new("PK-036", "KB", "KB Savings Kiwi Parking", 2.00, 2.50, &["online"], &["using_salary_account"]),
    SeedProduct::new("PK-037", "Woori", "Woori Savings Parking Now", 2.20, 2.90, &["online", "anyone"], &["bank_app", "using_card"]),
    SeedProduct::new("PK-038", "Hana", "Hana Savings Parking Safe", 2.10, 2.40, &["online"], &[]),
    SeedProduct::new("PK-039", "NH", "NH Savings Pocket Parking", 1.70, 2.10, &["online", "anyone"], &["online"]),
    SeedProduct::new("PK-040", "Ulsan", "Ulsan Savings Whale Parking", 0.50, 4.00, &["online", "specialOffer"], &["first_banking", "using_salary_account", "using_card"]),
];

#[derive(Debug, Clone, Copy)]
struct SeedProduct {
    code: &'static str,
    company: &'static str,
    name: &'static str,
    base_rate: f64,
    top_rate: f64,
    categories: &'static [&'static str],
    flags: &'static [&'static str],
}

impl SeedProduct {
    const fn new(
        code: &'static str,
        company: &'static str,
        name: &'static str,
        base_rate: f64,
        top_rate: f64,
        categories: &'static [&'static str],
        flags: &'static [&'static str],
    ) -> Self {
        Self { code, company, name, base_rate, top_rate, categories, flags }
    }

    fn to_product(self) -> Result<Product, RepositoryError> {
        let mut special_conditions = BTreeMap::new();
        for condition in SpecialCondition::ALL {
            special_conditions.insert(condition, false);
        }
        for flag in self.flags {
            let condition = flag
                .parse::<SpecialCondition>()
                .map_err(|error| RepositoryError::Decode(error.to_string()))?;
            special_conditions.insert(condition, true);
        }

        Ok(Product {
            code: ProductCode::from(self.code),
            name: self.name.to_owned(),
            company_name: self.company.to_owned(),
            base_rate: self.base_rate,
            top_rate: self.top_rate,
            categories: self.categories.iter().map(|value| (*value).to_owned()).collect(),
            special_conditions,
        })
    }

    fn chunks(&self) -> Vec<ProductChunk> {
        let chunk = |chunk_type: ChunkType, chunk_index: u32, content: String| ProductChunk {
            product_code: ProductCode::from(self.code),
            product_name: self.name.to_owned(),
            chunk_type,
            chunk_index,
            content,
        };

        let mut chunks = vec![chunk(
            ChunkType::BasicRateInfo,
            0,
            format!(
                "{} pays a base rate of {:.2}% per year on the full balance, \
                 credited monthly and compounded into the principal.",
                self.name, self.base_rate
            ),
        )];

        let preferential = if self.flags.is_empty() {
            format!(
                "{} has no preferential conditions; the base rate is the top rate.",
                self.name
            )
        } else {
            let labels: Vec<&str> = self.flags.iter().map(|flag| flag_description(flag)).collect();
            format!(
                "{} adds up to {:.2} percentage points on top of the base rate (top rate {:.2}%) \
                 when the customer meets: {}.",
                self.name,
                (self.top_rate - self.base_rate).max(0.0),
                self.top_rate,
                labels.join("; ")
            )
        };
        chunks.push(chunk(ChunkType::PreferentialDetails, 0, preferential));

        let audience: BTreeSet<&str> = self.categories.iter().copied().collect();
        let guide = format!(
            "{} can be opened {}{}{}.",
            self.name,
            if audience.contains("online") { "without a branch visit" } else { "at a branch" },
            if audience.contains("anyone") { ", by any resident adult" } else { "" },
            if audience.contains("specialOffer") { ", as a limited special offer" } else { "" },
        );
        chunks.push(chunk(ChunkType::ProductGuide, 0, guide));
        chunks
    }
}

fn flag_description(flag: &str) -> &'static str {
    match flag {
        "first_banking" => "first-time customer of the bank",
        "bank_app" => "signs up and logs in through the bank app",
        "online" => "opens the account online",
        "using_salary_account" => "routes salary deposits into the bank",
        "using_utility_bill" => "pays utility bills by auto-debit",
        "using_card" => "uses the bank's card every month",
        _ => "bank-specific condition",
    }
}

/// Canonical demo catalog and its chunk documents.
pub struct DemoCatalog;

impl DemoCatalog {
    pub fn products() -> Result<Vec<Product>, RepositoryError> {
        DEMO_PRODUCTS.iter().map(|seed| seed.to_product()).collect()
    }

    pub fn chunks() -> Vec<ProductChunk> {
        DEMO_PRODUCTS.iter().flat_map(SeedProduct::chunks).collect()
    }

    /// Saves every demo product and chunk through the given repositories.
    pub async fn load<P, C>(products: &P, chunks: &C) -> Result<SeedResult, RepositoryError>
    where
        P: ProductRepository + ?Sized,
        C: ChunkRepository + ?Sized,
    {
        let catalog = Self::products()?;
        let product_count = catalog.len();
        for product in catalog {
            products.save(product).await?;
        }

        let documents = Self::chunks();
        let chunk_count = documents.len();
        chunks.save_all(documents).await?;

        Ok(SeedResult { product_count, chunk_count })
    }

    /// Checks that every demo product is present with its rate chunks.
    pub async fn verify<P, C>(products: &P, chunks: &C) -> Result<VerificationResult, RepositoryError>
    where
        P: ProductRepository + ?Sized,
        C: ChunkRepository + ?Sized,
    {
        let mut checks = Vec::with_capacity(DEMO_PRODUCTS.len());
        for seed in DEMO_PRODUCTS {
            let code = ProductCode::from(seed.code);
            let present = products.find_by_code(&code).await?.is_some();
            let rate_chunks = chunks
                .fetch_for_products(std::slice::from_ref(&code), &ChunkType::rate_and_preferential())
                .await?;
            checks.push((seed.code, present && rate_chunks.len() == 2));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedResult {
    pub product_count: usize,
    pub chunk_count: usize,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

use parkwise_core::config::LoadOptions;
use parkwise_db::{DemoCatalog, SeedResult, SqlChunkRepository, SqlProductRepository};

use crate::commands::{load_config, open_database, runtime, CommandResult, Failure};

/// Loads the demo catalog into the configured database. Saving is an upsert,
/// so repeated runs leave the same rows.
pub fn run(options: LoadOptions) -> CommandResult {
    let result = load_config(options).and_then(|config| {
        runtime()?.block_on(async {
            let pool = open_database(&config).await?;
            let products = SqlProductRepository::new(pool.clone());
            let chunks = SqlChunkRepository::new(pool.clone());

            let outcome: Result<SeedResult, Failure> = async {
                let seeded = DemoCatalog::load(&products, &chunks)
                    .await
                    .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
                let verification = DemoCatalog::verify(&products, &chunks)
                    .await
                    .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;
                if verification.all_present {
                    Ok(seeded)
                } else {
                    Err(("seed_verification", verification_message(&verification.checks), 6u8))
                }
            }
            .await;

            pool.close().await;
            outcome
        })
    });

    match result {
        Ok(seeded) => CommandResult::success("seed", seed_message(seeded)),
        Err(failure) => CommandResult::from_failure("seed", failure),
    }
}

fn seed_message(seeded: SeedResult) -> String {
    format!(
        "demo catalog loaded: {} products, {} chunks",
        seeded.product_count, seeded.chunk_count
    )
}

fn verification_message(checks: &[(&'static str, bool)]) -> String {
    let failed = checks
        .iter()
        .filter_map(|(check, passed)| (!passed).then_some(*check))
        .collect::<Vec<_>>();
    if failed.is_empty() {
        "some seed data failed to load".to_string()
    } else {
        format!("seed verification failed for products: {}", failed.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use parkwise_db::SeedResult;

    use super::{seed_message, verification_message};

    #[test]
    fn verification_message_names_failed_products() {
        let checks = [("PK-001", true), ("PK-004", false), ("PK-009", false)];
        assert_eq!(
            verification_message(&checks),
            "seed verification failed for products: PK-004, PK-009"
        );
    }

    #[test]
    fn verification_message_falls_back_without_labels() {
        assert_eq!(verification_message(&[("PK-001", true)]), "some seed data failed to load");
    }

    #[test]
    fn seed_message_reports_counts() {
        let seeded = SeedResult { product_count: 40, chunk_count: 160 };
        assert_eq!(seed_message(seeded), "demo catalog loaded: 40 products, 160 chunks");
    }
}

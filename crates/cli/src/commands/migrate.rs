use parkwise_core::config::LoadOptions;

use crate::commands::{load_config, open_database, runtime, CommandResult, Failure};

pub fn run(options: LoadOptions) -> CommandResult {
    let result = load_config(options).and_then(|config| {
        runtime()?.block_on(async {
            let pool = open_database(&config).await?;
            pool.close().await;
            Ok::<(), Failure>(())
        })
    });

    match result {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err(failure) => CommandResult::from_failure("migrate", failure),
    }
}

pub mod config;
pub mod filter;
pub mod migrate;
pub mod recommend;
pub mod seed;

use std::sync::Arc;

use parkwise_core::config::{AppConfig, LoadOptions};
use parkwise_db::{
    connect_with_settings, migrations, ChunkRepository, DbPool, DemoCatalog,
    InMemoryChunkRepository, InMemoryProductRepository, ProductRepository, SqlChunkRepository,
    SqlProductRepository,
};
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Runtime;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
}

/// Failure tuple threaded through command bodies: class, message, exit code.
pub(crate) type Failure = (&'static str, String, u8);

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            result: None,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    /// Success carrying a structured `result` document.
    pub fn success_with<T: Serialize>(
        command: &str,
        message: impl Into<String>,
        result: &T,
    ) -> Self {
        match serde_json::to_value(result) {
            Ok(value) => {
                let payload = CommandOutcome {
                    command: command.to_string(),
                    status: "ok".to_string(),
                    error_class: None,
                    message: message.into(),
                    result: Some(value),
                };
                Self { exit_code: 0, output: serialize_payload(payload) }
            }
            Err(error) => Self::failure(command, "serialization", error.to_string(), 1),
        }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            result: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    pub(crate) fn from_failure(command: &str, (error_class, message, exit_code): Failure) -> Self {
        Self::failure(command, error_class, message, exit_code)
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) fn load_config(options: LoadOptions) -> Result<AppConfig, Failure> {
    AppConfig::load(options)
        .map_err(|error| ("config_validation", format!("configuration issue: {error}"), 2u8))
}

pub(crate) fn runtime() -> Result<Runtime, Failure> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|error| {
            ("runtime_init", format!("failed to initialize async runtime: {error}"), 3u8)
        })
}

/// Connects to the configured database and applies pending migrations.
pub(crate) async fn open_database(config: &AppConfig) -> Result<DbPool, Failure> {
    let pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
    migrations::run_pending(&pool).await.map_err(|error| ("migration", error.to_string(), 5u8))?;
    Ok(pool)
}

/// Product and chunk repositories backing a pipeline run.
pub(crate) struct Catalog {
    pub products: Arc<dyn ProductRepository>,
    pub chunks: Arc<dyn ChunkRepository>,
    pool: Option<DbPool>,
}

impl Catalog {
    /// The built-in demo catalog held in memory, or the configured database.
    pub async fn open(config: &AppConfig, demo: bool) -> Result<Self, Failure> {
        if demo {
            let products = DemoCatalog::products()
                .map_err(|error| ("catalog", error.to_string(), 4u8))?;
            return Ok(Self {
                products: Arc::new(InMemoryProductRepository::with_products(products)),
                chunks: Arc::new(InMemoryChunkRepository::with_chunks(DemoCatalog::chunks())),
                pool: None,
            });
        }

        let pool = open_database(config).await?;
        Ok(Self {
            products: Arc::new(SqlProductRepository::new(pool.clone())),
            chunks: Arc::new(SqlChunkRepository::new(pool.clone())),
            pool: Some(pool),
        })
    }

    pub async fn close(self) {
        if let Some(pool) = self.pool {
            pool.close().await;
        }
    }
}

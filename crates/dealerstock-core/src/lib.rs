pub mod app_config;
pub mod config;
pub mod dealer;
pub mod vehicle;

use thiserror::Error;

pub use app_config::{AppConfig, ApiCredentials, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use dealer::{load_dealer, parse_dealer, DataSource, DealerConfig, DealerFile, SourceConfig, SourceKind};
pub use vehicle::{
    Category, Dimensions, EngineSpec, LeasingTerms, Power, Price, Vehicle, VehicleDetail,
    VehiclesResponse,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for env var {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read dealer config {path}: {source}")]
    DealerFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse dealer config: {0}")]
    DealerFileParse(#[source] serde_yaml::Error),

    #[error("dealer config validation failed: {0}")]
    Validation(String),
}

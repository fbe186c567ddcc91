/**
 * Crate-wide recoverable error type.
 *
 * Per spec.md's error-handling design, malformed payloads and out-of-range
 * ids are never fatal: callers log at `warn` and drop the offending
 * message. Genuinely unrecoverable failures (an internal channel hanging
 * up) are still handled the teacher's way, via `unwrap_or_exit!`.
 */
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("malformed payload on topic {topic}: {source}")]
    MalformedPayload {
        topic: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown car id {0}")]
    UnknownCar(u8),

    #[error("unknown floor id {0}")]
    UnknownFloor(u8),

    #[error("inconsistent state: {0}")]
    InconsistentState(String),

    #[error("car {car} would exceed capacity {max} (attempted {attempted})")]
    OverfullCar { car: u8, max: u8, attempted: u8 },

    #[error("failed to read configuration: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

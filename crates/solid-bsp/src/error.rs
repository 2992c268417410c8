use nalgebra::Point3;
use thiserror::Error;

/// Fatal conditions that stop a compile.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("material `{material}` has no `{key}` metadata")]
    MissingMaterialMetadata { material: String, key: &'static str },

    #[error("model {model} has mixed contents (material `{material}`)")]
    MixedContents { model: u32, material: String },

    #[error("map exceeds maximum extents of {max_extent}")]
    ExceedsMaxExtents { max_extent: f64 },

    #[error("map leaked from entity `{entity}` ({} leak point(s))", points.len())]
    Leak {
        entity: String,
        points: Vec<Point3<f64>>,
    },

    #[error("map has {count} areas, the limit is {max}")]
    TooManyAreas { count: usize, max: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("compile aborted")]
    Aborted,

    #[error("compile worker panicked")]
    WorkerPanicked,
}

/// Errors reading or validating a [`CompileConfig`](crate::CompileConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("`{field}` must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("`tree_contents` must include at least one visible contents class")]
    NoTreeContents,
}

impl From<ConfigError> for CompileError {
    fn from(err: ConfigError) -> Self {
        CompileError::InvalidConfig(err.to_string())
    }
}

pub type Result<T, E = CompileError> = std::result::Result<T, E>;

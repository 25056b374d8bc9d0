use common::media::Rejection;
use common::storage::StorageError;
use sea_orm::DbErr;
use thiserror::Error;

use super::report::OperationStage;

#[derive(Debug, Error)]
pub enum AssetError {
    /// Bad type or size. Raised before any network or storage call.
    #[error("{0}")]
    ValidationRejected(Rejection),

    #[error("object store failure while {stage}: {source}")]
    Storage {
        stage: OperationStage,
        #[source]
        source: StorageError,
    },

    #[error("catalog failure while {stage}: {source}")]
    Catalog {
        stage: OperationStage,
        #[source]
        source: DbErr,
    },

    #[error("{0}")]
    NotFound(String),

    /// Another session changed the primary image first.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidRequest(String),
}

impl AssetError {
    /// Mapper for object store results at a given stage.
    pub fn storage(stage: OperationStage) -> impl FnOnce(StorageError) -> Self {
        move |source| Self::Storage { stage, source }
    }

    /// Mapper for catalog results at a given stage.
    pub fn catalog(stage: OperationStage) -> impl FnOnce(DbErr) -> Self {
        move |source| Self::Catalog { stage, source }
    }

    /// Stage the operation was in when it failed.
    pub fn stage(&self) -> OperationStage {
        match self {
            Self::ValidationRejected(_) | Self::NotFound(_) | Self::InvalidRequest(_) => {
                OperationStage::Validating
            }
            Self::Storage { stage, .. } | Self::Catalog { stage, .. } => *stage,
            Self::Conflict(_) => OperationStage::Cataloging,
        }
    }

    /// Client-facing text. Storage and catalog failures name the stage only;
    /// the backend cause goes to the log.
    pub fn public_message(&self) -> String {
        match self {
            Self::Storage { stage, .. } => format!("Object store failure while {stage}"),
            Self::Catalog { stage, .. } => format!("Catalog failure while {stage}"),
            other => other.to_string(),
        }
    }

    /// Machine-readable code shared by HTTP errors and per-item batch failures.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ValidationRejected(_) => "VALIDATION_REJECTED",
            Self::Storage { .. } => "STORAGE_FAILURE",
            Self::Catalog { .. } => "CATALOG_FAILURE",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::InvalidRequest(_) => "VALIDATION_ERROR",
        }
    }
}

pub mod keys;
pub mod migrate;
pub mod operations;
pub mod trees;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::Db;
use thiserror::Error;

#[derive(Debug)]
pub struct Store {
    db: Db,
    pub funnel_states: sled::Tree,
    pub questions: sled::Tree,
    pub question_concept_index: sled::Tree,
    pub seen_sets: sled::Tree,
    pub variant_overrides: sled::Tree,
    pub batch_metas: sled::Tree,
    pub schema_meta: sled::Tree,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("not found: entity={entity}, key={key}")]
    NotFound { entity: String, key: String },
    #[error("CAS retry exhausted after {attempts} attempts: entity={entity}, key={key}")]
    CasRetryExhausted {
        entity: String,
        key: String,
        attempts: u32,
    },
    #[error("validation error: {0}")]
    Validation(String),
    #[error("migration error at version {version}: {message}")]
    Migration { version: u32, message: String },
}

impl Store {
    pub fn open(sled_path: &str) -> Result<Self, StoreError> {
        let db = sled::open(sled_path)?;
        let funnel_states = db.open_tree(trees::FUNNEL_STATES)?;
        let questions = db.open_tree(trees::QUESTIONS)?;
        let question_concept_index = db.open_tree(trees::QUESTION_CONCEPT_INDEX)?;
        let seen_sets = db.open_tree(trees::SEEN_SETS)?;
        let variant_overrides = db.open_tree(trees::VARIANT_OVERRIDES)?;
        let batch_metas = db.open_tree(trees::BATCH_METAS)?;
        let schema_meta = db.open_tree(trees::SCHEMA_META)?;

        Ok(Self {
            db,
            funnel_states,
            questions,
            question_concept_index,
            seen_sets,
            variant_overrides,
            batch_metas,
            schema_meta,
        })
    }

    pub fn run_migrations(&self) -> Result<(), StoreError> {
        migrate::run(self)
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    pub fn raw_db(&self) -> &Db {
        &self.db
    }

    pub(crate) fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(value)?)
    }

    pub(crate) fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

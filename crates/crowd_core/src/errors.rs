//! Error types for the Crowdcast core pipeline

use crate::gbdt::ModelError;
use std::path::PathBuf;
use thiserror::Error;

/// A date cell that none of the accepted layouts could parse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unrecognised date: {input:?}")]
pub struct DateParseError {
    pub input: String,
}

/// Errors raised while reading the raw update / enrollment tables.
#[derive(Error, Debug)]
pub enum LoaderError {
    /// The file could not be opened or read.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The CSV reader rejected the file.
    #[error("Malformed CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A row did not carry the fixed positional column count.
    #[error("{path}, line {line}: expected {expected} columns, got {found}")]
    ColumnCount {
        path: PathBuf,
        line: u64,
        expected: usize,
        found: usize,
    },

    /// A numeric cell was not a finite, non-negative number.
    #[error("{path}, line {line}, column {column}: invalid count {value:?}")]
    InvalidNumber {
        path: PathBuf,
        line: u64,
        column: &'static str,
        value: String,
    },

    /// The date cell could not be parsed.
    #[error("{path}, line {line}: {source}")]
    InvalidDate {
        path: PathBuf,
        line: u64,
        #[source]
        source: DateParseError,
    },
}

/// Errors that can occur in the core pipeline
#[derive(Error, Debug)]
pub enum CoreError {
    /// Loading the source tables failed
    #[error(transparent)]
    Loader(#[from] LoaderError),

    /// Classifier failed to load, validate or score
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Classifier and feature schema disagree on the vector length
    #[error("Schema mismatch: model expects {model} features, schema has {schema}")]
    SchemaMismatch { model: usize, schema: usize },

    /// Feature schema is unusable
    #[error("Invalid feature schema: {0}")]
    InvalidSchema(String),

    /// Stored hash does not match the model contents
    #[error("Model hash mismatch: expected {expected}, computed {computed}")]
    HashMismatch { expected: String, computed: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

// Path: crates/syncreg/src/error.rs
//! Error types for the coverage registry.

use syncreg_storage::StorageError;
use thiserror::Error;

/// A trait for assigning a stable, machine-readable string code to an error.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// Malformed persisted registry bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// The stream does not start with the registry signature.
    #[error("Bad format signature: expected {expected:#010x}, got {got:#010x}")]
    BadSignature {
        /// The signature this build writes.
        expected: u32,
        /// The signature found in the stream.
        got: u32,
    },
    /// The stream holds a different number of buckets than the registry was configured for.
    #[error("Bucket count {got} does not match the configured {expected}")]
    BucketCount {
        /// Configured maximum dimensionality.
        expected: usize,
        /// Bucket count found in the stream.
        got: u64,
    },
    /// A bucket record was written for a different dimensionality than the slot it is loaded into.
    #[error("Dimension mismatch: slot holds {expected}-cubes, record has {got}")]
    DimensionMismatch {
        /// Dimensionality of the slot.
        expected: usize,
        /// Dimensionality found in the record.
        got: u64,
    },
    /// The cube count is beyond the accepted maximum.
    #[error("Cube count out of range: {0}")]
    CubeCount(u64),
    /// The value pool size is beyond the accepted maximum.
    #[error("Value count out of range: {0}")]
    ValueCount(u64),
    /// A value-index entry points outside the value pool or is malformed.
    #[error("Value index entry {offset} out of range: start {start}, count {count}")]
    ValueIndex {
        /// Offset of the pair in the value index.
        offset: usize,
        /// Stored start.
        start: i64,
        /// Stored count.
        count: i64,
    },
    /// A referenced value run is not strictly ascending.
    #[error("Values at {start}..{end} are not sorted and unique")]
    UnsortedValues {
        /// First index of the run.
        start: usize,
        /// One past the last index of the run.
        end: usize,
    },
    /// The stream ended before the record was complete.
    #[error("Unexpected end of stream")]
    UnexpectedEof,
    /// A variable-length integer was malformed or does not fit its target type.
    #[error("Invalid varint: {0}")]
    Varint(String),
    /// A boolean byte was neither 0 nor 1.
    #[error("Invalid bool byte: {0:#04x}")]
    InvalidBool(u8),
    /// An attribute id was not valid UTF-8.
    #[error("Attribute id is not valid UTF-8")]
    InvalidUtf8,
}

impl ErrorCode for FormatError {
    fn code(&self) -> &'static str {
        match self {
            Self::BadSignature { .. } => "FORMAT_BAD_SIGNATURE",
            Self::BucketCount { .. } => "FORMAT_BUCKET_COUNT",
            Self::DimensionMismatch { .. } => "FORMAT_DIMENSION_MISMATCH",
            Self::CubeCount(_) => "FORMAT_CUBE_COUNT",
            Self::ValueCount(_) => "FORMAT_VALUE_COUNT",
            Self::ValueIndex { .. } => "FORMAT_VALUE_INDEX",
            Self::UnsortedValues { .. } => "FORMAT_UNSORTED_VALUES",
            Self::UnexpectedEof => "FORMAT_UNEXPECTED_EOF",
            Self::Varint(_) => "FORMAT_VARINT",
            Self::InvalidBool(_) => "FORMAT_INVALID_BOOL",
            Self::InvalidUtf8 => "FORMAT_INVALID_UTF8",
        }
    }
}

/// Errors surfaced by registry load/save and persistence.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The persisted bytes could not be decoded.
    #[error("Format error: {0}")]
    Format(#[from] FormatError),
    /// Reading or writing the byte stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The backing blob store failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    /// A background persistence task could not be joined.
    #[error("Persistence task failed: {0}")]
    Task(String),
}

impl ErrorCode for RegistryError {
    fn code(&self) -> &'static str {
        match self {
            Self::Format(e) => e.code(),
            Self::Io(_) => "REGISTRY_IO",
            Self::Storage(_) => "REGISTRY_STORAGE",
            Self::Task(_) => "REGISTRY_TASK",
        }
    }
}

/// Errors raised while reading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The TOML document could not be parsed.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A field holds a value outside its accepted range.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        match self {
            Self::Parse(_) => "CONFIG_PARSE",
            Self::Invalid(_) => "CONFIG_INVALID",
        }
    }
}

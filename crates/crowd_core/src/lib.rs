//! Crowdcast Core
//!
//! The shared pipeline behind both the offline trainer and the online
//! service: table loading, the outer-join merge, district normalisation,
//! tertile crowd-level bucketing, schema-aligned feature encoding and
//! deterministic fixed-point GBDT inference.
//!
//! Every operation here is a pure, synchronous transformation over in-memory
//! data. Nothing in this crate holds global state.

pub mod artifacts;
pub mod bucket;
pub mod classifier;
pub mod dates;
pub mod districts;
pub mod errors;
pub mod features;
pub mod gbdt;
pub mod loader;
pub mod merge;
pub mod records;
pub mod serde_canon;

pub use artifacts::{AlignedPrediction, ModelArtifacts};
pub use bucket::{assign_crowd_levels, quantile_buckets, quantile_edges, Buckets, CrowdBuckets};
pub use classifier::{ClassProbabilities, CrowdPredictor, Prediction};
pub use dates::parse_date;
pub use districts::DistrictNormalizer;
pub use errors::{CoreError, DateParseError, LoaderError, Result};
pub use features::{
    encode, encode_batch, AgeCounts, EncodedFeatures, FeatureRecord, FeatureSchema,
    NUMERIC_COLUMNS,
};
pub use gbdt::{GbdtClassifier, ModelError};
pub use loader::{load_enrollments, load_tables, load_updates};
pub use merge::{load_merged, merge_tables};
pub use records::{
    CompositeKey, CrowdLevel, MergedRecord, MergedTable, RawEnrollmentRecord, RawUpdateRecord,
    WEEKDAYS,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Deterministic multi-class GBDT inference
//!
//! - Integer-only tree traversal and score accumulation at a fixed scale
//! - Canonical JSON serialization (sorted keys) with blake3 hashing
//! - Structural validation on load
//!
//! # Model Format
//!
//! ```json
//! {
//!   "base_scores": [0, 0, 0],
//!   "classes": ["Low", "Medium", "High"],
//!   "feature_count": 12,
//!   "scale": 1000000,
//!   "trees": [
//!     [{"nodes": [{"feature_idx":9,"id":0,"leaf":null,"left":1,"right":2,"threshold":12000000}, ...],
//!       "weight": 50000}],
//!     [...],
//!     [...]
//!   ],
//!   "version": 1
//! }
//! ```

pub mod model;
pub mod tree;

pub use model::{softmax, to_fixed, GbdtClassifier, ModelError, DEFAULT_CLASSES, FORMAT_VERSION, SCALE};
pub use tree::{Node, Tree};

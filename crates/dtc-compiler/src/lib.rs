//! PMML decision-tree compiler: extract, flatten, encode.
//!
//! Reads the data dictionary and the tree (or segmentation of trees) of a
//! PMML document, flattens every tree into an index-addressed node arena,
//! and encodes the result into the fixed little-endian layout that the
//! embedded inference runtime indexes directly.

mod artifact;
mod assemble;
mod config;
mod error;
mod flatten;
mod model;
mod node;
mod operator;
mod pmml;
mod schema;

pub use artifact::{HEADER_SIZE, NODE_RECORD_SIZE};
pub use config::{Compilation, CompileConfig, Parallelism, ScoreMode};
pub use error::CompileError;
pub use flatten::flatten_tree;
pub use model::Model;
pub use node::{ClassIndex, FeatureIndex, FlatTree, NodeIndex, TreeNode};
pub use operator::Operator;
pub use pmml::{Document, Element};
pub use schema::{Feature, ModelSchema, ScalarType, normalize_name};

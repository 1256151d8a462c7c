//! Fixed-layout binary artifact consumed by the inference runtime.
//!
//! All integers are little-endian and nothing is padded:
//!
//! | Section  | Field           | Type  |
//! |----------|-----------------|-------|
//! | header   | `num_classes`   | `u16` |
//! |          | `num_features`  | `u16` |
//! |          | `num_trees`     | `u16` |
//! | per tree | `node_count`    | `u16` |
//! | per node | `operator`      | `u16` (0 for leaves) |
//! |          | `feature_index` | `u16` (0 for leaves) |
//! |          | `class_index`   | `i16` (-1 for splits) |
//! |          | `left_index`    | `i32` (-1 for leaves) |
//! |          | `right_index`   | `i32` (-1 for leaves) |
//! |          | `threshold`     | `f64` (0.0 for leaves) |

use std::io::Write;
use std::path::Path;

use tracing::{debug, info, instrument};

use crate::error::CompileError;
use crate::model::{Model, check_u16};
use crate::node::{ClassIndex, FeatureIndex, FlatTree, NodeIndex, TreeNode};
use crate::operator::Operator;

/// Size in bytes of the model header.
pub const HEADER_SIZE: usize = 6;

/// Size in bytes of one node record.
pub const NODE_RECORD_SIZE: usize = 22;

const NO_CLASS: i16 = -1;
const NO_CHILD: i32 = -1;

fn child_to_wire(index: NodeIndex) -> Result<i32, CompileError> {
    i32::try_from(index.index()).map_err(|_| CompileError::CapacityExceeded {
        what: "node",
        count: index.index() + 1,
        max: i32::MAX as usize,
    })
}

fn encode_node(buf: &mut Vec<u8>, node: &TreeNode) -> Result<(), CompileError> {
    let (operator, feature, class, left, right, threshold) = match *node {
        TreeNode::Internal {
            operator,
            feature,
            threshold,
            left,
            right,
        } => (
            operator.code(),
            feature.get(),
            NO_CLASS,
            child_to_wire(left)?,
            child_to_wire(right)?,
            threshold,
        ),
        TreeNode::Leaf { class } => (0, 0, class.get(), NO_CHILD, NO_CHILD, 0.0),
    };
    buf.extend_from_slice(&operator.to_le_bytes());
    buf.extend_from_slice(&feature.to_le_bytes());
    buf.extend_from_slice(&class.to_le_bytes());
    buf.extend_from_slice(&left.to_le_bytes());
    buf.extend_from_slice(&right.to_le_bytes());
    buf.extend_from_slice(&threshold.to_le_bytes());
    Ok(())
}

/// Sequential little-endian reader over artifact bytes.
struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn take<const N: usize>(&mut self, what: &str) -> Result<[u8; N], CompileError> {
        let end = self.offset + N;
        let chunk = self.bytes.get(self.offset..end).ok_or_else(|| {
            CompileError::malformed_artifact(format!(
                "truncated at byte {} while reading {what}",
                self.offset
            ))
        })?;
        let mut out = [0u8; N];
        out.copy_from_slice(chunk);
        self.offset = end;
        Ok(out)
    }

    fn u16(&mut self, what: &str) -> Result<u16, CompileError> {
        self.take(what).map(u16::from_le_bytes)
    }

    fn i16(&mut self, what: &str) -> Result<i16, CompileError> {
        self.take(what).map(i16::from_le_bytes)
    }

    fn i32(&mut self, what: &str) -> Result<i32, CompileError> {
        self.take(what).map(i32::from_le_bytes)
    }

    fn f64(&mut self, what: &str) -> Result<f64, CompileError> {
        self.take(what).map(f64::from_le_bytes)
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }
}

fn decode_node(
    reader: &mut ByteReader<'_>,
    tree_id: usize,
    node_id: usize,
    num_classes: u16,
    num_features: u16,
) -> Result<TreeNode, CompileError> {
    let operator = reader.u16("operator")?;
    let feature = reader.u16("feature_index")?;
    let class = reader.i16("class_index")?;
    let left = reader.i32("left_index")?;
    let right = reader.i32("right_index")?;
    let threshold = reader.f64("threshold")?;

    let malformed = |what: String| {
        CompileError::malformed_artifact(format!("tree {tree_id}, node {node_id}: {what}"))
    };

    if left == NO_CHILD {
        if right != NO_CHILD || operator != 0 || feature != 0 || threshold.to_bits() != 0 {
            return Err(malformed("leaf record carries split fields".into()));
        }
        if class < 0 || class as u16 >= num_classes {
            return Err(malformed(format!("class {class} outside 0..{num_classes}")));
        }
        return Ok(TreeNode::Leaf {
            class: ClassIndex::try_from_usize(class as usize)?,
        });
    }

    if class != NO_CLASS {
        return Err(malformed(format!("split record carries class {class}")));
    }
    let operator = Operator::from_code(operator)
        .ok_or_else(|| malformed(format!("unknown operator code {operator}")))?;
    if feature >= num_features {
        return Err(malformed(format!("feature {feature} outside 0..{num_features}")));
    }
    let child = |raw: i32| {
        usize::try_from(raw)
            .map(NodeIndex::new)
            .map_err(|_| malformed(format!("negative child index {raw}")))
    };
    Ok(TreeNode::Internal {
        operator,
        feature: FeatureIndex::new(feature),
        threshold,
        left: child(left)?,
        right: child(right)?,
    })
}

impl Model {
    /// Encode the model into its binary layout.
    ///
    /// The output depends only on the model, so encoding the same model
    /// twice yields identical bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::CapacityExceeded`] when a count does not fit
    /// its field.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CompileError> {
        let mut buf =
            Vec::with_capacity(HEADER_SIZE + self.n_trees() * 2 + self.n_nodes() * NODE_RECORD_SIZE);
        buf.extend_from_slice(&self.num_classes().to_le_bytes());
        buf.extend_from_slice(&self.num_features().to_le_bytes());
        buf.extend_from_slice(&check_u16("tree", self.n_trees())?.to_le_bytes());

        for tree in self.trees() {
            buf.extend_from_slice(&check_u16("node", tree.len())?.to_le_bytes());
            for node in tree.nodes() {
                encode_node(&mut buf, node)?;
            }
        }
        Ok(buf)
    }

    /// Decode a model from its binary layout.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::MalformedArtifact`] when the bytes are
    /// truncated, carry trailing data, break a record convention, or
    /// describe a tree whose links are not a forward-only tree.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CompileError> {
        let mut reader = ByteReader::new(bytes);
        let num_classes = reader.u16("num_classes")?;
        let num_features = reader.u16("num_features")?;
        let num_trees = reader.u16("num_trees")?;
        if num_trees == 0 {
            return Err(CompileError::malformed_artifact("artifact declares no trees"));
        }

        let mut trees = Vec::with_capacity(usize::from(num_trees));
        for tree_id in 0..usize::from(num_trees) {
            let node_count = usize::from(reader.u16("node_count")?);
            let nodes = (0..node_count)
                .map(|node_id| decode_node(&mut reader, tree_id, node_id, num_classes, num_features))
                .collect::<Result<Vec<_>, _>>()?;
            trees.push(FlatTree::from_nodes(nodes));
        }

        if reader.remaining() != 0 {
            return Err(CompileError::malformed_artifact(format!(
                "{} trailing bytes after the last tree",
                reader.remaining()
            )));
        }

        Model::new(usize::from(num_classes), usize::from(num_features), trees)
    }

    /// Encode the model and write it to `path`.
    ///
    /// The whole artifact is encoded in memory, written to a temporary file
    /// next to `path` and renamed into place, so a failed save never leaves
    /// a partial artifact behind.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`CompileError::CapacityExceeded`] | a count does not fit its field |
    /// | [`CompileError::WriteFailed`] | creating, writing or renaming the file failed |
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CompileError> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;

        let write_failed = |source: std::io::Error| CompileError::WriteFailed {
            path: path.to_path_buf(),
            source,
        };
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut staging = tempfile::NamedTempFile::new_in(dir).map_err(write_failed)?;
        staging.write_all(&bytes).map_err(write_failed)?;
        staging.as_file().sync_all().map_err(write_failed)?;
        staging.persist(path).map_err(|e| write_failed(e.error))?;

        info!(
            size_bytes = bytes.len(),
            n_trees = self.n_trees(),
            n_nodes = self.n_nodes(),
            "artifact written"
        );
        Ok(())
    }

    /// Read and decode an artifact file.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`CompileError::ReadArtifact`] | the file cannot be read |
    /// | [`CompileError::MalformedArtifact`] | the bytes do not follow the layout |
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CompileError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| CompileError::ReadArtifact {
            path: path.to_path_buf(),
            source: e,
        })?;
        let model = Self::from_bytes(&bytes)?;
        debug!(
            size_bytes = bytes.len(),
            n_trees = model.n_trees(),
            num_features = model.num_features(),
            num_classes = model.num_classes(),
            "artifact loaded"
        );
        Ok(model)
    }
}

use crate::error::CompileError;
use crate::node::FlatTree;

/// A compiled model: header counts plus the flattened trees in ensemble order.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Model {
    num_classes: u16,
    num_features: u16,
    trees: Vec<FlatTree>,
}

impl Model {
    /// Create a model, checking the counts against the artifact field widths
    /// and every tree against [`FlatTree::validate`].
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`CompileError::CapacityExceeded`] | classes, features or trees exceed 65535 |
    /// | [`CompileError::InvalidSchema`] | `trees` is empty |
    /// | [`CompileError::MalformedArtifact`] | a tree is empty or its links are not a forward-only tree |
    pub fn new(
        n_classes: usize,
        n_features: usize,
        trees: Vec<FlatTree>,
    ) -> Result<Self, CompileError> {
        if trees.is_empty() {
            return Err(CompileError::invalid_schema("model contains no trees"));
        }
        check_u16("tree", trees.len())?;
        for (tree_id, tree) in trees.iter().enumerate() {
            tree.validate().map_err(|e| match e {
                CompileError::MalformedArtifact { reason } => {
                    CompileError::malformed_artifact(format!("tree {tree_id}: {reason}"))
                }
                other => other,
            })?;
        }
        Ok(Self {
            num_classes: check_u16("class", n_classes)?,
            num_features: check_u16("feature", n_features)?,
            trees,
        })
    }

    /// Return the number of classes.
    #[must_use]
    pub fn num_classes(&self) -> u16 {
        self.num_classes
    }

    /// Return the number of features.
    #[must_use]
    pub fn num_features(&self) -> u16 {
        self.num_features
    }

    /// Return the trees in ensemble order.
    #[must_use]
    pub fn trees(&self) -> &[FlatTree] {
        &self.trees
    }

    /// Return the number of trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Return the total number of nodes across all trees.
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.trees.iter().map(FlatTree::len).sum()
    }
}

pub(crate) fn check_u16(what: &'static str, count: usize) -> Result<u16, CompileError> {
    u16::try_from(count).map_err(|_| CompileError::CapacityExceeded {
        what,
        count,
        max: usize::from(u16::MAX),
    })
}

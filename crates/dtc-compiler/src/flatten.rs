//! Recursive flattening of a PMML tree into a [`FlatTree`].
//!
//! A PMML split is a parent `Node` with two child `Node`s, each guarded by
//! the predicate of one branch. The parent is appended first, then the left
//! subtree, then the right subtree, so every child index is greater than its
//! parent's and index 0 is always the root.

use tracing::trace;

use crate::config::ScoreMode;
use crate::error::CompileError;
use crate::node::{ClassIndex, FlatTree, NodeIndex, TreeNode};
use crate::operator::Operator;
use crate::pmml::Element;
use crate::schema::{ModelSchema, normalize_name};

/// Largest node count the 16-bit `node_count` field can describe.
const MAX_NODES: usize = u16::MAX as usize;

/// Flatten the tree rooted at a PMML `Node` element.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`CompileError::UnsupportedTreeShape`] | a split has other than two child nodes |
/// | [`CompileError::InvalidSchema`] | a guard, threshold or leaf score is missing or unusable |
/// | [`CompileError::FeatureNotFound`] | a guard names an undeclared feature |
/// | [`CompileError::UnsupportedOperator`] | a guard operator has no runtime code |
/// | [`CompileError::CapacityExceeded`] | the tree has more than 65535 nodes |
pub fn flatten_tree(
    root: &Element,
    schema: &ModelSchema,
    score_mode: ScoreMode,
) -> Result<FlatTree, CompileError> {
    let mut flattener = Flattener {
        schema,
        score_mode,
        nodes: Vec::new(),
    };
    flattener.run(root)?;
    Ok(FlatTree::from_nodes(flattener.nodes))
}

/// The `(field, operator, value)` triple of a branch predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Guard<'a> {
    field: &'a str,
    operator: &'a str,
    value: &'a str,
}

/// Read the predicate guarding a branch.
///
/// A compound guard contributes its first simple predicate that is not an
/// `isMissing` check.
fn guard_of(branch: &Element) -> Result<Option<Guard<'_>>, CompileError> {
    let predicate = match branch.child("CompoundPredicate") {
        Some(compound) => compound
            .children_named("SimplePredicate")
            .find(|p| p.attribute("operator") != Some("isMissing")),
        None => branch.child("SimplePredicate"),
    };
    predicate
        .map(|p| {
            Ok(Guard {
                field: p.required_attribute("field")?,
                operator: p.required_attribute("operator")?,
                value: p.required_attribute("value")?,
            })
        })
        .transpose()
}

/// Parse a split threshold; only finite values survive the wire format unchanged.
fn parse_threshold(guard: &Guard<'_>) -> Result<f64, CompileError> {
    match guard.value.trim().parse::<f64>() {
        Ok(threshold) if threshold.is_finite() => Ok(threshold),
        _ => Err(CompileError::invalid_schema(format!(
            "threshold \"{}\" of field \"{}\" is not a finite number",
            guard.value, guard.field
        ))),
    }
}

struct Flattener<'a> {
    schema: &'a ModelSchema,
    score_mode: ScoreMode,
    nodes: Vec<TreeNode>,
}

/// Which child link of a split a pending branch fills in.
#[derive(Debug, Clone, Copy)]
enum Side {
    Left,
    Right,
}

/// A branch waiting to be placed, and the link of its parent split that points at it.
struct Pending<'e> {
    branch: &'e Element,
    parent: NodeIndex,
    side: Side,
}

impl Flattener<'_> {
    fn push(&mut self, node: TreeNode) -> Result<NodeIndex, CompileError> {
        if self.nodes.len() >= MAX_NODES {
            return Err(CompileError::CapacityExceeded {
                what: "node",
                count: self.nodes.len() + 1,
                max: MAX_NODES,
            });
        }
        self.nodes.push(node);
        Ok(NodeIndex::new(self.nodes.len() - 1))
    }

    /// Flatten the tree under `root` in pre-order.
    ///
    /// Pending branches live on an explicit stack so tree depth is bounded
    /// by the node limit, not by the call stack. The right branch is pushed
    /// before the left one, so a whole left subtree is placed before its
    /// sibling.
    fn run<'e>(&mut self, root: &'e Element) -> Result<(), CompileError> {
        let mut pending: Vec<Pending<'e>> = Vec::new();
        self.split(root, &mut pending)?;

        while let Some(Pending {
            branch,
            parent,
            side,
        }) = pending.pop()
        {
            let start = NodeIndex::new(self.nodes.len());
            if let TreeNode::Internal { left, right, .. } = &mut self.nodes[parent.index()] {
                match side {
                    Side::Left => *left = start,
                    Side::Right => *right = start,
                }
            }

            if branch.child("Node").is_some() {
                self.split(branch, &mut pending)?;
            } else {
                let class = self.leaf_class(branch)?;
                self.push(TreeNode::Leaf { class })?;
                trace!(node = %start, %class, "leaf flattened");
            }
        }
        Ok(())
    }

    /// Append the split described by `element` and queue both of its branches.
    ///
    /// Child links are placeholders until the branches are placed.
    fn split<'e>(
        &mut self,
        element: &'e Element,
        pending: &mut Vec<Pending<'e>>,
    ) -> Result<(), CompileError> {
        let branches: Vec<&Element> = element.children_named("Node").collect();
        let &[first, second] = branches.as_slice() else {
            return Err(CompileError::UnsupportedTreeShape {
                children: branches.len(),
            });
        };

        let guard = guard_of(first)?
            .ok_or_else(|| CompileError::invalid_schema("split branch carries no predicate"))?;
        if let Ok(Some(other)) = guard_of(second)
            && normalize_name(other.field) != normalize_name(guard.field)
        {
            trace!(
                left = guard.field,
                right = other.field,
                "branches of one split test different fields"
            );
        }

        let feature = self.schema.feature_index(guard.field)?;
        let operator = Operator::from_pmml(guard.operator)?;
        let threshold = parse_threshold(&guard)?;

        let current = self.push(TreeNode::Internal {
            operator,
            feature,
            threshold,
            left: NodeIndex::new(0),
            right: NodeIndex::new(0),
        })?;
        trace!(node = %current, %operator, %feature, threshold, "split flattened");

        pending.push(Pending {
            branch: second,
            parent: current,
            side: Side::Right,
        });
        pending.push(Pending {
            branch: first,
            parent: current,
            side: Side::Left,
        });
        Ok(())
    }

    fn leaf_class(&self, leaf: &Element) -> Result<ClassIndex, CompileError> {
        let score = leaf.required_attribute("score")?;
        match self.score_mode {
            ScoreMode::Label => self.schema.class_index(score),
            ScoreMode::Numeric => {
                let code: i64 = score.trim().parse().map_err(|_| {
                    CompileError::invalid_schema(format!("leaf score \"{score}\" is not an integer"))
                })?;
                usize::try_from(code)
                    .ok()
                    .filter(|&c| c < self.schema.n_classes())
                    .ok_or_else(|| {
                        CompileError::invalid_schema(format!(
                            "leaf score {code} is outside 0..{}",
                            self.schema.n_classes()
                        ))
                    })
                    .and_then(ClassIndex::try_from_usize)
            }
        }
    }
}

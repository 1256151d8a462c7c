//! Assembly of every tree in a document into a [`Model`].

use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, instrument};

use crate::config::{CompileConfig, Parallelism};
use crate::error::CompileError;
use crate::flatten::flatten_tree;
use crate::model::Model;
use crate::node::FlatTree;
use crate::pmml::{Document, Element};
use crate::schema::ModelSchema;

/// Locate the tree roots of a document in ensemble order.
///
/// A `MiningModel/Segmentation` yields one root per `Segment`; otherwise the
/// document must hold a single top-level `TreeModel`.
fn tree_roots(document: &Document) -> Result<Vec<&Element>, CompileError> {
    let root = document.root();
    if let Some(segmentation) = root.find("MiningModel/Segmentation") {
        let roots = segmentation
            .children_named("Segment")
            .enumerate()
            .map(|(segment, element)| {
                element.find("TreeModel/Node").ok_or_else(|| {
                    CompileError::invalid_schema(format!(
                        "segment {segment} has no <TreeModel> with a root <Node>"
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if roots.is_empty() {
            return Err(CompileError::invalid_schema("segmentation has no segments"));
        }
        debug!(n_segments = roots.len(), "segmentation found");
        Ok(roots)
    } else {
        let tree = root.find("TreeModel/Node").ok_or_else(|| {
            CompileError::invalid_schema("document has neither a segmentation nor a <TreeModel>")
        })?;
        debug!("single tree model found");
        Ok(vec![tree])
    }
}

/// Flatten every tree of the document and build the model header.
///
/// With [`Parallelism::Rayon`] segments are flattened concurrently; the
/// result is collected in segment order and is identical to the sequential
/// result, including which error is reported first.
#[instrument(skip_all)]
pub(crate) fn assemble(
    document: &Document,
    schema: &ModelSchema,
    config: &CompileConfig,
) -> Result<Model, CompileError> {
    let roots = tree_roots(document)?;
    let score_mode = config.score_mode;

    let trees: Vec<FlatTree> = match config.parallelism {
        Parallelism::Sequential => roots
            .into_iter()
            .map(|root| flatten_tree(root, schema, score_mode))
            .collect::<Result<_, _>>()?,
        Parallelism::Rayon => {
            let flattened: Vec<Result<FlatTree, CompileError>> = roots
                .into_par_iter()
                .map(|root| flatten_tree(root, schema, score_mode))
                .collect();
            flattened.into_iter().collect::<Result<_, _>>()?
        }
    };

    for (tree_id, tree) in trees.iter().enumerate() {
        debug!(
            tree_id,
            n_nodes = tree.len(),
            n_leaves = tree.n_leaves(),
            depth = tree.depth(),
            "tree flattened"
        );
    }

    Model::new(schema.n_classes(), schema.n_features(), trees)
}

//! End-to-end tests: PMML fixture -> compile -> artifact -> decode.

use std::path::{Path, PathBuf};

use dtc_compiler::{
    CompileConfig, CompileError, Model, NodeIndex, Operator, Parallelism, ScalarType, TreeNode,
};
use tempfile::TempDir;

/// Path to the test fixture directory.
fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn compile(name: &str) -> Result<dtc_compiler::Compilation, CompileError> {
    CompileConfig::new().compile_file(fixture_path(name))
}

/// Expect an internal node and return `(operator, feature, threshold, left, right)`.
fn split(node: &TreeNode) -> (Operator, usize, f64, usize, usize) {
    match *node {
        TreeNode::Internal {
            operator,
            feature,
            threshold,
            left,
            right,
        } => (operator, feature.index(), threshold, left.index(), right.index()),
        TreeNode::Leaf { .. } => panic!("expected a split, found {node:?}"),
    }
}

fn class(node: &TreeNode) -> usize {
    match node {
        TreeNode::Leaf { class } => class.index(),
        TreeNode::Internal { .. } => panic!("expected a leaf, found {node:?}"),
    }
}

#[test]
fn single_segment_stump_artifact() {
    let compilation = compile("single_split.pmml").unwrap();
    let model = &compilation.model;

    assert_eq!(model.num_classes(), 2);
    assert_eq!(model.num_features(), 1);
    assert_eq!(model.n_trees(), 1);

    let tree = &model.trees()[0];
    assert_eq!(tree.len(), 3);
    assert_eq!(split(&tree.nodes()[0]), (Operator::LessOrEqual, 0, 5.0, 1, 2));
    assert_eq!(class(&tree.nodes()[1]), 0);
    assert_eq!(class(&tree.nodes()[2]), 1);

    let bytes = model.to_bytes().unwrap();
    assert_eq!(&bytes[..6], &[2, 0, 1, 0, 1, 0]);
    assert_eq!(&bytes[6..8], &[3, 0]);
}

#[test]
fn single_tree_model_without_segmentation() {
    let compilation = compile("decision_tree.pmml").unwrap();
    let schema = &compilation.schema;
    let model = &compilation.model;

    let names: Vec<_> = schema.features().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["Glucose", "BMI", "Age"]);
    assert_eq!(schema.features()[0].scalar_type, ScalarType::Integer);
    assert_eq!(schema.features()[1].scalar_type, ScalarType::Real);

    assert_eq!(model.n_trees(), 1);
    let nodes = model.trees()[0].nodes();
    assert_eq!(nodes.len(), 9);
    assert_eq!(split(&nodes[0]), (Operator::LessOrEqual, 0, 127.5, 1, 6));
    assert_eq!(split(&nodes[1]), (Operator::LessOrEqual, 2, 28.5, 2, 3));
    assert_eq!(class(&nodes[2]), 0);
    assert_eq!(split(&nodes[3]), (Operator::LessOrEqual, 1, 26.35, 4, 5));
    assert_eq!(class(&nodes[4]), 0);
    assert_eq!(class(&nodes[5]), 1);
    assert_eq!(split(&nodes[6]), (Operator::LessOrEqual, 1, 29.95, 7, 8));
    assert_eq!(class(&nodes[7]), 0);
    assert_eq!(class(&nodes[8]), 1);
}

#[test]
fn forest_with_compound_guards_and_dashed_names() {
    let compilation = compile("iris_forest.pmml").unwrap();
    let schema = &compilation.schema;
    let model = &compilation.model;

    assert_eq!(
        schema.classes(),
        ["iris_setosa", "iris_versicolor", "iris_virginica"]
    );
    assert_eq!(schema.n_features(), 4);
    assert!(schema.features().iter().all(|f| f.scalar_type == ScalarType::Real));
    assert_eq!(model.num_classes(), 3);
    assert_eq!(model.num_features(), 4);
    assert_eq!(model.n_trees(), 3);

    let first = model.trees()[0].nodes();
    assert_eq!(first.len(), 5);
    assert_eq!(split(&first[0]), (Operator::LessOrEqual, 2, 2.45, 1, 2));
    assert_eq!(class(&first[1]), 0);
    // surrogate guard: the isMissing check is skipped
    assert_eq!(split(&first[2]), (Operator::LessOrEqual, 3, 1.75, 3, 4));
    assert_eq!(class(&first[3]), 1);
    assert_eq!(class(&first[4]), 2);

    let second = model.trees()[1].nodes();
    assert_eq!(second.len(), 7);
    assert_eq!(split(&second[0]), (Operator::LessThan, 3, 0.8, 1, 4));
    assert_eq!(split(&second[1]), (Operator::LessOrEqual, 0, 5.95, 2, 3));
    assert_eq!(split(&second[4]), (Operator::LessOrEqual, 3, 1.65, 5, 6));

    let third = model.trees()[2].nodes();
    assert_eq!(split(&third[0]), (Operator::LessOrEqual, 1, 2.95, 1, 2));
    assert_eq!(class(&third[1]), 2);
    assert_eq!(class(&third[2]), 0);
}

#[test]
fn every_tree_links_forward_and_reaches_every_node() {
    for name in ["single_split.pmml", "decision_tree.pmml", "iris_forest.pmml"] {
        let model = compile(name).unwrap().model;
        for tree in model.trees() {
            tree.validate().unwrap();

            let mut visited = vec![false; tree.len()];
            let mut stack = vec![NodeIndex::new(0)];
            while let Some(index) = stack.pop() {
                assert!(!visited[index.index()], "{name}: node {index} visited twice");
                visited[index.index()] = true;
                if let Some((left, right)) = tree.get(index).unwrap().children() {
                    assert!(left > index && right > index);
                    stack.push(right);
                    stack.push(left);
                }
            }
            assert!(visited.iter().all(|&v| v), "{name}: unreachable node");
        }
    }
}

#[test]
fn artifact_round_trip_and_determinism() {
    let dir = TempDir::new().unwrap();
    let first_path = dir.path().join("first.bin");
    let second_path = dir.path().join("second.bin");

    let first = compile("iris_forest.pmml").unwrap().model;
    let second = CompileConfig::new()
        .with_parallelism(Parallelism::Rayon)
        .compile_file(fixture_path("iris_forest.pmml"))
        .unwrap()
        .model;
    first.save(&first_path).unwrap();
    second.save(&second_path).unwrap();

    let first_bytes = std::fs::read(&first_path).unwrap();
    assert_eq!(first_bytes, std::fs::read(&second_path).unwrap());
    assert_eq!(Model::load(&first_path).unwrap(), first);
}

#[test]
fn three_children_fails_without_artifact() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("never.bin");

    let result = compile("three_children.pmml").and_then(|c| c.model.save(&out));
    let err = result.unwrap_err();
    assert!(matches!(err, CompileError::UnsupportedTreeShape { children: 3 }));
    assert!(!out.exists());
}

#[test]
fn undeclared_feature_fails() {
    let err = compile("unknown_feature.pmml").unwrap_err();
    assert!(matches!(err, CompileError::FeatureNotFound { ref name } if name == "z"));
}

#[test]
fn document_without_namespace_fails() {
    let err = compile("no_namespace.pmml").unwrap_err();
    assert!(matches!(err, CompileError::InvalidSchema { .. }));
}

#[test]
fn missing_input_file_fails() {
    let err = compile("does_not_exist.pmml").unwrap_err();
    assert!(matches!(err, CompileError::ReadDocument { .. }));
}

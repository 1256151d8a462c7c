//! Feature and class metadata extracted from the PMML data dictionary.

use std::fmt;

use tracing::{debug, instrument};

use crate::error::CompileError;
use crate::node::{ClassIndex, FeatureIndex};
use crate::pmml::Document;

/// Scalar type the runtime should assume for a feature value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    /// Floating-point feature (`double` or `float`).
    Real,
    /// Any other continuous feature.
    Integer,
}

impl ScalarType {
    fn from_data_type(data_type: &str) -> Self {
        match data_type {
            "double" | "float" => Self::Real,
            _ => Self::Integer,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Real => f.write_str("real"),
            Self::Integer => f.write_str("integer"),
        }
    }
}

/// An input feature. Its position in [`ModelSchema::features`] is its runtime index.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Feature {
    /// Normalized feature name.
    pub name: String,
    /// Declared scalar type.
    pub scalar_type: ScalarType,
}

/// Normalize an identifier from the document: `-` becomes `_`.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.replace('-', "_")
}

/// Ordered features and class labels of a model.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ModelSchema {
    features: Vec<Feature>,
    classes: Vec<String>,
}

impl ModelSchema {
    /// Build a schema from already-normalized features and class labels.
    #[must_use]
    pub fn new(features: Vec<Feature>, classes: Vec<String>) -> Self {
        Self { features, classes }
    }

    /// Read the `DataDictionary` of a PMML document.
    ///
    /// Continuous fields become features in declaration order; the values of
    /// categorical fields become class labels in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::InvalidSchema`] when the root is not a
    /// namespaced `PMML` element, the data dictionary is absent, or a data
    /// field lacks a required attribute.
    #[instrument(skip_all)]
    pub fn extract(document: &Document) -> Result<Self, CompileError> {
        let root = document.root();
        if root.namespace().is_none() {
            return Err(CompileError::invalid_schema(
                "document root carries no namespace",
            ));
        }
        if root.name() != "PMML" {
            return Err(CompileError::invalid_schema(format!(
                "expected <PMML> root element, found <{}>",
                root.name()
            )));
        }
        let dictionary = root
            .child("DataDictionary")
            .ok_or_else(|| CompileError::invalid_schema("missing <DataDictionary>"))?;

        let mut features = Vec::new();
        let mut classes = Vec::new();
        for field in dictionary.children_named("DataField") {
            match field.required_attribute("optype")? {
                "continuous" => features.push(Feature {
                    name: normalize_name(field.required_attribute("name")?),
                    scalar_type: ScalarType::from_data_type(field.required_attribute("dataType")?),
                }),
                "categorical" => {
                    for value in field.children_named("Value") {
                        classes.push(normalize_name(value.required_attribute("value")?));
                    }
                }
                other => debug!(optype = other, "ignoring data field"),
            }
        }

        debug!(
            n_features = features.len(),
            n_classes = classes.len(),
            "schema extracted"
        );

        Ok(Self { features, classes })
    }

    /// Return the features in runtime index order.
    #[must_use]
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Return the class labels in class code order.
    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Return the number of features.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    /// Return the number of classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Resolve a feature name (normalized before matching) to its index.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`CompileError::FeatureNotFound`] | no feature has that name |
    /// | [`CompileError::CapacityExceeded`] | the index does not fit in 16 bits |
    pub fn feature_index(&self, name: &str) -> Result<FeatureIndex, CompileError> {
        let name = normalize_name(name);
        let position = self
            .features
            .iter()
            .position(|f| f.name == name)
            .ok_or(CompileError::FeatureNotFound { name })?;
        FeatureIndex::try_from_usize(position)
    }

    /// Resolve a leaf outcome label (normalized before matching) to its class index.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`CompileError::InvalidSchema`] | the label is not a declared class |
    /// | [`CompileError::CapacityExceeded`] | the index does not fit in 16 bits |
    pub fn class_index(&self, label: &str) -> Result<ClassIndex, CompileError> {
        let label = normalize_name(label);
        let position = self
            .classes
            .iter()
            .position(|c| *c == label)
            .ok_or_else(|| {
                CompileError::invalid_schema(format!("leaf outcome \"{label}\" is not a declared class"))
            })?;
        ClassIndex::try_from_usize(position)
    }
}

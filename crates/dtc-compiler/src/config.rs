//! Configuration builder for model compilation.

use std::path::Path;

use tracing::{info, instrument};

use crate::assemble::assemble;
use crate::error::CompileError;
use crate::model::Model;
use crate::pmml::Document;
use crate::schema::ModelSchema;

/// How a leaf's `score` attribute is turned into a class code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScoreMode {
    /// Look the score up among the declared class labels; its position is the code.
    #[default]
    Label,
    /// Read the score itself as the class code, which must lie in `0..n_classes`.
    Numeric,
}

/// Whether the segments of an ensemble are flattened on the rayon pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parallelism {
    /// Flatten segments one after another.
    #[default]
    Sequential,
    /// Flatten segments in parallel; tree order is still segment order.
    Rayon,
}

/// Configuration for compiling a PMML document.
///
/// Construct via [`CompileConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter     | Default      |
/// |---------------|--------------|
/// | `score_mode`  | `Label`      |
/// | `parallelism` | `Sequential` |
#[derive(Debug, Clone, Default)]
pub struct CompileConfig {
    pub(crate) score_mode: ScoreMode,
    pub(crate) parallelism: Parallelism,
}

/// Output of a compilation: the extracted schema and the assembled model.
#[derive(Debug, Clone, PartialEq)]
pub struct Compilation {
    /// Features and class labels read from the data dictionary.
    pub schema: ModelSchema,
    /// The flattened model ready for encoding.
    pub model: Model,
}

impl CompileConfig {
    /// Create a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how leaf scores map to class codes.
    #[must_use]
    pub fn with_score_mode(mut self, score_mode: ScoreMode) -> Self {
        self.score_mode = score_mode;
        self
    }

    /// Set whether ensemble segments are flattened in parallel.
    #[must_use]
    pub fn with_parallelism(mut self, parallelism: Parallelism) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Return the score mode.
    #[must_use]
    pub fn score_mode(&self) -> ScoreMode {
        self.score_mode
    }

    /// Return the parallelism mode.
    #[must_use]
    pub fn parallelism(&self) -> Parallelism {
        self.parallelism
    }

    /// Extract the schema and assemble every tree of a parsed document.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`CompileError::InvalidSchema`] | missing metadata, tree root, predicate or outcome label |
    /// | [`CompileError::UnsupportedTreeShape`] | a split has other than two children |
    /// | [`CompileError::FeatureNotFound`] | a predicate names an undeclared feature |
    /// | [`CompileError::UnsupportedOperator`] | a predicate operator has no runtime code |
    /// | [`CompileError::CapacityExceeded`] | a count overflows its artifact field |
    #[instrument(skip_all, fields(score_mode = ?self.score_mode, parallelism = ?self.parallelism))]
    pub fn compile(&self, document: &Document) -> Result<Compilation, CompileError> {
        let schema = ModelSchema::extract(document)?;
        let model = assemble(document, &schema, self)?;
        info!(
            n_features = model.num_features(),
            n_classes = model.num_classes(),
            n_trees = model.n_trees(),
            n_nodes = model.n_nodes(),
            "model compiled"
        );
        Ok(Compilation { schema, model })
    }

    /// Read a PMML file and compile it.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::ReadDocument`] or [`CompileError::MalformedXml`]
    /// when the file cannot be read or parsed, otherwise the errors of
    /// [`CompileConfig::compile`].
    pub fn compile_file(&self, path: impl AsRef<Path>) -> Result<Compilation, CompileError> {
        let document = Document::from_path(path)?;
        self.compile(&document)
    }
}

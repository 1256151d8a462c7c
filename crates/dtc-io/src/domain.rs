//! Domain types for dtc-io.

/// Test inputs and their expected outcomes, row-aligned.
///
/// Produced by [`DatasetReader`](crate::DatasetReader). `inputs[i]` is the
/// feature vector whose dataset outcome is `outcomes[i]`; feature columns
/// keep their CSV order, which must match the model's feature order.
#[derive(Debug, Clone, PartialEq)]
pub struct TestVectors {
    feature_names: Vec<String>,
    inputs: Vec<Vec<f64>>,
    outcomes: Vec<i16>,
}

impl TestVectors {
    /// Create a new set of test vectors.
    pub(crate) fn new(feature_names: Vec<String>, inputs: Vec<Vec<f64>>, outcomes: Vec<i16>) -> Self {
        debug_assert_eq!(inputs.len(), outcomes.len(), "inputs and outcomes must be row-aligned");
        Self {
            feature_names,
            inputs,
            outcomes,
        }
    }

    /// Return the feature column names.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Return the input matrix (row-major).
    #[must_use]
    pub fn inputs(&self) -> &[Vec<f64>] {
        &self.inputs
    }

    /// Return the expected outcome of each input.
    #[must_use]
    pub fn outcomes(&self) -> &[i16] {
        &self.outcomes
    }

    /// Return the number of test inputs.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.inputs.len()
    }

    /// Return the number of features per input.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }
}

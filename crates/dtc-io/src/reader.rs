//! Delimited dataset reader producing runtime test vectors.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::TestVectors;

/// Reads a labelled dataset and splits it into inputs and expected outcomes.
///
/// Expected format:
/// - Header row required; one column is the target, every other column is a feature
/// - Feature columns keep their header order
/// - All rows must have the same number of columns as the header
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::MissingTargetColumn`] | Header has no column with the target name |
/// | [`IoError::NoFeatureColumns`] | Target is the only column |
/// | [`IoError::InconsistentRowLength`] | Row has different column count than header |
/// | [`IoError::NonFiniteValue`] | Feature cell is NaN, Inf, or unparseable float |
/// | [`IoError::InvalidOutcome`] | Target cell is not an integral 16-bit value |
/// | [`IoError::EmptyDataset`] | Zero data rows after header |
pub struct DatasetReader {
    path: PathBuf,
    separator: u8,
    target_column: String,
}

impl DatasetReader {
    /// Create a reader for `path` with `,` as separator and `Outcome` as target.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            separator: b',',
            target_column: "Outcome".to_string(),
        }
    }

    /// Set the field separator.
    #[must_use]
    pub fn with_separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }

    /// Set the name of the column holding the expected outcome.
    #[must_use]
    pub fn with_target_column(mut self, column: impl Into<String>) -> Self {
        self.target_column = column.into();
        self
    }

    /// Read and validate the dataset, returning [`TestVectors`].
    #[instrument(skip(self), fields(path = %self.path.display(), target = %self.target_column))]
    pub fn read(&self) -> Result<TestVectors, IoError> {
        // 1. Open file (FileNotFound on failure)
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        // 2. flexible(true) so short rows surface as InconsistentRowLength
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(self.separator)
            .flexible(true)
            .from_reader(file);

        // 3. Locate the target column and collect feature names
        let header = rdr.headers().map_err(|e| self.csv_error(e))?.clone();
        let expected_cols = header.len();
        let target_index = header
            .iter()
            .position(|name| name == self.target_column)
            .ok_or_else(|| IoError::MissingTargetColumn {
                path: self.path.clone(),
                column: self.target_column.clone(),
            })?;
        if expected_cols < 2 {
            return Err(IoError::NoFeatureColumns {
                path: self.path.clone(),
            });
        }
        let feature_names: Vec<String> = header
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != target_index)
            .map(|(_, name)| name.to_string())
            .collect();
        debug!(expected_cols, target_index, "read CSV header");

        // 4. Iterate rows with validation
        let mut inputs = Vec::new();
        let mut outcomes = Vec::new();

        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| self.csv_error(e))?;

            if record.len() != expected_cols {
                return Err(IoError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    expected: expected_cols,
                    got: record.len(),
                });
            }

            let mut row = Vec::with_capacity(feature_names.len());
            for (col_index, raw) in record.iter().enumerate() {
                if col_index == target_index {
                    outcomes.push(self.parse_outcome(row_index, raw)?);
                    continue;
                }
                let raw = raw.trim();
                match raw.parse::<f64>() {
                    Ok(value) if value.is_finite() => row.push(value),
                    _ => {
                        return Err(IoError::NonFiniteValue {
                            path: self.path.clone(),
                            row_index,
                            column: header.get(col_index).unwrap_or("").to_string(),
                            raw: raw.to_string(),
                        });
                    }
                }
            }
            inputs.push(row);
        }

        // 5. Check for empty dataset
        if inputs.is_empty() {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        info!(
            n_samples = inputs.len(),
            n_features = feature_names.len(),
            "test dataset loaded"
        );

        Ok(TestVectors::new(feature_names, inputs, outcomes))
    }

    /// Parse a target cell; integral floats such as `1.0` are accepted.
    fn parse_outcome(&self, row_index: usize, raw: &str) -> Result<i16, IoError> {
        let raw = raw.trim();
        if let Ok(value) = raw.parse::<i16>() {
            return Ok(value);
        }
        match raw.parse::<f64>() {
            Ok(value)
                if value.fract() == 0.0
                    && value >= f64::from(i16::MIN)
                    && value <= f64::from(i16::MAX) =>
            {
                Ok(value as i16)
            }
            _ => Err(IoError::InvalidOutcome {
                path: self.path.clone(),
                row_index,
                raw: raw.to_string(),
            }),
        }
    }

    fn csv_error(&self, e: csv::Error) -> IoError {
        IoError::CsvParse {
            path: self.path.clone(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    fn reader(f: &NamedTempFile) -> DatasetReader {
        DatasetReader::new(f.path()).with_separator(b';')
    }

    #[test]
    fn read_semicolon_dataset() {
        let f = write_csv("Glucose;BMI;Outcome;Age\n148;33.6;1;50\n85;26.6;0;31\n");
        let tv = reader(&f).read().unwrap();
        assert_eq!(tv.n_samples(), 2);
        assert_eq!(tv.n_features(), 3);
        assert_eq!(tv.feature_names(), &["Glucose", "BMI", "Age"]);
        assert_eq!(tv.inputs()[0], vec![148.0, 33.6, 50.0]);
        assert_eq!(tv.outcomes(), &[1, 0]);
    }

    #[test]
    fn custom_target_column() {
        let f = write_csv("a,label,b\n1.5,2,2.5\n");
        let tv = DatasetReader::new(f.path())
            .with_target_column("label")
            .read()
            .unwrap();
        assert_eq!(tv.feature_names(), &["a", "b"]);
        assert_eq!(tv.outcomes(), &[2]);
    }

    #[test]
    fn integral_float_outcome_accepted() {
        let f = write_csv("x;Outcome\n0.5;1.0\n");
        let tv = reader(&f).read().unwrap();
        assert_eq!(tv.outcomes(), &[1]);
    }

    #[test]
    fn missing_target_column_error() {
        let f = write_csv("x;y\n1;2\n");
        let err = reader(&f).read().unwrap_err();
        assert!(matches!(err, IoError::MissingTargetColumn { ref column, .. } if column == "Outcome"));
    }

    #[test]
    fn no_feature_columns_error() {
        let f = write_csv("Outcome\n1\n");
        let err = reader(&f).read().unwrap_err();
        assert!(matches!(err, IoError::NoFeatureColumns { .. }));
    }

    #[test]
    fn empty_dataset_error() {
        let f = write_csv("x;Outcome\n");
        let err = reader(&f).read().unwrap_err();
        assert!(matches!(err, IoError::EmptyDataset { .. }));
    }

    #[test]
    fn inconsistent_row_length_error() {
        let f = write_csv("x;y;Outcome\n1;2;0\n1;0\n");
        let err = reader(&f).read().unwrap_err();
        assert!(matches!(
            err,
            IoError::InconsistentRowLength {
                row_index: 1,
                expected: 3,
                got: 2,
                ..
            }
        ));
    }

    #[test]
    fn non_finite_feature_error() {
        let f = write_csv("x;y;Outcome\n1;NaN;0\n");
        let err = reader(&f).read().unwrap_err();
        assert!(matches!(err, IoError::NonFiniteValue { ref column, .. } if column == "y"));
    }

    #[test]
    fn unparseable_feature_error() {
        let f = write_csv("x;Outcome\nabc;0\n");
        let err = reader(&f).read().unwrap_err();
        assert!(matches!(err, IoError::NonFiniteValue { ref raw, .. } if raw == "abc"));
    }

    #[test]
    fn invalid_outcome_error() {
        let f = write_csv("x;Outcome\n1;0.5\n2;yes\n");
        let err = reader(&f).read().unwrap_err();
        assert!(matches!(err, IoError::InvalidOutcome { row_index: 0, ref raw, .. } if raw == "0.5"));
    }

    #[test]
    fn file_not_found_error() {
        let err = DatasetReader::new(Path::new("/nonexistent/data.csv"))
            .read()
            .unwrap_err();
        assert!(matches!(err, IoError::FileNotFound { .. }));
    }
}

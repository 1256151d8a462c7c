//! C header rendering for runtime test vectors.

use std::fs;
use std::path::Path;

use tracing::{info, instrument};

use crate::IoError;
use crate::domain::TestVectors;

const GUARD: &str = "DTC_TEST_VECTORS_H";
const OUTCOMES_PER_LINE: usize = 16;

/// Render test vectors as a self-contained C header.
///
/// Defines `TEST_INPUT_SIZE` and `TEST_FEATURE_SIZE`, a
/// `test_inputs[TEST_INPUT_SIZE][TEST_FEATURE_SIZE]` matrix of `double`
/// and a `test_outcomes[TEST_INPUT_SIZE]` array of `int16_t`. Values are
/// printed with the shortest representation that parses back to the same
/// `f64`.
#[must_use]
pub fn render_test_header(vectors: &TestVectors) -> String {
    let mut out = String::new();
    out.push_str("/* Generated by dtc gen-test-vec. Do not edit. */\n");
    out.push_str(&format!("#ifndef {GUARD}\n#define {GUARD}\n\n"));
    out.push_str("#include <stdint.h>\n\n");
    out.push_str(&format!("#define TEST_INPUT_SIZE {}\n", vectors.n_samples()));
    out.push_str(&format!("#define TEST_FEATURE_SIZE {}\n\n", vectors.n_features()));

    let names: Vec<String> = vectors
        .feature_names()
        .iter()
        .map(|name| name.replace("*/", "* /"))
        .collect();
    out.push_str(&format!("/* features: {} */\n", names.join(", ")));
    out.push_str("static const double test_inputs[TEST_INPUT_SIZE][TEST_FEATURE_SIZE] = {\n");
    for row in vectors.inputs() {
        let cells: Vec<String> = row.iter().map(|v| c_double(*v)).collect();
        out.push_str(&format!("    {{{}}},\n", cells.join(", ")));
    }
    out.push_str("};\n\n");

    out.push_str("static const int16_t test_outcomes[TEST_INPUT_SIZE] = {\n");
    for chunk in vectors.outcomes().chunks(OUTCOMES_PER_LINE) {
        let cells: Vec<String> = chunk.iter().map(i16::to_string).collect();
        out.push_str(&format!("    {},\n", cells.join(", ")));
    }
    out.push_str("};\n\n");

    out.push_str(&format!("#endif /* {GUARD} */\n"));
    out
}

/// Render test vectors and write them to `path`.
///
/// # Errors
///
/// Returns [`IoError::WriteFile`] if the file cannot be written.
#[instrument(skip(vectors), fields(path = %path.display()))]
pub fn write_test_header(vectors: &TestVectors, path: &Path) -> Result<(), IoError> {
    let header = render_test_header(vectors);
    fs::write(path, header.as_bytes()).map_err(|e| IoError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    info!(
        n_samples = vectors.n_samples(),
        n_features = vectors.n_features(),
        bytes = header.len(),
        "test header written"
    );
    Ok(())
}

/// `{:?}` on `f64` is round-trip exact and always a valid C literal for
/// finite values.
fn c_double(value: f64) -> String {
    format!("{value:?}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vectors() -> TestVectors {
        TestVectors::new(
            vec!["Glucose".into(), "BMI".into()],
            vec![vec![148.0, 33.6], vec![85.0, 0.1 + 0.2]],
            vec![1, 0],
        )
    }

    #[test]
    fn header_declares_sizes_and_arrays() {
        let text = render_test_header(&vectors());
        assert!(text.contains("#include <stdint.h>"));
        assert!(text.contains("#define TEST_INPUT_SIZE 2\n"));
        assert!(text.contains("#define TEST_FEATURE_SIZE 2\n"));
        assert!(text.contains("    {148.0, 33.6},\n"));
        assert!(text.contains("static const int16_t test_outcomes[TEST_INPUT_SIZE] = {\n    1, 0,\n};"));
        assert!(text.starts_with("/* Generated"));
        assert!(text.ends_with("#endif /* DTC_TEST_VECTORS_H */\n"));
    }

    #[test]
    fn floats_round_trip() {
        let text = render_test_header(&vectors());
        let literal = c_double(0.1 + 0.2);
        assert!(text.contains(&literal));
        assert_eq!(literal.parse::<f64>().unwrap(), 0.1 + 0.2);
    }

    #[test]
    fn outcomes_wrap_lines() {
        let n = OUTCOMES_PER_LINE + 1;
        let tv = TestVectors::new(vec!["x".into()], vec![vec![0.0]; n], vec![3; n]);
        let text = render_test_header(&tv);
        let outcome_lines = text
            .lines()
            .skip_while(|l| !l.contains("test_outcomes"))
            .skip(1)
            .take_while(|l| *l != "};")
            .count();
        assert_eq!(outcome_lines, 2);
    }

    #[test]
    fn comment_terminator_in_feature_name_is_escaped() {
        let tv = TestVectors::new(vec!["a*/b".into()], vec![vec![1.0]], vec![0]);
        let text = render_test_header(&tv);
        assert!(text.contains("/* features: a* /b */"));
    }

    #[test]
    fn write_to_missing_directory_fails() {
        let err = write_test_header(&vectors(), Path::new("/nonexistent/dir/test.h")).unwrap_err();
        assert!(matches!(err, IoError::WriteFile { .. }));
    }
}

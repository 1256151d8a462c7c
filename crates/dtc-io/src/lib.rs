//! Dataset reading and C test-vector rendering for the dtc runtime.

mod domain;
mod error;
mod header;
mod reader;

pub use domain::TestVectors;
pub use error::IoError;
pub use header::{render_test_header, write_test_header};
pub use reader::DatasetReader;

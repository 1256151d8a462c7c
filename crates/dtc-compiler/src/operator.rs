//! Comparison operators and their runtime codes.

use std::fmt;

use crate::error::CompileError;

/// A comparison predicate evaluated by the inference runtime at an internal node.
///
/// The discriminants are the codes the runtime dispatches on. Renumbering any
/// of them requires a matching runtime change.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "camelCase")]
#[repr(u16)]
pub enum Operator {
    LessOrEqual = 0,
    LessThan = 1,
    GreaterOrEqual = 2,
    GreaterThan = 3,
    Equal = 4,
    NotEqual = 5,
}

/// PMML operator names paired with their operators, in code order.
const OPERATOR_TABLE: [(&str, Operator); 6] = [
    ("lessOrEqual", Operator::LessOrEqual),
    ("lessThan", Operator::LessThan),
    ("greaterOrEqual", Operator::GreaterOrEqual),
    ("greaterThan", Operator::GreaterThan),
    ("equal", Operator::Equal),
    ("notEqual", Operator::NotEqual),
];

impl Operator {
    /// Look up an operator by its PMML name.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::UnsupportedOperator`] when the name is not in the table.
    pub fn from_pmml(name: &str) -> Result<Self, CompileError> {
        OPERATOR_TABLE
            .iter()
            .find(|(pmml, _)| *pmml == name)
            .map(|&(_, op)| op)
            .ok_or_else(|| CompileError::UnsupportedOperator {
                operator: name.to_string(),
            })
    }

    /// Look up an operator by its runtime code.
    #[must_use]
    pub fn from_code(code: u16) -> Option<Self> {
        OPERATOR_TABLE.get(usize::from(code)).map(|&(_, op)| op)
    }

    /// Return the runtime code.
    #[must_use]
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Return the PMML name.
    #[must_use]
    pub fn pmml_name(self) -> &'static str {
        OPERATOR_TABLE[usize::from(self.code())].0
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.pmml_name())
    }
}

#[cfg(test)]
mod tests {
    use super::{OPERATOR_TABLE, Operator};
    use crate::CompileError;

    #[test]
    fn codes_match_runtime_contract() {
        assert_eq!(Operator::LessOrEqual.code(), 0);
        assert_eq!(Operator::LessThan.code(), 1);
        assert_eq!(Operator::GreaterOrEqual.code(), 2);
        assert_eq!(Operator::GreaterThan.code(), 3);
        assert_eq!(Operator::Equal.code(), 4);
        assert_eq!(Operator::NotEqual.code(), 5);
    }

    #[test]
    fn table_is_in_code_order() {
        for (position, &(_, op)) in OPERATOR_TABLE.iter().enumerate() {
            assert_eq!(usize::from(op.code()), position);
        }
    }

    #[test]
    fn resolves_pmml_names() {
        assert_eq!(Operator::from_pmml("lessOrEqual").unwrap(), Operator::LessOrEqual);
        assert_eq!(Operator::from_pmml("greaterThan").unwrap(), Operator::GreaterThan);
        assert_eq!(Operator::from_pmml("notEqual").unwrap(), Operator::NotEqual);
    }

    #[test]
    fn rejects_unknown_names() {
        let err = Operator::from_pmml("isMissing").unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedOperator { ref operator } if operator == "isMissing"));
        assert!(Operator::from_pmml("LessOrEqual").is_err());
    }

    #[test]
    fn code_lookup() {
        assert_eq!(Operator::from_code(2), Some(Operator::GreaterOrEqual));
        assert_eq!(Operator::from_code(6), None);
    }

    #[test]
    fn display_uses_pmml_name() {
        assert_eq!(format!("{}", Operator::LessThan), "lessThan");
    }
}

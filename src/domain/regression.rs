//! Comparison of actual run statistics against an expected table.

use std::collections::BTreeMap;

use super::error::FinecheckError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticMismatch {
    pub name: String,
    pub expected: String,
    /// `None` when the statistic was not produced at all.
    pub actual: Option<String>,
}

impl std::fmt::Display for StatisticMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.actual {
            Some(actual) => write!(
                f,
                "{}: expected {} but was {}",
                self.name, self.expected, actual
            ),
            None => write!(f, "{}: expected {} but was missing", self.name, self.expected),
        }
    }
}

/// Every expected entry that is absent from or different in `actual`.
/// Values are compared after trimming whitespace.
pub fn compare_statistics(
    expected: &BTreeMap<String, String>,
    actual: &BTreeMap<String, String>,
) -> Vec<StatisticMismatch> {
    expected
        .iter()
        .filter_map(|(name, want)| {
            let got = actual.get(name);
            match got {
                Some(value) if value.trim() == want.trim() => None,
                _ => Some(StatisticMismatch {
                    name: name.clone(),
                    expected: want.trim().to_string(),
                    actual: got.map(|v| v.trim().to_string()),
                }),
            }
        })
        .collect()
}

pub fn assert_statistics(
    expected: &BTreeMap<String, String>,
    actual: &BTreeMap<String, String>,
) -> Result<(), FinecheckError> {
    let mismatches = compare_statistics(expected, actual);
    if mismatches.is_empty() {
        return Ok(());
    }
    let details = mismatches
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    Err(FinecheckError::StatisticsMismatch {
        count: mismatches.len(),
        details,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn matching_tables_pass() {
        let actual = table(&[("Total Orders", "1"), ("Net Profit", "1.234%")]);
        let expected = table(&[("Total Orders", " 1 ")]);
        assert!(compare_statistics(&expected, &actual).is_empty());
        assert!(assert_statistics(&expected, &actual).is_ok());
    }

    #[test]
    fn empty_expectation_always_passes() {
        let actual = table(&[("Total Orders", "3")]);
        assert!(assert_statistics(&BTreeMap::new(), &actual).is_ok());
    }

    #[test]
    fn differences_and_missing_are_reported() {
        let actual = table(&[("Total Orders", "2")]);
        let expected = table(&[("Total Orders", "1"), ("Alpha", "0")]);
        let mismatches = compare_statistics(&expected, &actual);
        assert_eq!(mismatches.len(), 2);
        assert_eq!(mismatches[0].name, "Alpha");
        assert_eq!(mismatches[0].actual, None);
        assert_eq!(mismatches[1].actual.as_deref(), Some("2"));

        match assert_statistics(&expected, &actual) {
            Err(FinecheckError::StatisticsMismatch { count, details }) => {
                assert_eq!(count, 2);
                assert!(details.contains("Total Orders: expected 1 but was 2"));
                assert!(details.contains("Alpha: expected 0 but was missing"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}

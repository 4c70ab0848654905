use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::DomainError;

/// A dataset split with an optional row slice, written `train`, `train[:10]`,
/// `train[5:20]` or `train[100:]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SplitSelector {
    pub name: String,
    pub start: u64,
    pub end: Option<u64>,
}

impl SplitSelector {
    pub fn whole(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: 0,
            end: None,
        }
    }

    /// Number of rows covered, when the slice is closed.
    pub fn len(&self) -> Option<u64> {
        self.end.map(|end| end.saturating_sub(self.start))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Clamp the slice end to the number of rows actually available.
    pub fn bounded_end(&self, total_rows: u64) -> u64 {
        self.end.map_or(total_rows, |end| end.min(total_rows))
    }
}

impl FromStr for SplitSelector {
    type Err = DomainError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let input = raw.trim();
        let invalid = || DomainError::InvalidSplit(raw.to_string());
        let Some(open) = input.find('[') else {
            if input.is_empty() || input.contains(']') {
                return Err(invalid());
            }
            return Ok(Self::whole(input));
        };

        let name = input[..open].trim();
        let slice = input[open + 1..].strip_suffix(']').ok_or_else(invalid)?;
        let (start, end) = slice.split_once(':').ok_or_else(invalid)?;
        if name.is_empty() {
            return Err(invalid());
        }
        let parse_bound = |bound: &str| -> Result<Option<u64>, DomainError> {
            let bound = bound.trim();
            if bound.is_empty() {
                Ok(None)
            } else {
                bound.parse().map(Some).map_err(|_| invalid())
            }
        };
        let start = parse_bound(start)?.unwrap_or(0);
        let end = parse_bound(end)?;
        if let Some(end) = end {
            if end < start {
                return Err(invalid());
            }
        }
        Ok(Self {
            name: name.to_string(),
            start,
            end,
        })
    }
}

impl TryFrom<String> for SplitSelector {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SplitSelector> for String {
    fn from(selector: SplitSelector) -> Self {
        selector.to_string()
    }
}

impl fmt::Display for SplitSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.start, self.end) {
            (0, None) => write!(f, "{}", self.name),
            (0, Some(end)) => write!(f, "{}[:{}]", self.name, end),
            (start, None) => write!(f, "{}[{}:]", self.name, start),
            (start, Some(end)) => write!(f, "{}[{}:{}]", self.name, start, end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_sliced_splits() {
        assert_eq!("train".parse::<SplitSelector>().unwrap(), SplitSelector::whole("train"));

        let head: SplitSelector = "train[:10]".parse().unwrap();
        assert_eq!(head.start, 0);
        assert_eq!(head.end, Some(10));
        assert_eq!(head.len(), Some(10));

        let window: SplitSelector = "validation[5:20]".parse().unwrap();
        assert_eq!(window.name, "validation");
        assert_eq!(window.len(), Some(15));

        let tail: SplitSelector = "test[100:]".parse().unwrap();
        assert_eq!(tail.start, 100);
        assert_eq!(tail.end, None);
        assert_eq!(tail.bounded_end(150), 150);
    }

    #[test]
    fn rejects_malformed_selectors() {
        for raw in ["", "[:10]", "train[10]", "train[:x]", "train[5:2]", "train[:10", "train]"] {
            assert!(raw.parse::<SplitSelector>().is_err(), "{raw} should fail");
        }
    }

    #[test]
    fn display_matches_input_form() {
        for raw in ["train", "train[:10]", "train[5:20]", "train[100:]"] {
            assert_eq!(raw.parse::<SplitSelector>().unwrap().to_string(), raw);
        }
    }

    #[test]
    fn deserializes_from_string() {
        let selector: SplitSelector = serde_yaml::from_str("\"train[:3]\"").unwrap();
        assert_eq!(selector.len(), Some(3));
        assert!(!selector.is_empty());
    }
}

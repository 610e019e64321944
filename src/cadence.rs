use crate::reindex::FillPolicy;
use serde::{Deserialize, Serialize};

/// How often a series naturally receives new observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    /// Values on trading/business days only; gaps are genuine absence
    Daily,
    /// Roughly one value a month; gaps are carried forward
    Monthly,
}

impl Cadence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cadence::Daily => "daily",
            Cadence::Monthly => "monthly",
        }
    }

    /// Fill policy applied when reindexing a series of this cadence.
    pub fn fill_policy(&self) -> FillPolicy {
        match self {
            Cadence::Daily => FillPolicy::None,
            Cadence::Monthly => FillPolicy::ForwardFill,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cadence_as_str() {
        assert_eq!(Cadence::Daily.as_str(), "daily");
        assert_eq!(Cadence::Monthly.as_str(), "monthly");
    }

    #[test]
    fn test_cadence_fill_policy() {
        assert_eq!(Cadence::Daily.fill_policy(), FillPolicy::None);
        assert_eq!(Cadence::Monthly.fill_policy(), FillPolicy::ForwardFill);
    }
}

use crate::FullName;
use serde::{Deserialize, Serialize};
use strum_macros::{EnumIter, IntoStaticStr};

/// Stable codes identifying the kind of a [Warning]. The string form of a
/// code never changes between releases so that automated callers can match
/// on it.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    IntoStaticStr,
    EnumIter,
)]
pub enum WarningCode {
    /// An operator the evaluator doesn't know how to fold.
    #[strum(serialize = "HAST0001")]
    UnsupportedOperator,
    /// Operands the evaluator refuses to fold, e.g. a division by zero.
    #[strum(serialize = "HAST0002")]
    UnsupportedEvaluation,
    /// A construct without a hardware equivalent. The member containing it
    /// is not transformed.
    #[strum(serialize = "HAST0003")]
    UnsupportedConstruct,
    /// A parallel invocation asked for more instances than configured and was
    /// split into sequential batches.
    #[strum(serialize = "HAST0004")]
    SerializedInvocation,
    /// A recursive invocation exceeding the configured recursion depth.
    #[strum(serialize = "HAST0005")]
    RecursionDepthExceeded,
    /// A member requested for inlining that can't be inlined.
    #[strum(serialize = "HAST0006")]
    InliningSkipped,
    /// Several callers share one instance of a member and are arbitrated.
    #[strum(serialize = "HAST0007")]
    SharedInstance,
}

impl WarningCode {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

impl std::fmt::Display for WarningCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-fatal problem found while compiling. Warnings are attached to the
/// generated hardware description.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Warning {
    pub code: WarningCode,
    /// The declaration the warning is about, if any.
    pub subject: Option<FullName>,
    pub message: String,
}

impl Warning {
    pub fn new<S: ToString>(code: WarningCode, message: S) -> Self {
        Warning {
            code,
            subject: None,
            message: message.to_string(),
        }
    }

    pub fn with_subject(mut self, subject: FullName) -> Self {
        self.subject = Some(subject);
        self
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.subject {
            Some(subject) => {
                write!(f, "{} `{subject}': {}", self.code, self.message)
            }
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use strum::IntoEnumIterator;

    #[test]
    fn codes_are_unique() {
        let codes: HashSet<&str> =
            WarningCode::iter().map(|c| c.as_str()).collect();
        assert_eq!(codes.len(), WarningCode::iter().count());
        assert!(codes.iter().all(|c| c.starts_with("HAST")));
    }

    #[test]
    fn display_mentions_subject() {
        let warning = Warning::new(WarningCode::UnsupportedConstruct, "floats")
            .with_subject(FullName::new("A::M()"));
        assert_eq!(warning.to_string(), "HAST0003 `A::M()': floats");
    }
}

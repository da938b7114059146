//! Structured configuration issues.
//!
//! Config loading never aborts on the first problem: validation collects
//! every issue with a severity so the caller can print warnings and refuse
//! to start only on errors.

/// Severity level of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Fatal: the configuration cannot work at all.
    Error,
    /// Non-fatal: the configuration works but may not behave as expected.
    Warning,
}

/// Identifies a specific configuration issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigIssueCode {
    /// A field holds a value outside its accepted set.
    InvalidEnumValue {
        field: String,
        value: String,
        valid_values: Vec<String>,
    },
    /// The legal proposal set is empty.
    EmptyProposalSet,
    /// The legal proposal set lists the same value more than once.
    DuplicateProposal { value: String },
    /// A duration that must be positive is zero.
    ZeroInterval { field: String },
    /// A numeric field is outside its accepted range.
    OutOfRange { field: String, value: String },
    /// Swarm size configured as zero.
    ZeroSwarmSize,
    /// A name that must not be blank is blank.
    EmptyName { field: String },
}

/// A detected issue in the configuration.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    pub message: String,
}

impl ConfigIssue {
    pub fn error(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    pub fn warning(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_set_severity() {
        let err = ConfigIssue::error(ConfigIssueCode::EmptyProposalSet, "no proposals");
        assert!(err.is_error());

        let warn = ConfigIssue::warning(
            ConfigIssueCode::DuplicateProposal {
                value: "x".to_string(),
            },
            "x listed twice",
        );
        assert!(!warn.is_error());
        assert_eq!(warn.message, "x listed twice");
    }
}

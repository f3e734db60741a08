//! Grammar-rule extraction result and reason codes

use serde::{Deserialize, Serialize};

/// Rule identifiers extracted from a `grammarRules` blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarRules {
    /// Identifiers in original order; empty when parsing failed
    pub rules: Vec<String>,
    /// Why the list looks the way it does
    pub reason: GrammarReason,
}

impl GrammarRules {
    /// Create a parsed result
    pub fn parsed(rules: Vec<String>) -> Self {
        let reason = if rules.is_empty() {
            GrammarReason::G002_RULES_EMPTY
        } else {
            GrammarReason::G001_RULES_PARSED
        };
        Self { rules, reason }
    }

    /// Create a failed result (empty rule list substituted)
    pub fn failed(reason: GrammarReason) -> Self {
        Self {
            rules: Vec::new(),
            reason,
        }
    }

    /// Did the literal fail to parse?
    pub fn is_failure(&self) -> bool {
        self.reason.is_failure()
    }

    /// Consume and return the rule list
    pub fn into_rules(self) -> Vec<String> {
        self.rules
    }
}

/// Reason codes for grammar-rule extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum GrammarReason {
    // Success codes
    /// Literal parsed, at least one rule
    G001_RULES_PARSED,
    /// Literal parsed, empty pair list
    G002_RULES_EMPTY,

    // Failure codes (empty list substituted)
    /// Literal is not a well-formed list of pairs
    G003_MALFORMED_LITERAL,
    /// No `]]` marker and the remaining text does not parse
    G004_UNTERMINATED_LITERAL,
    /// A list item is not a non-empty pair whose first element is a string
    G005_NOT_A_PAIR,
}

impl GrammarReason {
    /// Get reason code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::G001_RULES_PARSED => "G001_RULES_PARSED",
            Self::G002_RULES_EMPTY => "G002_RULES_EMPTY",
            Self::G003_MALFORMED_LITERAL => "G003_MALFORMED_LITERAL",
            Self::G004_UNTERMINATED_LITERAL => "G004_UNTERMINATED_LITERAL",
            Self::G005_NOT_A_PAIR => "G005_NOT_A_PAIR",
        }
    }

    /// Get human description
    pub fn description(&self) -> &'static str {
        match self {
            Self::G001_RULES_PARSED => "Grammar rules parsed",
            Self::G002_RULES_EMPTY => "Empty rule list",
            Self::G003_MALFORMED_LITERAL => "Malformed rule literal",
            Self::G004_UNTERMINATED_LITERAL => "Rule literal never closed",
            Self::G005_NOT_A_PAIR => "Rule entry is not a [rule, explanation] pair",
        }
    }

    /// Is this a failure reason?
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::G003_MALFORMED_LITERAL | Self::G004_UNTERMINATED_LITERAL | Self::G005_NOT_A_PAIR
        )
    }
}

impl std::fmt::Display for GrammarReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.description())
    }
}

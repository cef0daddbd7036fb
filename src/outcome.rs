// 🏷️ Provenance-tagged results
//
// Every forecast the dashboard renders says where its numbers came from:
// real data, a synthetic fallback, or nothing at all.

use serde::Serialize;
use std::fmt;

// ============================================================================
// FALLBACK REASON
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FallbackReason {
    /// The store could not be reached or the query failed
    StoreUnavailable { message: String },

    /// Not enough history rows to train on
    InsufficientData { required: usize, available: usize },

    /// Training or prediction failed
    ModelFailure { message: String },
}

impl FallbackReason {
    pub fn store(err: impl fmt::Display) -> Self {
        FallbackReason::StoreUnavailable {
            message: err.to_string(),
        }
    }

    pub fn model(err: impl fmt::Display) -> Self {
        FallbackReason::ModelFailure {
            message: err.to_string(),
        }
    }
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::StoreUnavailable { message } => {
                write!(f, "store unavailable: {}", message)
            }
            FallbackReason::InsufficientData { required, available } => {
                write!(f, "insufficient data: need {} rows, have {}", required, available)
            }
            FallbackReason::ModelFailure { message } => write!(f, "model failure: {}", message),
        }
    }
}

// ============================================================================
// OUTCOME
// ============================================================================

/// Result of a non-fatal computation.
///
/// - `Observed`: computed from stored data (or a model trained on it)
/// - `Fallback`: a deterministic substitute was used instead
/// - `Unavailable`: no substitute exists, nothing to show
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "provenance", rename_all = "snake_case")]
pub enum Outcome<T> {
    Observed { value: T },
    Fallback { value: T, reason: FallbackReason },
    Unavailable { reason: FallbackReason },
}

impl<T> Outcome<T> {
    pub fn observed(value: T) -> Self {
        Outcome::Observed { value }
    }

    pub fn fallback(value: T, reason: FallbackReason) -> Self {
        Outcome::Fallback { value, reason }
    }

    pub fn unavailable(reason: FallbackReason) -> Self {
        Outcome::Unavailable { reason }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Observed { value } | Outcome::Fallback { value, .. } => Some(value),
            Outcome::Unavailable { .. } => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Outcome::Observed { value } | Outcome::Fallback { value, .. } => Some(value),
            Outcome::Unavailable { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&FallbackReason> {
        match self {
            Outcome::Observed { .. } => None,
            Outcome::Fallback { reason, .. } | Outcome::Unavailable { reason } => Some(reason),
        }
    }

    pub fn is_observed(&self) -> bool {
        matches!(self, Outcome::Observed { .. })
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Outcome::Fallback { .. })
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Outcome::Unavailable { .. })
    }

    /// Transform the carried value, keeping provenance
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Observed { value } => Outcome::Observed { value: f(value) },
            Outcome::Fallback { value, reason } => Outcome::Fallback {
                value: f(value),
                reason,
            },
            Outcome::Unavailable { reason } => Outcome::Unavailable { reason },
        }
    }

    /// Short label for display ("observed", "fallback", "unavailable")
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Observed { .. } => "observed",
            Outcome::Fallback { .. } => "fallback",
            Outcome::Unavailable { .. } => "unavailable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_accessors() {
        let ok: Outcome<u32> = Outcome::observed(7);
        assert!(ok.is_observed());
        assert_eq!(ok.value(), Some(&7));
        assert!(ok.reason().is_none());

        let fb = Outcome::fallback(3, FallbackReason::store("connection refused"));
        assert!(fb.is_fallback());
        assert_eq!(fb.clone().into_value(), Some(3));
        assert_eq!(fb.label(), "fallback");
        assert!(fb.reason().unwrap().to_string().contains("connection refused"));

        let none: Outcome<u32> = Outcome::unavailable(FallbackReason::InsufficientData {
            required: 10,
            available: 4,
        });
        assert!(none.is_unavailable());
        assert!(none.value().is_none());
    }

    #[test]
    fn test_map_keeps_provenance() {
        let fb = Outcome::fallback(2, FallbackReason::model("no trees"));
        let doubled = fb.map(|v| v * 2);
        assert!(doubled.is_fallback());
        assert_eq!(doubled.value(), Some(&4));
    }

    #[test]
    fn test_serialized_shape() {
        let fb = Outcome::fallback(1.5, FallbackReason::store("down"));
        let json = serde_json::to_value(&fb).unwrap();
        assert_eq!(json["provenance"], "fallback");
        assert_eq!(json["value"], 1.5);
        assert_eq!(json["reason"]["kind"], "store_unavailable");
    }
}

//! Structured results for expected alternate paths.

use prizebot_db::entities::giveaway::GiveawayStatus;
use serde::Serialize;

/// Why an operation did not apply. None of these are faults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum Rejection {
    /// The giveaway or claim does not exist.
    NotFound,
    /// The giveaway is not accepting entries.
    NotActive,
    /// Rerolls need an ended giveaway.
    NotEnded,
    /// Another caller holds the processing lock or already ended the giveaway.
    NotActiveOrLocked,
    /// A reroll is already running.
    Locked,
    /// The entrant cap is full.
    CapReached,
    /// The giveaway does not allow rerolls.
    RerollDisabled,
    /// The claim was already resolved.
    NotPending,
    /// The member fails an entry requirement.
    NotEligible { reason: String },
    /// The status does not allow this transition.
    InvalidTransition { from: GiveawayStatus },
}

impl Rejection {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::NotActive => "not_active",
            Self::NotEnded => "not_ended",
            Self::NotActiveOrLocked => "not_active_or_locked",
            Self::Locked => "locked",
            Self::CapReached => "cap_reached",
            Self::RerollDisabled => "reroll_disabled",
            Self::NotPending => "not_pending",
            Self::NotEligible { .. } => "not_eligible",
            Self::InvalidTransition { .. } => "invalid_transition",
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotEligible { reason } => write!(f, "not_eligible: {reason}"),
            Self::InvalidTransition { from } => write!(f, "invalid_transition from {}", from.as_str()),
            other => f.write_str(other.code()),
        }
    }
}

/// Either the operation's result or the reason it did not apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The operation applied.
    Done(T),
    /// The operation did not apply.
    Rejected(Rejection),
}

impl<T> Outcome<T> {
    /// Whether the operation applied.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    /// The result, if the operation applied.
    pub fn done(self) -> Option<T> {
        match self {
            Self::Done(value) => Some(value),
            Self::Rejected(_) => None,
        }
    }

    /// The rejection, if the operation did not apply.
    #[must_use]
    pub const fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Done(_) => None,
            Self::Rejected(rejection) => Some(rejection),
        }
    }

    /// Transform the result, keeping a rejection as is.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Done(value) => Outcome::Done(f(value)),
            Self::Rejected(rejection) => Outcome::Rejected(rejection),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(Rejection::NotActiveOrLocked.code(), "not_active_or_locked");
        assert_eq!(
            Rejection::NotEligible {
                reason: "missing role".to_string()
            }
            .code(),
            "not_eligible"
        );
    }

    #[test]
    fn test_serialize_tagged() {
        let json = serde_json::to_value(Rejection::InvalidTransition {
            from: GiveawayStatus::Ended,
        })
        .unwrap_or_default();
        assert_eq!(json["code"], "invalid_transition");
        assert_eq!(json["from"], "ended");
    }

    #[test]
    fn test_outcome_map() {
        let outcome: Outcome<i32> = Outcome::Done(2);
        assert_eq!(outcome.map(|v| v * 2).done(), Some(4));

        let rejected: Outcome<i32> = Outcome::Rejected(Rejection::Locked);
        assert_eq!(rejected.rejection(), Some(&Rejection::Locked));
    }
}

//! Duel status machine.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::DuelError;

/// The status of a duel in its lifecycle.
///
/// Status transitions:
/// ```text
/// WaitingForOpponent ──► InProgress ──► Completed
///          │
///          └──────────► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DuelStatus {
    /// Duel is open, players can join and stake items.
    #[default]
    WaitingForOpponent,

    /// All seats taken, rounds are being rolled.
    InProgress,

    /// A winner was determined (terminal state).
    Completed,

    /// Creator cancelled before the duel filled up (terminal state).
    Cancelled,
}

impl DuelStatus {
    /// Returns true if players can join in this status.
    pub fn can_join(&self) -> bool {
        matches!(self, DuelStatus::WaitingForOpponent)
    }

    /// Returns true if the duel can start in this status.
    pub fn can_start(&self) -> bool {
        matches!(self, DuelStatus::WaitingForOpponent)
    }

    /// Returns true if dice can be rolled in this status.
    pub fn can_roll(&self) -> bool {
        matches!(self, DuelStatus::InProgress)
    }

    /// Returns true if the duel can be completed in this status.
    pub fn can_complete(&self) -> bool {
        matches!(self, DuelStatus::InProgress)
    }

    /// Returns true if the duel can be cancelled in this status.
    pub fn can_cancel(&self) -> bool {
        matches!(self, DuelStatus::WaitingForOpponent)
    }

    /// Returns true if this is a terminal status (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, DuelStatus::Completed | DuelStatus::Cancelled)
    }

    /// Returns the storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            DuelStatus::WaitingForOpponent => "waiting_for_opponent",
            DuelStatus::InProgress => "in_progress",
            DuelStatus::Completed => "completed",
            DuelStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for DuelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DuelStatus {
    type Err = DuelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting_for_opponent" => Ok(DuelStatus::WaitingForOpponent),
            "in_progress" => Ok(DuelStatus::InProgress),
            "completed" => Ok(DuelStatus::Completed),
            "cancelled" => Ok(DuelStatus::Cancelled),
            other => Err(DuelError::UnknownStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [DuelStatus; 4] = [
        DuelStatus::WaitingForOpponent,
        DuelStatus::InProgress,
        DuelStatus::Completed,
        DuelStatus::Cancelled,
    ];

    #[test]
    fn test_default_status_is_waiting() {
        assert_eq!(DuelStatus::default(), DuelStatus::WaitingForOpponent);
    }

    #[test]
    fn test_only_waiting_can_start_join_or_cancel() {
        for status in ALL {
            let waiting = status == DuelStatus::WaitingForOpponent;
            assert_eq!(status.can_start(), waiting);
            assert_eq!(status.can_join(), waiting);
            assert_eq!(status.can_cancel(), waiting);
        }
    }

    #[test]
    fn test_only_in_progress_can_roll_or_complete() {
        for status in ALL {
            let in_progress = status == DuelStatus::InProgress;
            assert_eq!(status.can_roll(), in_progress);
            assert_eq!(status.can_complete(), in_progress);
        }
    }

    #[test]
    fn test_terminal_statuses_allow_nothing() {
        for status in [DuelStatus::Completed, DuelStatus::Cancelled] {
            assert!(status.is_terminal());
            assert!(!status.can_join());
            assert!(!status.can_start());
            assert!(!status.can_roll());
            assert!(!status.can_complete());
            assert!(!status.can_cancel());
        }
        assert!(!DuelStatus::WaitingForOpponent.is_terminal());
        assert!(!DuelStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_parse_roundtrip() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<DuelStatus>().unwrap(), status);
        }
        assert_eq!(
            "finished".parse::<DuelStatus>(),
            Err(DuelError::UnknownStatus("finished".to_string()))
        );
    }

    #[test]
    fn test_serialization_uses_snake_case() {
        let json = serde_json::to_string(&DuelStatus::WaitingForOpponent).unwrap();
        assert_eq!(json, "\"waiting_for_opponent\"");
    }
}

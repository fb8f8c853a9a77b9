//! Conference lifecycle status and the single resolver every consumer goes through.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where a scheduled conference sits relative to wall-clock time.
///
/// Variants are declared in lifecycle order so `Ord` doubles as the
/// "forward only" relation used by reconciliation.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ConferenceStatus {
    #[default]
    Upcoming,
    Live,
    Ended,
}

impl ConferenceStatus {
    pub const ALL: [ConferenceStatus; 3] = [
        ConferenceStatus::Upcoming,
        ConferenceStatus::Live,
        ConferenceStatus::Ended,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConferenceStatus::Upcoming => "upcoming",
            ConferenceStatus::Live => "live",
            ConferenceStatus::Ended => "ended",
        }
    }

    /// `Ended` never transitions anywhere automatically.
    pub fn is_terminal(self) -> bool {
        matches!(self, ConferenceStatus::Ended)
    }

    /// Applies a time-derived status without ever moving backwards.
    ///
    /// Organizer overrides (starting early, ending early) are kept: a stored
    /// `Live` before the window opens stays `Live`, a stored `Ended` stays
    /// `Ended`.
    pub fn advance(self, computed: ConferenceStatus) -> ConferenceStatus {
        if self.is_terminal() {
            return self;
        }
        self.max(computed)
    }
}

impl fmt::Display for ConferenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status label that is not one of the three lifecycle states.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown conference status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for ConferenceStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upcoming" => Ok(ConferenceStatus::Upcoming),
            "live" => Ok(ConferenceStatus::Live),
            "ended" => Ok(ConferenceStatus::Ended),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// Computes the lifecycle status of a conference at `now`.
///
/// A record missing either boundary is managed by hand: its stored status is
/// returned unchanged (or `Upcoming` when unset). Otherwise the live window
/// `[start, end]` is inclusive at both ends, and anything past `end` is
/// `Ended` whatever was stored.
pub fn resolve_status(
    stored: Option<ConferenceStatus>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> ConferenceStatus {
    let (Some(start), Some(end)) = (start, end) else {
        return stored.unwrap_or_default();
    };

    if now > end {
        ConferenceStatus::Ended
    } else if now >= start {
        ConferenceStatus::Live
    } else {
        ConferenceStatus::Upcoming
    }
}

/// The status reconciliation would persist: the resolver's answer, applied
/// forward-only on top of what is stored.
pub fn reconciled_status(
    stored: Option<ConferenceStatus>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> ConferenceStatus {
    stored
        .unwrap_or_default()
        .advance(resolve_status(stored, start, end, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap()
    }

    #[test]
    fn future_window_is_upcoming() {
        let now = now();
        let status = resolve_status(
            Some(ConferenceStatus::Upcoming),
            Some(now + Duration::hours(1)),
            Some(now + Duration::hours(2)),
            now,
        );
        assert_eq!(status, ConferenceStatus::Upcoming);
    }

    #[test]
    fn open_window_is_live() {
        let now = now();
        let status = resolve_status(
            Some(ConferenceStatus::Upcoming),
            Some(now - Duration::minutes(10)),
            Some(now + Duration::minutes(50)),
            now,
        );
        assert_eq!(status, ConferenceStatus::Live);
    }

    #[test]
    fn closed_window_is_ended() {
        let now = now();
        let status = resolve_status(
            Some(ConferenceStatus::Live),
            Some(now - Duration::hours(2)),
            Some(now - Duration::hours(1)),
            now,
        );
        assert_eq!(status, ConferenceStatus::Ended);
    }

    #[test]
    fn missed_window_skips_straight_to_ended() {
        let now = now();
        let status = resolve_status(
            Some(ConferenceStatus::Upcoming),
            Some(now - Duration::hours(3)),
            Some(now - Duration::hours(2)),
            now,
        );
        assert_eq!(status, ConferenceStatus::Ended);
    }

    #[test]
    fn missing_boundaries_pass_stored_status_through() {
        let now = now();
        for stored in ConferenceStatus::ALL {
            assert_eq!(resolve_status(Some(stored), None, None, now), stored);
            assert_eq!(
                resolve_status(Some(stored), None, Some(now - Duration::hours(1)), now),
                stored
            );
            assert_eq!(
                resolve_status(Some(stored), Some(now - Duration::hours(1)), None, now),
                stored
            );
        }
        assert_eq!(
            resolve_status(None, None, Some(now), now),
            ConferenceStatus::Upcoming
        );
    }

    #[test]
    fn window_is_inclusive_at_both_ends() {
        let start = now();
        let end = start + Duration::hours(1);
        for stored in ConferenceStatus::ALL {
            assert_eq!(
                resolve_status(Some(stored), Some(start), Some(end), start),
                ConferenceStatus::Live
            );
            assert_eq!(
                resolve_status(Some(stored), Some(start), Some(end), end),
                ConferenceStatus::Live
            );
        }
        assert_eq!(
            resolve_status(None, Some(start), Some(end), end + Duration::milliseconds(1)),
            ConferenceStatus::Ended
        );
        assert_eq!(
            resolve_status(None, Some(start), Some(end), start - Duration::milliseconds(1)),
            ConferenceStatus::Upcoming
        );
    }

    #[test]
    fn past_end_is_ended_even_for_inverted_windows() {
        let now = now();
        let status = resolve_status(
            Some(ConferenceStatus::Upcoming),
            Some(now + Duration::hours(1)),
            Some(now - Duration::hours(1)),
            now,
        );
        assert_eq!(status, ConferenceStatus::Ended);
    }

    #[test]
    fn resolver_is_deterministic() {
        let now = now();
        let start = Some(now - Duration::minutes(5));
        let end = Some(now + Duration::minutes(5));
        let first = resolve_status(Some(ConferenceStatus::Ended), start, end, now);
        let second = resolve_status(Some(ConferenceStatus::Ended), start, end, now);
        assert_eq!(first, second);
    }

    #[test]
    fn reconciled_status_never_regresses() {
        let now = now();
        // Organizer ended early while the window is still open.
        assert_eq!(
            reconciled_status(
                Some(ConferenceStatus::Ended),
                Some(now - Duration::minutes(5)),
                Some(now + Duration::minutes(5)),
                now,
            ),
            ConferenceStatus::Ended
        );
        // Organizer started early.
        assert_eq!(
            reconciled_status(
                Some(ConferenceStatus::Live),
                Some(now + Duration::minutes(5)),
                Some(now + Duration::minutes(50)),
                now,
            ),
            ConferenceStatus::Live
        );
    }

    #[test]
    fn ended_is_terminal() {
        assert!(ConferenceStatus::Ended.is_terminal());
        assert!(!ConferenceStatus::Live.is_terminal());
        for computed in ConferenceStatus::ALL {
            assert_eq!(ConferenceStatus::Ended.advance(computed), ConferenceStatus::Ended);
        }
        assert_eq!(
            ConferenceStatus::Upcoming.advance(ConferenceStatus::Live),
            ConferenceStatus::Live
        );
    }

    #[test]
    fn parses_labels_case_insensitively() {
        assert_eq!(" Live ".parse::<ConferenceStatus>(), Ok(ConferenceStatus::Live));
        assert_eq!("ENDED".parse::<ConferenceStatus>(), Ok(ConferenceStatus::Ended));
        assert!("cancelled".parse::<ConferenceStatus>().is_err());
    }
}

use serde::{Deserialize, Serialize};

/// One of the eight tokens a status field (or an observed status) can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusToken {
    Starting,
    Started,
    Stopping,
    Stopped,
    Passivated,
    Error,
    Warning,
    #[serde(rename = "n/a")]
    Na,
}

/// `(alive, current, expected)` triple. Holds only data; the owning service
/// is found by map lookup in the model, never through a back-reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub current: StatusToken,
    pub expected: StatusToken,
    pub alive: bool,
}

impl Status {
    pub fn new(current: StatusToken, expected: StatusToken, alive: bool) -> Self {
        Self {
            current,
            expected,
            alive,
        }
    }

    pub fn equals(&self, other: &Status) -> bool {
        self == other
    }
}

/// Initial status for a freshly-created service in one of the three
/// at-rest expected states. `current` starts equal to `expected` for
/// `stopped`/`passivated`, and the pair that makes `Compute` return `started`
/// is `{current: started, expected: started, alive: true}`.
pub fn new_initial_status(expected: StatusToken) -> Status {
    match expected {
        StatusToken::Started => Status::new(StatusToken::Started, StatusToken::Started, true),
        other => Status::new(other, other, false),
    }
}

/// Pure function from `(current, expected, alive)` to an observed status.
/// See the status table: deterministic, no I/O, trivially unit-testable.
pub fn compute(status: &Status) -> StatusToken {
    use StatusToken::*;
    match (status.current, status.expected, status.alive) {
        (Stopped, Stopped, _) => Stopped,
        (Stopped, Passivated, _) => Passivated,
        (Stopped, Started, _) => Error,
        (Passivated, Passivated, _) => Passivated,
        (Passivated, _, _) => Warning,
        (Starting, Started, _) => Starting,
        (Starting, _, _) => Error,
        (Started, Started, true) => Started,
        (Started, Started, false) => Error,
        (Started, _, _) => Warning,
        (Stopping, Stopped, _) => Stopped,
        (Stopping, Passivated, _) => Passivated,
        (Stopping, _, _) => Error,
        (Na, _, _) | (_, Na, _) => Na,
        (Error, _, _) | (Warning, _, _) => Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_stays_stopped() {
        let s = Status::new(StatusToken::Stopped, StatusToken::Stopped, false);
        assert_eq!(compute(&s), StatusToken::Stopped);
    }

    #[test]
    fn stopped_with_expected_passivated() {
        let s = Status::new(StatusToken::Stopped, StatusToken::Passivated, false);
        assert_eq!(compute(&s), StatusToken::Passivated);
    }

    #[test]
    fn stopped_with_expected_started_is_error() {
        let s = Status::new(StatusToken::Stopped, StatusToken::Started, false);
        assert_eq!(compute(&s), StatusToken::Error);
    }

    #[test]
    fn started_alive_is_started() {
        let s = Status::new(StatusToken::Started, StatusToken::Started, true);
        assert_eq!(compute(&s), StatusToken::Started);
    }

    #[test]
    fn started_not_alive_is_error() {
        let s = Status::new(StatusToken::Started, StatusToken::Started, false);
        assert_eq!(compute(&s), StatusToken::Error);
    }

    #[test]
    fn started_unexpected_is_warning() {
        let s = Status::new(StatusToken::Started, StatusToken::Stopped, true);
        assert_eq!(compute(&s), StatusToken::Warning);
    }

    #[test]
    fn stopping_to_stopped() {
        let s = Status::new(StatusToken::Stopping, StatusToken::Stopped, false);
        assert_eq!(compute(&s), StatusToken::Stopped);
    }

    #[test]
    fn stopping_other_is_error() {
        let s = Status::new(StatusToken::Stopping, StatusToken::Started, false);
        assert_eq!(compute(&s), StatusToken::Error);
    }

    #[test]
    fn initial_status_is_coherent() {
        for expected in [StatusToken::Stopped, StatusToken::Started, StatusToken::Passivated] {
            let s = new_initial_status(expected);
            assert_eq!(compute(&s), expected);
        }
    }
}

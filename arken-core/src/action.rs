use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::status::StatusToken;

/// The closed action vocabulary. Persisted as lowercase strings at the
/// storage boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Start,
    Stop,
    Delete,
    Update,
    Upgrade,
    FinishUpgrade,
    Rollback,
}

pub type ActionSet = BTreeSet<Action>;

/// Computes the permitted action set for a `(current, expected)` pair.
///
/// `persisted` is the service's currently-stored action set. For any
/// `current` other than the two transient states, a non-empty persisted set
/// is returned verbatim instead of recomputing the table below — the table
/// only supplies the *initial* set the first time a status is reached.
pub fn get_actions(current: StatusToken, expected: StatusToken, persisted: &ActionSet) -> ActionSet {
    use Action::*;
    use StatusToken::*;

    if matches!(current, Starting | Stopping) {
        return ActionSet::new();
    }

    if !persisted.is_empty() {
        return persisted.clone();
    }

    match (current, expected) {
        (Stopped, Passivated) => [Start, Delete, Update].into_iter().collect(),
        (Stopped, Stopped) => [Start, Update].into_iter().collect(),
        (Passivated, Passivated) => [Start, Delete].into_iter().collect(),
        (Started, _) => [Delete, Update, Stop].into_iter().collect(),
        _ => ActionSet::new(),
    }
}

/// Merges `added` into `existing` applying the mutual-exclusion rules:
/// `start`/`stop` exclude each other; `update` drops the upgrade family;
/// `upgrade` drops `update` (and is itself blocked if an upgrade-family
/// action is already present); `finishupgrade`/`rollback` each drop `upgrade`.
pub fn add_action(existing: &ActionSet, added: impl IntoIterator<Item = Action>) -> ActionSet {
    let mut set = existing.clone();
    for action in added {
        match action {
            Action::Start => {
                set.remove(&Action::Stop);
                set.insert(Action::Start);
            }
            Action::Stop => {
                set.remove(&Action::Start);
                set.insert(Action::Stop);
            }
            Action::Update => {
                set.remove(&Action::Upgrade);
                set.remove(&Action::FinishUpgrade);
                set.remove(&Action::Rollback);
                set.insert(Action::Update);
            }
            Action::Upgrade => {
                let blocked = set.contains(&Action::Upgrade)
                    || set.contains(&Action::FinishUpgrade)
                    || set.contains(&Action::Rollback);
                if blocked {
                    continue;
                }
                set.remove(&Action::Update);
                set.insert(Action::Upgrade);
            }
            Action::FinishUpgrade => {
                set.remove(&Action::Upgrade);
                set.insert(Action::FinishUpgrade);
            }
            Action::Rollback => {
                set.remove(&Action::Upgrade);
                set.insert(Action::Rollback);
            }
        }
    }
    set
}

/// The actions assigned to a service the first time it is created.
pub fn init_actions() -> ActionSet {
    [Action::Start, Action::Delete, Action::Update]
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_stop_are_exclusive() {
        let s = add_action(&ActionSet::new(), [Action::Start]);
        let s = add_action(&s, [Action::Stop]);
        assert!(!s.contains(&Action::Start));
        assert!(s.contains(&Action::Stop));
    }

    #[test]
    fn update_drops_upgrade_family() {
        let s: ActionSet = [Action::Upgrade, Action::FinishUpgrade, Action::Rollback]
            .into_iter()
            .collect();
        let s = add_action(&s, [Action::Update]);
        assert_eq!(s, [Action::Update].into_iter().collect());
    }

    #[test]
    fn upgrade_blocked_when_already_in_progress() {
        let s: ActionSet = [Action::Update].into_iter().collect();
        let s = add_action(&s, [Action::Upgrade]);
        assert!(s.contains(&Action::Upgrade));
        assert!(!s.contains(&Action::Update));

        let s = add_action(&s, [Action::Upgrade]);
        assert!(s.contains(&Action::Upgrade));
    }

    #[test]
    fn finish_upgrade_replaces_upgrade() {
        let s: ActionSet = [Action::Upgrade].into_iter().collect();
        let s = add_action(&s, [Action::FinishUpgrade]);
        assert_eq!(s, [Action::FinishUpgrade].into_iter().collect());
    }

    #[test]
    fn transient_states_have_no_actions() {
        let persisted: ActionSet = [Action::Stop].into_iter().collect();
        assert!(get_actions(StatusToken::Starting, StatusToken::Started, &persisted).is_empty());
        assert!(get_actions(StatusToken::Stopping, StatusToken::Stopped, &persisted).is_empty());
    }

    #[test]
    fn persisted_actions_survive_recompute() {
        let persisted: ActionSet = [Action::Stop, Action::FinishUpgrade].into_iter().collect();
        let actions = get_actions(StatusToken::Started, StatusToken::Started, &persisted);
        assert_eq!(actions, persisted);
    }

    #[test]
    fn initial_table_when_nothing_persisted() {
        let actions = get_actions(StatusToken::Stopped, StatusToken::Passivated, &ActionSet::new());
        assert_eq!(
            actions,
            [Action::Start, Action::Delete, Action::Update].into_iter().collect()
        );
    }
}

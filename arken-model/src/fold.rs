use arken_core::{action, compute, BackendInfo, Service, StatusToken};
use tracing::info;

/// Folds a fresh back-end info record into `service`, mutating it in place
/// and returning whether the observed status changed (callers persist and
/// publish only when it did, or unconditionally per their own policy).
///
/// Steps (see the component design for the reconciliation engine):
/// 1. store the info record on the config
/// 2. update location if it changed, logging the transition
/// 3. record the previously observed status
/// 4. set `current` from the info record
/// 5. `stopped` + `expected == passivated` collapses to `passivated`
/// 6. `alive` follows from whether `current == started`
/// 7. if the newly observed status differs from the old one, adjust actions
///
/// Steps 3-7 only run when `info.current_status()` is `Some` — the unit
/// manager carries no status of its own, so folding its info only ever
/// updates the stored record (and location, for drivers that have one);
/// its optimistic status is set by the mutator's own `apply` closure
/// instead.
pub fn fold_backend_info(service: &mut Service, info: BackendInfo) -> bool {
    let prev_observed = service.observed();

    if let Some(location) = info.location() {
        if location != service.location {
            info!(
                service.name = %service.name,
                old.host = %service.location.host,
                old.port = service.location.port,
                new.host = %location.host,
                new.port = location.port,
                "service location changed"
            );
            service.location = location;
        }
    }

    let observed_status = info.current_status();

    service.config.backend_info = Some(info);

    let Some(mut current) = observed_status else {
        return false;
    };

    if current == StatusToken::Stopped && service.status.expected == StatusToken::Passivated {
        current = StatusToken::Passivated;
    }
    service.status.current = current;
    service.status.alive = current == StatusToken::Started;

    let new_observed = service.observed();
    if prev_observed != new_observed {
        match new_observed {
            StatusToken::Stopped => {
                service.actions = action::add_action(&service.actions, [action::Action::Start]);
            }
            StatusToken::Started => {
                service.actions = action::add_action(&service.actions, [action::Action::Stop]);
            }
            _ => {}
        }
    }

    prev_observed != new_observed
}

#[cfg(test)]
mod tests {
    use super::*;
    use arken_core::{ContainerOrchestratorInfo, Location};

    fn info(current_status: StatusToken) -> BackendInfo {
        BackendInfo::ContainerOrchestrator(ContainerOrchestratorInfo {
            environment_id: "env-1".into(),
            environment_name: "svc".into(),
            location: Location { host: "lb.svc".into(), port: 80 },
            health_state: "healthy".into(),
            current_status,
            template_id: "tmpl".into(),
        })
    }

    #[test]
    fn fold_marks_alive_on_started() {
        let mut s = Service::init("svc");
        s.status.expected = StatusToken::Started;
        fold_backend_info(&mut s, info(StatusToken::Started));
        assert!(s.status.alive);
        assert_eq!(s.observed(), StatusToken::Started);
        assert!(s.actions.contains(&arken_core::Action::Stop));
    }

    #[test]
    fn stopped_with_expected_passivated_collapses() {
        let mut s = Service::init("svc");
        s.status.expected = StatusToken::Passivated;
        fold_backend_info(&mut s, info(StatusToken::Stopped));
        assert_eq!(s.status.current, StatusToken::Passivated);
    }

    #[test]
    fn location_updates_when_changed() {
        let mut s = Service::init("svc");
        fold_backend_info(&mut s, info(StatusToken::Started));
        assert_eq!(s.location.host, "lb.svc");
    }

    #[test]
    fn unit_manager_info_never_moves_status() {
        let mut s = Service::init("svc");
        s.status.current = StatusToken::Started;
        s.status.alive = true;
        let changed = fold_backend_info(
            &mut s,
            BackendInfo::UnitManager(arken_core::UnitManagerInfo { unit_name: "nxio@svc.service".into() }),
        );
        assert!(!changed);
        assert_eq!(s.status.current, StatusToken::Started);
        assert!(s.status.alive);
        assert!(s.config.backend_info.is_some());
    }
}

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::service::Service;
use crate::status::StatusToken;

/// A named collection of `Service` instances keyed by their index, providing
/// round-robin selection over started, located instances. Every call to
/// `next` mutates the cursor, so a plain `Mutex` guards it rather than an
/// `RwLock` (there is no useful read-only path).
pub struct ServiceCluster {
    pub name: String,
    instances: HashMap<String, Service>,
    last_index: Mutex<usize>,
}

impl ServiceCluster {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instances: HashMap::new(),
            last_index: Mutex::new(0),
        }
    }

    pub fn add(&mut self, service: Service) {
        self.instances.insert(service.index.clone(), service);
    }

    pub fn remove(&mut self, index: &str) {
        self.instances.remove(index);
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Round-robin over at most `len(instances)` entries starting one past
    /// the cursor, returning the first started+located instance. The cursor
    /// advances on every call regardless of outcome.
    pub fn next(&self) -> Result<Service> {
        let count = self.instances.len();
        if count == 0 {
            return Err(no_alive_instance());
        }

        let mut keys: Vec<&String> = self.instances.keys().collect();
        keys.sort();

        let mut cursor = self.last_index.lock().expect("cluster cursor poisoned");
        for _ in 0..count {
            *cursor = (*cursor + 1) % count;
            let key = keys[*cursor];
            let candidate = &self.instances[key];
            if candidate.observed() == StatusToken::Started && candidate.location.is_fully_defined() {
                return Ok(candidate.clone());
            }
        }
        Err(no_alive_instance())
    }
}

fn no_alive_instance() -> Error {
    use crate::status::Status;
    Error::NoAliveInstance {
        observed: StatusToken::Error,
        status: Status::new(StatusToken::Error, StatusToken::Started, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::Location;

    fn started_located(index: &str) -> Service {
        let mut s = Service::init(format!("svc-{index}"));
        s.index = index.to_string();
        s.status.current = StatusToken::Started;
        s.status.expected = StatusToken::Started;
        s.status.alive = true;
        s.location = Location { host: "h".into(), port: 80 };
        s
    }

    fn stopped_located(index: &str) -> Service {
        let mut s = Service::init(format!("svc-{index}"));
        s.index = index.to_string();
        s.location = Location { host: "h".into(), port: 80 };
        s
    }

    #[test]
    fn next_never_returns_non_started_or_non_located() {
        let mut cluster = ServiceCluster::new("cluster");
        cluster.add(started_located("a"));
        cluster.add(stopped_located("b"));
        cluster.add(started_located("c"));

        let mut seen = std::collections::HashSet::new();
        for _ in 0..6 {
            let s = cluster.next().unwrap();
            assert_ne!(s.index, "b");
            seen.insert(s.index);
        }
        assert!(seen.contains("a"));
        assert!(seen.contains("c"));
    }

    #[test]
    fn next_fails_with_no_started_instance() {
        let mut cluster = ServiceCluster::new("cluster");
        cluster.add(stopped_located("a"));
        assert!(cluster.next().is_err());
    }

    #[test]
    fn next_fails_on_empty_cluster() {
        let cluster = ServiceCluster::new("cluster");
        assert!(cluster.next().is_err());
    }
}

use serde::{Deserialize, Serialize};

/// A named indirection from a public name to a service (or other value).
/// Unique by name. `Equals` compares `typ`/`value` only — not the key or name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub node_key: Option<String>,
    pub name: String,
    pub typ: String,
    pub value: String,
}

impl Domain {
    pub const SERVICE_TYPE: &'static str = "service";

    pub fn for_service(name: impl Into<String>, service_name: impl Into<String>) -> Self {
        Self {
            node_key: None,
            name: name.into(),
            typ: Self::SERVICE_TYPE.to_string(),
            value: service_name.into(),
        }
    }

    pub fn is_service(&self) -> bool {
        self.typ == Self::SERVICE_TYPE
    }

    pub fn equals(&self, other: &Domain) -> bool {
        self.typ == other.typ && self.value == other.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equals_ignores_key_and_name() {
        let a = Domain::for_service("d.example", "svc");
        let mut b = a.clone();
        b.node_key = Some("/domains/d.example".into());
        b.name = "other-name".into();
        assert!(a.equals(&b));
        b.value = "different".into();
        assert!(!a.equals(&b));
    }
}

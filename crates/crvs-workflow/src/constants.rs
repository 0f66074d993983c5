//! Code systems, extension URLs and identifier keys.

/// Identifier system of the Composition's primary identifier.
pub const COMPOSITION_IDENTIFIER_SYSTEM: &str = "urn:ietf:rfc:3986";

pub const DEFAULT_SPECIFICATION_URL: &str = "http://opencrvs.org/specs/";

/// Location type code of a registration office.
pub const OFFICE_LOCATION_CODE: &str = "CRVS_OFFICE";

pub const EXT_LAST_LOCATION: &str = "regLastLocation";
pub const EXT_LAST_OFFICE: &str = "regLastOffice";
pub const EXT_LAST_USER: &str = "regLastUser";

/// Namespaced keys under a configurable specification URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecNamespace {
    base: String,
}

impl SpecNamespace {
    pub fn new(base: impl Into<String>) -> Self {
        let mut base = base.into();
        if !base.ends_with('/') {
            base.push('/');
        }
        Self { base }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// `<spec-url>id/<name>`
    pub fn identifier(&self, name: &str) -> String {
        format!("{}id/{name}", self.base)
    }

    /// `<spec-url>extension/<name>`
    pub fn extension(&self, name: &str) -> String {
        format!("{}extension/{name}", self.base)
    }

    pub fn reg_status(&self) -> String {
        format!("{}reg-status", self.base)
    }

    pub fn registration_types(&self) -> String {
        format!("{}types", self.base)
    }
}

impl Default for SpecNamespace {
    fn default() -> Self {
        Self::new(DEFAULT_SPECIFICATION_URL)
    }
}

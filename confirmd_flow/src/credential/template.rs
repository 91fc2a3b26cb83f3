use std::collections::HashSet;

use typed_builder::TypedBuilder;

/// One attribute of a credential to be issued, collected from the visitor or
/// a preset persona.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialAttribute {
    pub name: String,
    pub value: String,
}

impl CredentialAttribute {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// What will be issued: name, version and the ordered attribute list. Built
/// once per issuance attempt and not mutated afterwards.
#[derive(Clone, Debug, Serialize, Deserialize, TypedBuilder)]
pub struct CredentialTemplate {
    #[builder(setter(into))]
    name: String,
    #[builder(setter(into))]
    version: String,
    attributes: Vec<CredentialAttribute>,
}

impl CredentialTemplate {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn attributes(&self) -> &[CredentialAttribute] {
        &self.attributes
    }

    /// Credential names are matched case-insensitively; wallets and the
    /// agent disagree on casing (`ConfirmedPerson` vs `confirmed_person`).
    pub fn matches_name(&self, other: &str) -> bool {
        normalize_credential_name(&self.name) == normalize_credential_name(other)
    }
}

/// Accepted-credential bookkeeping. Only names are tracked; credential
/// content lives in the visitor's wallet, not here.
#[derive(Clone, Debug, Default)]
pub struct IssuedCredentials {
    names: HashSet<String>,
}

impl IssuedCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, name: &str) {
        self.names.insert(normalize_credential_name(name));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&normalize_credential_name(name))
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }
}

fn normalize_credential_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_' && *c != ' ')
        .collect::<String>()
        .to_lowercase()
}

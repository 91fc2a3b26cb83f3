use crate::credential::{CredentialAttribute, CredentialTemplate};

/// Scanned or uploaded identity-document image, passed through untouched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentImage {
    pub label: String,
    pub data: String,
}

/// Information collected on the person-information step. Every field except
/// the images is mandatory before the wizard lets the visitor move on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonInformation {
    pub family_name: String,
    pub given_names: String,
    pub date_of_birth: String,
    pub gender: String,
    pub document_type: String,
    pub document_number: String,
    pub document_expiry_date: String,
    pub nationality: String,
    pub document_issuing_body: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub document_images: Vec<DocumentImage>,
}

impl Default for PersonInformation {
    fn default() -> Self {
        Self {
            family_name: String::new(),
            given_names: String::new(),
            date_of_birth: String::new(),
            gender: "male".to_string(),
            document_type: "passport".to_string(),
            document_number: String::new(),
            document_expiry_date: String::new(),
            nationality: "Nigeria".to_string(),
            document_issuing_body: String::new(),
            document_images: Vec::new(),
        }
    }
}

impl PersonInformation {
    /// Preset persona for the scripted demo path.
    pub fn demo_person() -> Self {
        Self {
            family_name: "Doe".to_string(),
            given_names: "Jane Alice".to_string(),
            date_of_birth: "1990-01-15".to_string(),
            gender: "female".to_string(),
            document_type: "passport".to_string(),
            document_number: "A12345678".to_string(),
            document_expiry_date: "2030-01-15".to_string(),
            nationality: "Nigeria".to_string(),
            document_issuing_body: "Nigeria Immigration Service".to_string(),
            document_images: Vec::new(),
        }
    }

    /// All mandatory fields non-empty; the completion predicate of the
    /// person-information step.
    pub fn is_complete(&self) -> bool {
        [
            &self.family_name,
            &self.given_names,
            &self.date_of_birth,
            &self.gender,
            &self.document_type,
            &self.document_number,
            &self.document_expiry_date,
            &self.nationality,
            &self.document_issuing_body,
        ]
        .iter()
        .all(|field| !field.is_empty())
    }

    /// Build the credential template the agent expects: snake_case attribute
    /// names, one attribute per collected field.
    pub fn to_credential_template(&self, credential_name: &str) -> CredentialTemplate {
        let attributes = vec![
            CredentialAttribute::new("family_name", &self.family_name),
            CredentialAttribute::new("given_names", &self.given_names),
            CredentialAttribute::new("date_of_birth", &self.date_of_birth),
            CredentialAttribute::new("gender", &self.gender),
            CredentialAttribute::new("document_type", &self.document_type),
            CredentialAttribute::new("document_number", &self.document_number),
            CredentialAttribute::new("document_expiry_date", &self.document_expiry_date),
            CredentialAttribute::new("nationality", &self.nationality),
            CredentialAttribute::new("issuing_authority", &self.document_issuing_body),
        ];
        CredentialTemplate::builder()
            .name(credential_name)
            .version("2.0")
            .attributes(attributes)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_incomplete() {
        assert!(!PersonInformation::default().is_complete());
    }

    #[test]
    fn demo_person_is_complete() {
        assert!(PersonInformation::demo_person().is_complete());
    }

    #[test]
    fn any_empty_mandatory_field_blocks_completion() {
        let mut person = PersonInformation::demo_person();
        person.document_number = String::new();
        assert!(!person.is_complete());
    }

    #[test]
    fn template_attributes_follow_agent_naming() {
        let template = PersonInformation::demo_person().to_credential_template("ConfirmedPerson");
        assert_eq!(template.name(), "ConfirmedPerson");
        assert_eq!(template.version(), "2.0");
        let names: Vec<&str> = template
            .attributes()
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(
            names,
            [
                "family_name",
                "given_names",
                "date_of_birth",
                "gender",
                "document_type",
                "document_number",
                "document_expiry_date",
                "nationality",
                "issuing_authority",
            ]
        );
    }
}

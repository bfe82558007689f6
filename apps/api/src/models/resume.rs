use serde::{Deserialize, Deserializer};

/// Résumé payload accepted by `POST /generate_pdf`.
///
/// Every field is optional; `null` and missing values both fall back to empty,
/// except `isEnglish`, where both mean English.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeDocument {
    #[serde(default, deserialize_with = "null_as_default")]
    pub contact: Contact,
    #[serde(default, deserialize_with = "null_as_default")]
    pub education: Vec<Education>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub experience: Vec<Experience>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub projects: Vec<Project>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub skills: Vec<Skill>,
    #[serde(default = "default_true", deserialize_with = "null_as_true")]
    pub is_english: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Contact {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub phone: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub github: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Education {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subtitle: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub degree: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub date_range: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experience {
    #[serde(default, deserialize_with = "null_as_default")]
    pub position: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub company: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub location: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub date_range: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub responsibilities: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub date_range: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub descriptions: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Skill {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
}

fn default_true() -> bool {
    true
}

fn null_as_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(true))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_fields_default() {
        let doc: ResumeDocument = serde_json::from_value(json!({})).unwrap();
        assert!(doc.is_english);
        assert!(doc.contact.name.is_empty());
        assert!(doc.education.is_empty());
    }

    #[test]
    fn test_nulls_treated_as_empty() {
        let doc: ResumeDocument = serde_json::from_value(json!({
            "contact": {"name": "Ada", "phone": null},
            "experience": [{"position": "Engineer", "responsibilities": null}],
            "skills": null,
            "isEnglish": false
        }))
        .unwrap();
        assert_eq!(doc.contact.name, "Ada");
        assert!(doc.contact.phone.is_empty());
        assert!(doc.experience[0].responsibilities.is_empty());
        assert!(doc.skills.is_empty());
        assert!(!doc.is_english);
    }

    #[test]
    fn test_null_language_flag_means_english() {
        let doc: ResumeDocument =
            serde_json::from_value(json!({"isEnglish": null})).unwrap();
        assert!(doc.is_english);

        let result = serde_json::from_value::<ResumeDocument>(json!({"isEnglish": "no"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_camel_case_date_range() {
        let doc: ResumeDocument = serde_json::from_value(json!({
            "education": [{"title": "MIT", "dateRange": "2015 - 2019"}]
        }))
        .unwrap();
        assert_eq!(doc.education[0].date_range, "2015 - 2019");
    }

    #[test]
    fn test_wrong_type_rejected() {
        let result = serde_json::from_value::<ResumeDocument>(json!({"education": "MIT"}));
        assert!(result.is_err());
    }
}

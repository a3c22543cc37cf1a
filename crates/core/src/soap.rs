use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

/// Reads an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A physiotherapy session report in SOAP form.
///
/// Patient details are optional because transcripts often omit them; the four
/// narrative sections are always present, even if empty, and a `null` section
/// or exercise list reads as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SoapReport {
    pub patient_name: Option<String>,
    pub patient_age: Option<String>,
    pub condition: Option<String>,
    pub session_date: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subjective: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub objective: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub assessment: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub plan: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub exercises: Vec<Exercise>,
}

/// An exercise prescribed in the plan section.
///
/// `selected_image` is only filled in once the report is final.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Exercise {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_image: Option<String>,
}

impl Exercise {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            selected_image: None,
        }
    }
}

/// An exercise offered to the user together with candidate illustrations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ExerciseWithImages {
    pub id: String,
    pub name: String,
    pub description: String,
    pub images: Vec<Image>,
}

/// One candidate illustration. `selected` is always `false` when we build it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Image {
    pub id: String,
    pub url: String,
    pub name: String,
    pub selected: bool,
}

impl ExerciseWithImages {
    /// Looks up one of this exercise's images by id.
    pub fn image(&self, image_id: &str) -> Option<&Image> {
        self.images.iter().find(|img| img.id == image_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_report_keeps_null_patient_fields() {
        let report = SoapReport {
            subjective: "Lower back pain, 7/10".into(),
            ..Default::default()
        };
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["patient_name"], json!(null));
        assert_eq!(value["session_date"], json!(null));
        assert_eq!(value["exercises"], json!([]));
    }

    #[test]
    fn test_draft_exercise_omits_selected_image() {
        let exercise = Exercise::new("Bridges", "10 reps, 3x daily");
        let value = serde_json::to_value(&exercise).unwrap();

        assert_eq!(
            value,
            json!({"name": "Bridges", "description": "10 reps, 3x daily"})
        );
    }

    #[test]
    fn test_report_accepts_sparse_model_output() {
        let report: SoapReport = serde_json::from_value(json!({
            "patient_name": "John Doe",
            "subjective": "Pain when sitting",
            "exercises": [{"name": "Cat-cow exercises"}]
        }))
        .unwrap();

        assert_eq!(report.patient_name.as_deref(), Some("John Doe"));
        assert_eq!(report.patient_age, None);
        assert_eq!(report.plan, "");
        assert_eq!(report.exercises[0].description, "");
    }
}

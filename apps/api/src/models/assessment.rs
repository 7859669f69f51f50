use serde::{Deserialize, Serialize};

/// How urgently the candidate should apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationPriority {
    High,
    Medium,
    Low,
}

/// Structured assessment of one posting against the résumé.
///
/// This is both the wire shape the completion service is asked to produce and
/// the shape handed to the output sink. `job_url` is the reconciliation key;
/// after reconciliation it always names a record that was actually sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentResult {
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    /// 0 – 100
    pub match_score: u8,
    pub key_matches: Vec<String>,
    pub missing_qualifications: Vec<String>,
    pub resume_suggestions: Vec<String>,
    pub application_priority: ApplicationPriority,
    pub reason: String,
    pub job_url: String,
}

pub const MAX_MATCH_SCORE: u8 = 100;

impl AssessmentResult {
    /// Checks constraints serde cannot express. Returns a description of the
    /// first violation.
    pub fn schema_violation(&self) -> Option<String> {
        if self.match_score > MAX_MATCH_SCORE {
            return Some(format!(
                "match_score {} out of range for {}",
                self.match_score, self.job_url
            ));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> serde_json::Value {
        json!({
            "title": "Rust Engineer",
            "company": "Acme",
            "description": "Build things",
            "location": "London",
            "match_score": 82,
            "key_matches": ["Rust", "Tokio"],
            "missing_qualifications": ["Kafka"],
            "resume_suggestions": ["Mention async work"],
            "application_priority": "High",
            "reason": "Strong systems background",
            "job_url": "https://jobs.example.com/1"
        })
    }

    #[test]
    fn test_assessment_deserializes_from_service_shape() {
        let result: AssessmentResult = serde_json::from_value(sample()).unwrap();
        assert_eq!(result.match_score, 82);
        assert_eq!(result.application_priority, ApplicationPriority::High);
        assert!(result.schema_violation().is_none());
    }

    #[test]
    fn test_unknown_priority_is_rejected() {
        let mut value = sample();
        value["application_priority"] = json!("Urgent");
        assert!(serde_json::from_value::<AssessmentResult>(value).is_err());
    }

    #[test]
    fn test_missing_job_url_is_rejected() {
        let mut value = sample();
        value.as_object_mut().unwrap().remove("job_url");
        assert!(serde_json::from_value::<AssessmentResult>(value).is_err());
    }

    #[test]
    fn test_score_above_100_is_a_violation() {
        let mut value = sample();
        value["match_score"] = json!(140);
        let result: AssessmentResult = serde_json::from_value(value).unwrap();
        assert!(result.schema_violation().unwrap().contains("140"));
    }
}

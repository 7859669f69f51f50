use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field carrying the reconciliation key of a posting.
pub const KEY_FIELD: &str = "job_url";

/// One job posting as delivered by the scraping collaborator.
///
/// The field set is open (title, company, description, location, job_url,
/// date_posted, site, ...). Records are never mutated after intake; the
/// preprocessor only reads from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Returns a field rendered as text. Strings are returned as-is (trimmed),
    /// numbers and booleans are stringified, null/arrays/objects are absent.
    pub fn text(&self, name: &str) -> Option<String> {
        match self.fields.get(name)? {
            Value::String(s) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn text_or(&self, name: &str, fallback: &str) -> String {
        self.text(name).unwrap_or_else(|| fallback.to_string())
    }

    /// Stable unique key used to re-associate service results with this record.
    pub fn key(&self) -> Option<String> {
        self.text(KEY_FIELD)
    }

    pub fn title(&self) -> Option<String> {
        self.text("title")
    }

    pub fn company(&self) -> Option<String> {
        self.text("company")
    }

    pub fn location(&self) -> Option<String> {
        self.text("location")
    }

    pub fn description(&self) -> Option<String> {
        self.text("description")
    }

    pub fn date_posted(&self) -> Option<String> {
        self.text("date_posted")
    }
}

impl From<Value> for Record {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self::new(fields),
            _ => Self::new(Map::new()),
        }
    }
}

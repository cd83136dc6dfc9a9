use serde::{Deserialize, Serialize};

/// Envelope wrapping every catalog response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEnvelope<T> {
    #[serde(rename = "Count")]
    pub count: i64,
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "SearchCriteria", default)]
    pub search_criteria: Option<String>,
    #[serde(rename = "Results")]
    pub results: Vec<T>,
}

impl<T> CatalogEnvelope<T> {
    pub fn into_results(self) -> Vec<T> {
        self.results
    }
}

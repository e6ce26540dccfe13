use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One event flowing through the pipeline end to end. `id` is the join key
/// between the detail and enrichment stages and must be unique within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: String,
    pub title: String,
    pub url: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub location: String,
    pub description: String,
    pub guest_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_summary: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_reasons: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl EventRecord {
    /// Cache key for enrichment, content-addressed on the event text so
    /// identical events across runs and sources share one cache entry.
    pub fn enrichment_key(&self) -> String {
        format!("{}{}", self.title, self.description)
    }

    pub fn apply_enrichment(&mut self, enrichment: &EventEnrichment) {
        self.ai_summary = Some(enrichment.summary.clone());
        self.top_reasons = Some(enrichment.reasons.clone());
        self.tags = Some(enrichment.tags.clone());
    }

    /// Applied when a dispatched event comes back without a result. The
    /// enrichment fields are never left unset once an event reached the
    /// backend.
    pub fn apply_placeholder(&mut self) {
        self.ai_summary = Some(vec!["Synthesis incomplete.".to_string()]);
        self.top_reasons = Some(vec!["N/A".to_string()]);
        self.tags = Some(Vec::new());
    }
}

/// Per-event AI output, also the enrichment cache value. The short field
/// names are the wire format the backend is prompted to produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnrichment {
    #[serde(rename = "s", default)]
    pub summary: Vec<String>,
    #[serde(rename = "r", default)]
    pub reasons: Vec<String>,
    #[serde(rename = "t", default)]
    pub tags: Vec<String>,
}

/// Normalized resolver output, one per event surviving the date/platform
/// filters. Consumed by the detail fetcher and discarded once an
/// `EventRecord` is formed. `event` is the event sub-record and `item` the
/// raw wrapper it was found in; both are kept because guest counts live on
/// either depending on the source shape.
#[derive(Debug, Clone)]
pub struct CandidateEvent {
    pub external_id: String,
    pub name: String,
    pub detail_url: String,
    pub event: Value,
    pub item: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> EventRecord {
        EventRecord {
            id: "evt-1".into(),
            title: "Builder Night".into(),
            url: "https://lu.ma/builder-night".into(),
            start_date: Some("2026-08-06T18:00:00+08:00".into()),
            end_date: None,
            location: "Hong Kong".into(),
            description: "An evening of talks.".into(),
            guest_count: 42,
            ai_summary: None,
            top_reasons: None,
            tags: None,
        }
    }

    #[test]
    fn unenriched_record_serializes_without_ai_fields() {
        let json = serde_json::to_value(record()).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("ai_summary"));
        assert!(!obj.contains_key("top_reasons"));
        assert!(!obj.contains_key("tags"));
    }

    #[test]
    fn placeholder_fills_every_ai_field() {
        let mut record = record();
        record.apply_placeholder();
        assert_eq!(record.ai_summary.unwrap(), vec!["Synthesis incomplete."]);
        assert_eq!(record.top_reasons.unwrap(), vec!["N/A"]);
        assert_eq!(record.tags.unwrap(), Vec::<String>::new());
    }

    #[test]
    fn enrichment_key_depends_on_title_and_description_only() {
        let a = record();
        let mut b = record();
        b.url = "https://lu.ma/other".into();
        b.guest_count = 0;
        assert_eq!(a.enrichment_key(), b.enrichment_key());

        let mut c = record();
        c.description = "Different text.".into();
        assert_ne!(a.enrichment_key(), c.enrichment_key());
    }

    #[test]
    fn enrichment_tolerates_missing_fields() {
        let partial: EventEnrichment =
            serde_json::from_value(serde_json::json!({ "s": ["only a summary"] })).unwrap();
        assert_eq!(partial.summary, vec!["only a summary"]);
        assert!(partial.reasons.is_empty());
        assert!(partial.tags.is_empty());
    }
}

//! Run analytics: who is hiring, where, for what, and how the candidate fared.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::models::{ApplicationPriority, AssessmentResult, Record};

pub const TOP_COMPANIES: usize = 10;
pub const TOP_LOCATIONS: usize = 5;
pub const TOP_TITLES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountEntry {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCount {
    pub day: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PriorityBreakdown {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunAnalytics {
    pub total_records: usize,
    pub top_companies: Vec<CountEntry>,
    pub top_locations: Vec<CountEntry>,
    pub top_titles: Vec<CountEntry>,
    /// Oldest day first. Postings without a readable `date_posted` are left out.
    pub posts_by_day: Vec<DayCount>,
    pub priority_breakdown: PriorityBreakdown,
    /// `None` when nothing was resolved.
    pub mean_match_score: Option<f64>,
}

impl RunAnalytics {
    /// `records` are the de-duplicated postings offered to the run;
    /// `assessments` the resolved output.
    pub fn compute(records: &[Record], assessments: &[AssessmentResult]) -> Self {
        let mut priority_breakdown = PriorityBreakdown::default();
        for assessment in assessments {
            match assessment.application_priority {
                ApplicationPriority::High => priority_breakdown.high += 1,
                ApplicationPriority::Medium => priority_breakdown.medium += 1,
                ApplicationPriority::Low => priority_breakdown.low += 1,
            }
        }

        let mean_match_score = (!assessments.is_empty()).then(|| {
            let total: u64 = assessments.iter().map(|a| u64::from(a.match_score)).sum();
            total as f64 / assessments.len() as f64
        });

        Self {
            total_records: records.len(),
            top_companies: top_values(records.iter().filter_map(Record::company), TOP_COMPANIES),
            top_locations: top_values(records.iter().filter_map(Record::location), TOP_LOCATIONS),
            top_titles: top_values(records.iter().filter_map(Record::title), TOP_TITLES),
            posts_by_day: posts_by_day(records),
            priority_breakdown,
            mean_match_score,
        }
    }
}

/// Most frequent values first; ties broken alphabetically so output is stable.
fn top_values(values: impl Iterator<Item = String>, limit: usize) -> Vec<CountEntry> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for value in values {
        *counts.entry(value).or_default() += 1;
    }

    let mut entries: Vec<CountEntry> = counts
        .into_iter()
        .map(|(value, count)| CountEntry { value, count })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    entries.truncate(limit);
    entries
}

fn posts_by_day(records: &[Record]) -> Vec<DayCount> {
    let mut days: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for day in records
        .iter()
        .filter_map(Record::date_posted)
        .filter_map(|raw| parse_day(&raw))
    {
        *days.entry(day).or_default() += 1;
    }
    days.into_iter()
        .map(|(day, count)| DayCount { day, count })
        .collect()
}

/// Accepts a bare date, an RFC 3339 timestamp or a naive `date time`.
fn parse_day(raw: &str) -> Option<NaiveDate> {
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(day);
    }
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.date_naive());
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|at| at.date())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::result_value;
    use serde_json::json;

    fn posting(company: &str, location: &str, title: &str) -> Record {
        Record::from(json!({
            "company": company,
            "location": location,
            "title": title,
            "job_url": format!("https://jobs.example.com/{company}/{title}")
        }))
    }

    fn assessment(score: u8, priority: &str) -> AssessmentResult {
        let mut value = result_value("https://a");
        value["match_score"] = json!(score);
        value["application_priority"] = json!(priority);
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_top_values_sorted_by_count_then_name() {
        let records = vec![
            posting("Zeta", "Remote", "SRE"),
            posting("Acme", "Berlin", "SRE"),
            posting("Zeta", "Remote", "Backend"),
            posting("Beta", "Remote", "Backend"),
            posting("Acme", "London", "Backend"),
        ];
        let analytics = RunAnalytics::compute(&records, &[]);

        assert_eq!(analytics.total_records, 5);
        assert_eq!(
            analytics.top_companies,
            vec![
                CountEntry { value: "Acme".into(), count: 2 },
                CountEntry { value: "Zeta".into(), count: 2 },
                CountEntry { value: "Beta".into(), count: 1 },
            ]
        );
        assert_eq!(analytics.top_locations[0], CountEntry { value: "Remote".into(), count: 3 });
        assert_eq!(analytics.top_titles[0].value, "Backend");
    }

    #[test]
    fn test_top_locations_capped() {
        let records: Vec<Record> = (0..8)
            .map(|i| posting("Acme", &format!("City {i}"), &format!("Role {i}")))
            .collect();
        let analytics = RunAnalytics::compute(&records, &[]);
        assert_eq!(analytics.top_locations.len(), TOP_LOCATIONS);
        assert_eq!(analytics.top_titles.len(), 8);
    }

    #[test]
    fn test_missing_fields_are_not_counted() {
        let records = vec![Record::from(json!({ "job_url": "https://x" }))];
        let analytics = RunAnalytics::compute(&records, &[]);
        assert!(analytics.top_companies.is_empty());
        assert_eq!(analytics.mean_match_score, None);
    }

    #[test]
    fn test_posts_by_day_groups_by_calendar_day() {
        let dated = |url: &str, date: serde_json::Value| {
            Record::from(json!({ "job_url": url, "date_posted": date }))
        };
        let records = vec![
            dated("https://a", json!("2024-05-02")),
            dated("https://b", json!("2024-05-01T09:30:00Z")),
            dated("https://c", json!("2024-05-02 17:45:00")),
            dated("https://d", json!("yesterday")),
            dated("https://e", json!(null)),
            dated("https://f", json!(20240501)),
            Record::from(json!({ "job_url": "https://g" })),
        ];

        let analytics = RunAnalytics::compute(&records, &[]);

        let day = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        assert_eq!(
            analytics.posts_by_day,
            vec![
                DayCount { day: day("2024-05-01"), count: 1 },
                DayCount { day: day("2024-05-02"), count: 2 },
            ]
        );
        assert_eq!(analytics.total_records, 7);

        let body = serde_json::to_value(&analytics).unwrap();
        assert_eq!(body["posts_by_day"][0]["day"], "2024-05-01");
    }

    #[test]
    fn test_priority_breakdown_and_mean_score() {
        let assessments = vec![
            assessment(90, "High"),
            assessment(60, "Medium"),
            assessment(30, "Low"),
            assessment(80, "High"),
        ];
        let analytics = RunAnalytics::compute(&[], &assessments);

        assert_eq!(
            analytics.priority_breakdown,
            PriorityBreakdown { high: 2, medium: 1, low: 1 }
        );
        assert_eq!(analytics.mean_match_score, Some(65.0));
    }
}

use serde::Serialize;

use crate::prober::{ConnectionPolicy, Headers, Measurement};
use crate::search::SearchMatch;
use crate::util::as_millis_f64;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SearchOutcome {
    Matched {
        #[serde(rename = "match")]
        found: SearchMatch,
    },
    NoMatch,
    /// The response was not a 200, so the body was not inspected.
    Skipped,
}

impl From<Option<SearchMatch>> for SearchOutcome {
    fn from(found: Option<SearchMatch>) -> Self {
        match found {
            Some(found) => Self::Matched { found },
            None => Self::NoMatch,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub url: String,
    pub policy: ConnectionPolicy,
    pub status: u16,
    pub ttfb_ms: f64,
    pub total_ms: f64,
    pub body_bytes: usize,
    pub headers: Headers,
    pub search: SearchOutcome,
}

impl Report {
    pub fn new(
        url: &str,
        policy: ConnectionPolicy,
        measurement: &Measurement,
        search: SearchOutcome,
    ) -> Self {
        Self {
            url: url.to_string(),
            policy,
            status: measurement.status,
            ttfb_ms: as_millis_f64(measurement.ttfb),
            total_ms: as_millis_f64(measurement.total),
            body_bytes: measurement.body.len(),
            headers: measurement.headers.clone(),
            search,
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        match &self.search {
            SearchOutcome::Matched { found } => out.push_str(&format!(
                "HTML Search Results: [{}]\n",
                found.submatches().join(" ")
            )),
            SearchOutcome::NoMatch => out.push_str("HTML Search Results: []\n"),
            SearchOutcome::Skipped => {}
        }
        out.push_str(&format!("Time to first byte: {:.1}ms\n", self.ttfb_ms));
        if matches!(self.search, SearchOutcome::Skipped) {
            out.push_str(&format!(
                "Ups... no connection to {} (HTTP {}). Please check your internet\n",
                self.url, self.status
            ));
        } else {
            out.push_str(&format!(
                "\nYour test took {:.1}ms ({} bytes)\n",
                self.total_ms, self.body_bytes
            ));
        }
        out
    }

    pub fn render_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

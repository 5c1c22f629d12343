//! Structured artifacts produced by the individual steps.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Minimum number of sections an outline must carry.
pub const MIN_OUTLINE_SECTIONS: usize = 5;

/// A single section of the planned outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionOutline {
    /// Section number, e.g. "1" or "1.1". Used as the section identifier.
    pub number: String,
    pub title: String,
    #[serde(default)]
    pub subsections: Vec<String>,
}

/// Planned document structure produced by the plan step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outline {
    pub title: String,
    pub industry: String,
    pub sections: Vec<SectionOutline>,
    #[serde(default = "default_estimated_pages")]
    pub estimated_pages: u32,
}

fn default_estimated_pages() -> u32 {
    5
}

impl Outline {
    /// Checks the structural constraints of an outline.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("outline title is empty".to_string());
        }
        if self.sections.len() < MIN_OUTLINE_SECTIONS {
            return Err(format!(
                "outline has {} sections, at least {} required",
                self.sections.len(),
                MIN_OUTLINE_SECTIONS
            ));
        }
        if !(1..=100).contains(&self.estimated_pages) {
            return Err(format!(
                "estimated_pages {} outside 1..=100",
                self.estimated_pages
            ));
        }
        let mut seen = HashSet::new();
        for section in &self.sections {
            let number = section.number.trim();
            if number.is_empty() {
                return Err(format!("section '{}' has no number", section.title));
            }
            if !seen.insert(number) {
                return Err(format!(
                    "section number {} is used by more than one section",
                    number
                ));
            }
        }
        Ok(())
    }

    pub fn section(&self, number: &str) -> Option<&SectionOutline> {
        self.sections.iter().find(|s| s.number == number)
    }
}

/// An existing procedure found during research.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarSop {
    pub title: String,
    #[serde(default)]
    pub relevance: f64,
    #[serde(default)]
    pub key_points: Vec<String>,
}

/// Findings produced by the research step.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResearchFindings {
    #[serde(default)]
    pub similar_sops: Vec<SimilarSop>,
    #[serde(default)]
    pub compliance_requirements: Vec<String>,
    #[serde(default)]
    pub best_practices: Vec<String>,
    #[serde(default)]
    pub sources: Vec<String>,
}

/// Generated section text keyed by section number, in outline order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionContent(IndexMap<String, String>);

impl SectionContent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the text of a section, keeping first-insertion order.
    pub fn insert(&mut self, section: impl Into<String>, text: impl Into<String>) {
        self.0.insert(section.into(), text.into());
    }

    pub fn get(&self, section: &str) -> Option<&str> {
        self.0.get(section).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn section_ids(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }
}

/// Quality gate outcome produced by the review step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewResult {
    /// Overall quality score, 0 to 10.
    pub score: f64,
    pub feedback: String,
    #[serde(default)]
    pub issues: Vec<String>,
    pub approved: bool,
    #[serde(default)]
    pub completeness_score: f64,
    #[serde(default)]
    pub clarity_score: f64,
    #[serde(default)]
    pub compliance_score: f64,
}

impl ReviewResult {
    pub fn validate(&self) -> Result<(), String> {
        let scores = [
            ("score", self.score),
            ("completeness_score", self.completeness_score),
            ("clarity_score", self.clarity_score),
            ("compliance_score", self.compliance_score),
        ];
        for (name, value) in scores {
            if !(0.0..=10.0).contains(&value) {
                return Err(format!("{} {} outside 0..=10", name, value));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/artifacts_tests.rs"]
mod tests;

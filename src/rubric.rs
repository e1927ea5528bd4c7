//! Rubric configuration.
//!
//! The rubric is data, not prose baked into the prompt: an ordered list of
//! category names. Deployments disagree on how many categories they audit
//! (six and ten category variants are both in use), so the list is loadable
//! from a JSON file and only the default lives in code.

use std::path::Path;

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

/// Ordered list of scored categories used to structure the evaluation prompt.
///
/// Each category is scored 1-10 or marked not-applicable by the generation
/// service; scores are never parsed or recomputed locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rubric {
    pub categories: Vec<String>,
}

impl Default for Rubric {
    fn default() -> Self {
        Self {
            categories: [
                "Greeting & Professionalism",
                "Call-Purpose Identification",
                "Verification & Accuracy",
                "Order & Content Accuracy",
                "Product Knowledge",
                "Empathy & Tone",
                "Call Control & Efficiency",
                "Active Listening",
                "Problem Resolution",
                "Closing",
            ]
            .into_iter()
            .map(str::to_owned)
            .collect(),
        }
    }
}

impl Rubric {
    /// Load a rubric from a JSON file of the form `{"categories": [...]}`.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read rubric file '{}'", path.display()))?;
        let rubric: Rubric = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse rubric file '{}'", path.display()))?;
        rubric.validate()?;
        Ok(rubric)
    }

    /// A rubric must have at least one category; empty names are nonsense too.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.categories.is_empty(),
            "rubric must contain at least one category"
        );
        ensure!(
            self.categories.iter().all(|c| !c.trim().is_empty()),
            "rubric categories must be non-empty"
        );
        Ok(())
    }
}

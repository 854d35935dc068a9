//! Locating the provider run that belongs to a slug.
//!
//! Provider runs are not indexed by slug, so the status endpoint scans a
//! page of recent runs. The forecast workflow echoes the slug into its run
//! name, which surfaces as the run's `display_title`.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Event type of runs started through the dispatch API.
pub const DISPATCH_EVENT: &str = "workflow_dispatch";

/// Display name of the forecast workflow.
pub const DEFAULT_WORKFLOW_NAME: &str = "Forecast Request";

/// Run metadata as reported by the provider's run listing.
///
/// Text fields the provider omits or nulls deserialize as empty strings or
/// `None`; nothing here is interpreted beyond matching.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub display_title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub event: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// How loosely a run may match a slug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Slug in the display title, or the run carries the workflow's name.
    ///
    /// The name fallback can pick up an unrelated run of the same workflow.
    #[default]
    Legacy,
    /// Slug in the display title only.
    Strict,
}

impl FromStr for MatchMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "strict" => Ok(Self::Strict),
            other => Err(CoreError::Validation(format!(
                "unknown run match mode '{other}' (expected 'legacy' or 'strict')"
            ))),
        }
    }
}

/// Matching rule for a single slug lookup.
#[derive(Debug, Clone)]
pub struct RunMatcher<'a> {
    pub slug: &'a str,
    pub workflow_name: &'a str,
    pub mode: MatchMode,
}

impl RunMatcher<'_> {
    pub fn matches(&self, run: &WorkflowRun) -> bool {
        if run.event != DISPATCH_EVENT {
            return false;
        }
        let titled = run.display_title.contains(self.slug);
        match self.mode {
            MatchMode::Strict => titled,
            MatchMode::Legacy => titled || run.name == self.workflow_name,
        }
    }

    /// First run in provider order (newest first) that matches.
    pub fn find<'r>(&self, runs: &'r [WorkflowRun]) -> Option<&'r WorkflowRun> {
        runs.iter().find(|run| self.matches(run))
    }
}

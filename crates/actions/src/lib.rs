//! GitHub Actions client for triggering and polling forecast workflow runs.
//!
//! [`WorkflowProvider`] is the seam the HTTP handlers depend on;
//! [`GitHubActions`] implements it over the provider's REST API.

pub mod api;
pub mod provider;

pub use api::{ActionsConfig, ActionsError, GitHubActions};
pub use provider::WorkflowProvider;

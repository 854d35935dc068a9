//! Forecast run requests and their normalization into a workflow dispatch.
//!
//! [`RunRequest`] is the body a front-end posts to the dispatch endpoint.
//! [`RunRequest::plan`] applies the allow-list, payload parsing, demo-mode
//! and series rules in order and yields a [`DispatchPlan`] holding the
//! target repository and the string-encoded [`WorkflowInputs`] the provider
//! expects. Every rejection is a [`CoreError`], raised before anything is
//! sent anywhere.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::CoreError;
use crate::slug::{build_slug, SlugZone};

/// Repository targeted when neither the request nor the deployment names one.
pub const DEFAULT_REPO: &str = "bryanwhiting/weatherman";

/// Series identifier reserved for the built-in demo dataset.
pub const DEMO_SERIES_NAME: &str = "demo_mode_m5";

/// Number of demo series requested when the client gives no usable count.
pub const DEFAULT_SERIES_COUNT: u32 = 3;

/// Backtest windows requested when the client gives no usable count.
pub const DEFAULT_BACKTEST_WINDOWS: u32 = 3;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// How the dispatch endpoint treats incoming requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// Validate the request, rewrite demo-mode payloads and derive the slug.
    #[default]
    Derive,
    /// Forward a caller-supplied slug and payload with minimal checks.
    PassThrough,
}

impl FromStr for DispatchMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "derive" => Ok(Self::Derive),
            "passthrough" | "pass-through" | "pass_through" => Ok(Self::PassThrough),
            other => Err(CoreError::Validation(format!(
                "unknown dispatch mode '{other}' (expected 'derive' or 'passthrough')"
            ))),
        }
    }
}

/// Payload layout that identifies which series a forecast covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeriesShape {
    /// A single `series_name` string.
    #[default]
    Single,
    /// Parallel `series_names` and `series_data` arrays.
    Multi,
}

impl FromStr for SeriesShape {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "multi" => Ok(Self::Multi),
            other => Err(CoreError::Validation(format!(
                "unknown series shape '{other}' (expected 'single' or 'multi')"
            ))),
        }
    }
}

/// Deployment-level knobs for request planning.
#[derive(Debug, Clone, Default)]
pub struct DispatchSettings {
    pub mode: DispatchMode,
    pub series_shape: SeriesShape,
    pub slug_zone: SlugZone,
}

// ---------------------------------------------------------------------------
// Request / plan types
// ---------------------------------------------------------------------------

/// Body of a dispatch request as sent by the front-end.
///
/// `payload` may be an object or a JSON-encoded string. Numeric fields are
/// kept as raw JSON so that numbers and numeric strings are both accepted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub run_name_root: Option<String>,
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(default)]
    pub use_m5: Option<bool>,
    #[serde(default)]
    pub backtest_windows: Option<Value>,
    #[serde(default)]
    pub m5_series_count: Option<Value>,
    /// Caller-computed slug, only read in [`DispatchMode::PassThrough`].
    #[serde(default)]
    pub slug: Option<String>,
}

/// Inputs of the forecast workflow. The provider only accepts strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowInputs {
    pub slug: String,
    pub use_m5: String,
    pub m5_series_count: String,
    pub payload: String,
    pub backtest_windows: String,
}

/// A validated request, ready to be sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchPlan {
    pub repo: String,
    pub inputs: WorkflowInputs,
}

impl DispatchPlan {
    pub fn slug(&self) -> &str {
        &self.inputs.slug
    }
}

impl RunRequest {
    /// Validate and normalize this request into a [`DispatchPlan`].
    ///
    /// `now` is the dispatch time used for the slug timestamp.
    pub fn plan(
        &self,
        allowed_repo: &str,
        settings: &DispatchSettings,
        now: DateTime<Utc>,
    ) -> Result<DispatchPlan, CoreError> {
        let repo = self.target_repo(allowed_repo)?;

        let inputs = match settings.mode {
            DispatchMode::Derive => self.derive_inputs(settings, now)?,
            DispatchMode::PassThrough => self.pass_through_inputs()?,
        };

        Ok(DispatchPlan { repo, inputs })
    }

    /// Resolve the requested repository and check it against the allow-list.
    pub fn target_repo(&self, allowed_repo: &str) -> Result<String, CoreError> {
        let requested = self
            .repo
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_REPO);

        if requested != allowed_repo {
            return Err(CoreError::Forbidden(format!(
                "Repo not allowed. Expected {allowed_repo}"
            )));
        }
        Ok(requested.to_string())
    }

    fn derive_inputs(
        &self,
        settings: &DispatchSettings,
        now: DateTime<Utc>,
    ) -> Result<WorkflowInputs, CoreError> {
        let mut payload = parse_payload(self.payload.as_ref())?;
        let run_name_root = self.run_name_root(&payload)?;

        let use_m5 = self.use_m5.unwrap_or(false);
        apply_series_rules(&mut payload, settings.series_shape, use_m5)?;

        let series_count = self
            .m5_series_count
            .as_ref()
            .and_then(parse_count)
            .or_else(|| payload.get("n_series").and_then(parse_count))
            .unwrap_or(DEFAULT_SERIES_COUNT);

        let payload_text = serde_json::to_string(&Value::Object(payload))
            .map_err(|e| CoreError::Internal(format!("failed to encode payload: {e}")))?;

        Ok(WorkflowInputs {
            slug: build_slug(&run_name_root, &settings.slug_zone, now),
            use_m5: use_m5.to_string(),
            m5_series_count: series_count.to_string(),
            payload: payload_text,
            backtest_windows: self.backtest_windows().to_string(),
        })
    }

    fn pass_through_inputs(&self) -> Result<WorkflowInputs, CoreError> {
        let slug = self
            .slug
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CoreError::Validation("slug is required".to_string()))?;

        let payload = match &self.payload {
            None | Some(Value::Null) => "{}".to_string(),
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
        };

        let series_count = self
            .m5_series_count
            .as_ref()
            .and_then(parse_count)
            .unwrap_or(DEFAULT_SERIES_COUNT);

        Ok(WorkflowInputs {
            slug: slug.to_string(),
            use_m5: self.use_m5.unwrap_or(false).to_string(),
            m5_series_count: series_count.to_string(),
            payload,
            backtest_windows: self.backtest_windows().to_string(),
        })
    }

    /// Top-level `run_name_root`, falling back to the one nested in the payload.
    fn run_name_root(&self, payload: &Map<String, Value>) -> Result<String, CoreError> {
        self.run_name_root
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| {
                payload
                    .get("run_name_root")
                    .and_then(value_as_text)
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
            })
            .ok_or_else(|| CoreError::Validation("payload.run_name_root is required".to_string()))
    }

    fn backtest_windows(&self) -> u32 {
        self.backtest_windows
            .as_ref()
            .and_then(parse_count)
            .unwrap_or(DEFAULT_BACKTEST_WINDOWS)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Interpret the `payload` field: an object, a JSON-encoded object, or nothing.
pub fn parse_payload(raw: Option<&Value>) -> Result<Map<String, Value>, CoreError> {
    let value = match raw {
        None | Some(Value::Null) => return Ok(Map::new()),
        Some(Value::String(text)) if text.trim().is_empty() => return Ok(Map::new()),
        Some(Value::String(text)) => serde_json::from_str::<Value>(text)
            .map_err(|e| CoreError::Validation(format!("payload is not valid JSON: {e}")))?,
        Some(other) => other.clone(),
    };

    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(CoreError::Validation(
            "payload must be a JSON object".to_string(),
        )),
    }
}

/// Enforce demo-mode exclusivity on the payload's series fields.
///
/// With demo mode on, the series identification is overwritten with
/// [`DEMO_SERIES_NAME`]. With it off, the reserved name is rejected, as is a
/// `multi` payload whose name and data arrays disagree in length.
pub fn apply_series_rules(
    payload: &mut Map<String, Value>,
    shape: SeriesShape,
    use_m5: bool,
) -> Result<(), CoreError> {
    if use_m5 {
        match shape {
            SeriesShape::Single => {
                payload.insert("series_name".to_string(), json!(DEMO_SERIES_NAME));
            }
            SeriesShape::Multi => {
                payload.insert("series_names".to_string(), json!([DEMO_SERIES_NAME]));
                payload.insert("series_data".to_string(), json!([]));
            }
        }
        return Ok(());
    }

    if uses_reserved_series_name(payload) {
        return Err(CoreError::Validation(format!(
            "series_name \"{DEMO_SERIES_NAME}\" is reserved for demo mode"
        )));
    }

    if shape == SeriesShape::Multi {
        if let (Some(Value::Array(names)), Some(Value::Array(data))) =
            (payload.get("series_names"), payload.get("series_data"))
        {
            if names.len() != data.len() {
                return Err(CoreError::Validation(format!(
                    "series_names and series_data must have the same length ({} names, {} series)",
                    names.len(),
                    data.len()
                )));
            }
        }
    }

    Ok(())
}

fn uses_reserved_series_name(payload: &Map<String, Value>) -> bool {
    let is_reserved = |v: &Value| v.as_str().is_some_and(|s| s.trim() == DEMO_SERIES_NAME);

    payload.get("series_name").is_some_and(is_reserved)
        || payload
            .get("series_names")
            .and_then(Value::as_array)
            .is_some_and(|names| names.iter().any(is_reserved))
}

/// Read a non-negative integer from a JSON number or numeric string.
fn parse_count(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                return u32::try_from(u).ok();
            }
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0 && *f <= f64::from(u32::MAX))
                .map(|f| f as u32)
        }
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

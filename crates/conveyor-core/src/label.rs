//! Pipeline label templates.

use crate::error::{Error, Result};
use crate::variables::EnvironmentVariables;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([^}]*)\}").unwrap_or_else(|_| unreachable!("placeholder pattern is valid"))
});

pub const DEFAULT_LABEL_TEMPLATE: &str = "${COUNT}";

/// Template rendered into a run label when the run counter is assigned.
///
/// Supports `${COUNT}` and `${ENV:NAME}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct LabelTemplate(String);

impl Default for LabelTemplate {
    fn default() -> Self {
        Self(DEFAULT_LABEL_TEMPLATE.to_string())
    }
}

impl LabelTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn validate(&self) -> Result<()> {
        if self.0.trim().is_empty() {
            return Err(Error::InvalidConfig("label template must not be empty".into()));
        }
        for caps in PLACEHOLDER.captures_iter(&self.0) {
            let name = &caps[1];
            if !name.eq_ignore_ascii_case("COUNT") && !name.starts_with("ENV:") {
                return Err(Error::InvalidConfig(format!(
                    "label template '{}' uses unknown placeholder '{name}'",
                    self.0
                )));
            }
        }
        Ok(())
    }

    /// Missing environment variables render as empty strings.
    pub fn render(&self, counter: u32, variables: &EnvironmentVariables) -> String {
        PLACEHOLDER
            .replace_all(&self.0, |caps: &regex::Captures<'_>| {
                let name = &caps[1];
                if name.eq_ignore_ascii_case("COUNT") {
                    counter.to_string()
                } else if let Some(var) = name.strip_prefix("ENV:") {
                    variables.get(var).unwrap_or_default().to_string()
                } else {
                    caps[0].to_string()
                }
            })
            .into_owned()
    }
}

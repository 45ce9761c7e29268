//! Reconciler configuration.
//!
//! ```rust
//! use trellis_core::config::{RenderConfig, TextLeafPolicy};
//!
//! let config = RenderConfig::from_json(r#"{ "text_leaves": "in_place" }"#).unwrap();
//! assert_eq!(config.text_leaves, TextLeafPolicy::InPlace);
//! assert_eq!(RenderConfig::default().text_leaves, TextLeafPolicy::Replace);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How a text leaf whose content changed is brought up to date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextLeafPolicy {
    /// Content is part of a text leaf's identity: a changed leaf is replaced
    /// by a freshly created host node.
    #[default]
    Replace,

    /// Text leaves match by kind alone and changed content is written into
    /// the existing host node.
    InPlace,
}

/// Options for a [`Reconciler`](crate::reconcile::Reconciler) and the render
/// sessions built on it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    pub text_leaves: TextLeafPolicy,
}

impl RenderConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the text leaf policy.
    pub fn with_text_leaves(mut self, policy: TextLeafPolicy) -> Self {
        self.text_leaves = policy;
        self
    }
}

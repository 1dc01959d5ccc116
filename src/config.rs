//! Engine configuration
//!
//! Every field has a default, so a partial JSON document is a valid config:
//!
//! ```rust
//! use trendstart::config::EngineConfig;
//!
//! let config: EngineConfig = serde_json::from_str(r#"{ "track_containment": false }"#).unwrap();
//! assert!(config.enforce_alternation);
//! assert!(!config.track_containment);
//! ```

use crate::{rules::RuleId, Result, TrendError};

// ============================================================
// CONFIG
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Reject NaN/infinite prices and high < low before processing
  pub validate_data: bool,
  /// Insert forced events between same-direction confirmations
  pub enforce_alternation: bool,
  /// Track the containment sub-state
  pub track_containment: bool,
  /// Skip candidate formation for bars inside an active containment
  pub suppress_formation_while_contained: bool,
  /// Confirmation rules removed from their tables
  pub disabled_rules: Vec<RuleId>,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      validate_data: true,
      enforce_alternation: true,
      track_containment: true,
      suppress_formation_while_contained: false,
      disabled_rules: Vec::new(),
    }
  }
}

impl EngineConfig {
  pub fn validate(&self) -> Result<()> {
    if self.disabled_rules.contains(&RuleId::ForcedAlternation) {
      return Err(TrendError::InvalidConfig(
        "forced-alternation is not a table rule; use enforce_alternation = false".into(),
      ));
    }
    if self.suppress_formation_while_contained && !self.track_containment {
      return Err(TrendError::InvalidConfig(
        "suppress_formation_while_contained requires track_containment".into(),
      ));
    }
    Ok(())
  }

  pub fn is_disabled(&self, rule: RuleId) -> bool {
    self.disabled_rules.contains(&rule)
  }
}

// ============================================================
// TESTS
// ============================================================

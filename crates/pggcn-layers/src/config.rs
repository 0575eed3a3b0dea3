//! Layer configuration.
//!
//! Each layer has a serde-derived config with defaults and `with_*`
//! builders. [`ModelConfig`] groups them for loading from a TOML file:
//!
//! ```toml
//! use_gpu = false
//!
//! [rule_conv]
//! out_channel = 32
//! num_features = 81
//! num_bond = 22
//! rules = [
//!     { rule = "distance", start = 0, end = 3 },
//!     { rule = "sum", start = 3 },
//! ]
//!
//! [pool]
//! out_channel = 16
//! num_features = 32
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::activation::Activation;
use crate::rules::RuleSpec;
use crate::{LayerError, Result};

fn default_rule_features() -> usize {
    81
}

fn default_num_bond() -> usize {
    22
}

fn default_graph_features() -> usize {
    80
}

fn default_graph_activation() -> Option<Activation> {
    Some(Activation::Relu)
}

fn default_pool_features() -> usize {
    40
}

fn check_nonzero(name: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(LayerError::Config(format!("{} must be greater than zero", name)));
    }
    Ok(())
}

/// Configuration for [`RuleGraphConv`](crate::RuleGraphConv).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleGraphConvConfig {
    /// Output vector length
    pub out_channel: usize,

    /// Atom feature length (default: 81)
    #[serde(default = "default_rule_features")]
    pub num_features: usize,

    /// Bond descriptor length (default: 22)
    #[serde(default = "default_num_bond")]
    pub num_bond: usize,

    /// Activation carried with the layer (default: none)
    #[serde(default)]
    pub activation: Option<Activation>,

    /// Named combination rules, applied in order
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

impl RuleGraphConvConfig {
    pub fn new(out_channel: usize) -> Self {
        Self {
            out_channel,
            num_features: default_rule_features(),
            num_bond: default_num_bond(),
            activation: None,
            rules: Vec::new(),
        }
    }

    pub fn with_num_features(mut self, num_features: usize) -> Self {
        self.num_features = num_features;
        self
    }

    pub fn with_num_bond(mut self, num_bond: usize) -> Self {
        self.num_bond = num_bond;
        self
    }

    pub fn with_activation(mut self, activation: Option<Activation>) -> Self {
        self.activation = activation;
        self
    }

    /// Append a named rule.
    pub fn with_rule(mut self, rule: impl Into<String>, start: usize, end: Option<usize>) -> Self {
        self.rules.push(RuleSpec::new(rule, start, end));
        self
    }

    pub fn validate(&self) -> Result<()> {
        check_nonzero("out_channel", self.out_channel)?;
        check_nonzero("num_features", self.num_features)
    }
}

/// Configuration for [`GraphConv`](crate::GraphConv).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphConvConfig {
    pub out_channel: usize,

    /// Atom feature length (default: 80)
    #[serde(default = "default_graph_features")]
    pub num_features: usize,

    /// Activation re-applied after each neighbor (default: relu)
    #[serde(default = "default_graph_activation")]
    pub activation: Option<Activation>,
}

impl GraphConvConfig {
    pub fn new(out_channel: usize) -> Self {
        Self {
            out_channel,
            num_features: default_graph_features(),
            activation: default_graph_activation(),
        }
    }

    pub fn with_num_features(mut self, num_features: usize) -> Self {
        self.num_features = num_features;
        self
    }

    pub fn with_activation(mut self, activation: Option<Activation>) -> Self {
        self.activation = activation;
        self
    }

    pub fn validate(&self) -> Result<()> {
        check_nonzero("out_channel", self.out_channel)?;
        check_nonzero("num_features", self.num_features)
    }
}

/// Configuration for [`SoftmaxPoolConv`](crate::SoftmaxPoolConv).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftmaxPoolConfig {
    pub out_channel: usize,

    /// Node feature length (default: 40)
    #[serde(default = "default_pool_features")]
    pub num_features: usize,
}

impl SoftmaxPoolConfig {
    pub fn new(out_channel: usize) -> Self {
        Self {
            out_channel,
            num_features: default_pool_features(),
        }
    }

    pub fn with_num_features(mut self, num_features: usize) -> Self {
        self.num_features = num_features;
        self
    }

    pub fn validate(&self) -> Result<()> {
        check_nonzero("out_channel", self.out_channel)?;
        check_nonzero("num_features", self.num_features)
    }
}

/// Layer stack description, as loaded from a config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Use GPU if available (default: false)
    #[serde(default)]
    pub use_gpu: bool,

    #[serde(default)]
    pub rule_conv: Option<RuleGraphConvConfig>,

    #[serde(default)]
    pub graph_conv: Option<GraphConvConfig>,

    #[serde(default)]
    pub pool: Option<SoftmaxPoolConfig>,
}

impl ModelConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.toml` or `.json` file, chosen by extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_toml_str(&content),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(rule_conv) = &self.rule_conv {
            rule_conv.validate()?;
        }
        if let Some(graph_conv) = &self.graph_conv {
            graph_conv.validate()?;
        }
        if let Some(pool) = &self.pool {
            pool.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let rule = RuleGraphConvConfig::new(8);
        assert_eq!((rule.num_features, rule.num_bond, rule.activation), (81, 22, None));

        let graph = GraphConvConfig::new(8);
        assert_eq!((graph.num_features, graph.activation), (80, Some(Activation::Relu)));

        assert_eq!(SoftmaxPoolConfig::new(8).num_features, 40);
    }

    #[test]
    fn test_toml_fills_defaults() {
        let config = ModelConfig::from_toml_str(
            r#"
            [rule_conv]
            out_channel = 32
            rules = [
                { rule = "distance", start = 0, end = 3 },
                { rule = "sum", start = 3 },
            ]

            [graph_conv]
            out_channel = 16
            activation = "tanh"
            "#,
        )
        .unwrap();

        let rule = config.rule_conv.unwrap();
        assert_eq!(rule.num_features, 81);
        assert_eq!(rule.num_bond, 22);
        assert_eq!(rule.rules[1], RuleSpec::new("sum", 3, None));

        let graph = config.graph_conv.unwrap();
        assert_eq!(graph.activation, Some(Activation::Tanh));
        assert!(config.pool.is_none());
        assert!(!config.use_gpu);
    }

    #[test]
    fn test_zero_out_channel_rejected() {
        let err = ModelConfig::from_toml_str("[pool]\nout_channel = 0\n").unwrap_err();
        assert!(matches!(err, LayerError::Config(_)));
    }

    #[test]
    fn test_json_config() {
        let json = r#"{"pool": {"out_channel": 4, "num_features": 8}}"#;
        let config = ModelConfig::from_json_str(json).unwrap();
        assert_eq!(config.pool, Some(SoftmaxPoolConfig::new(4).with_num_features(8)));
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            ModelConfig::from_toml_str("[rule_conv\nout_channel = 1"),
            Err(LayerError::Toml(_))
        ));
    }
}

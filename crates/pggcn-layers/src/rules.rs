//! Combination rules.
//!
//! A [`RulePipeline`] describes how an atom's feature vector is merged with a
//! neighbor's: each [`CombinationRule`] consumes the same sub-range of both
//! vectors and emits one chunk, and the chunks are concatenated in rule order.
//!
//! ```rust,ignore
//! let mut pipeline = RulePipeline::new();
//! pipeline
//!     .add_rule("distance", 0, Some(3))?   // coordinates
//!     .add_rule("multiply", 3, Some(40))?
//!     .add_rule("sum", 40, None)?;         // rest of the vector
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use candle_core::Tensor;
use serde::{Deserialize, Serialize};

use crate::{LayerError, Result};

type BinaryFn = dyn Fn(&Tensor, &Tensor) -> candle_core::Result<Tensor> + Send + Sync;

/// User-supplied element-wise combination.
#[derive(Clone)]
pub struct CustomOp {
    name: String,
    func: Arc<BinaryFn>,
}

impl CustomOp {
    /// Wrap `func` under `name`. The name is what [`CombineOp::name`] reports.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Tensor, &Tensor) -> candle_core::Result<Tensor> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Name given at construction.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Apply the wrapped function to an `(own, neighbor)` slice pair.
    pub fn call(&self, lhs: &Tensor, rhs: &Tensor) -> candle_core::Result<Tensor> {
        (self.func)(lhs, rhs)
    }
}

impl fmt::Debug for CustomOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomOp").field("name", &self.name).finish()
    }
}

/// Binary operator applied to a pair of sub-vectors.
#[derive(Debug, Clone)]
pub enum CombineOp {
    Sum,
    Multiply,
    Divide,
    Subtract,
    /// Pass the neighbor's sub-vector through unchanged and record the
    /// Euclidean distance between the two sub-vectors.
    Distance,
    Custom(CustomOp),
}

impl CombineOp {
    /// Resolve a symbolic rule name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "sum" => Ok(CombineOp::Sum),
            "multiply" => Ok(CombineOp::Multiply),
            "distance" => Ok(CombineOp::Distance),
            "divide" => Ok(CombineOp::Divide),
            "subtract" => Ok(CombineOp::Subtract),
            other => Err(LayerError::UnknownRule(other.to_string())),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            CombineOp::Sum => "sum",
            CombineOp::Multiply => "multiply",
            CombineOp::Divide => "divide",
            CombineOp::Subtract => "subtract",
            CombineOp::Distance => "distance",
            CombineOp::Custom(op) => op.name(),
        }
    }

    pub fn is_distance(&self) -> bool {
        matches!(self, CombineOp::Distance)
    }

    /// Apply an element-wise operator.
    ///
    /// [`CombineOp::Distance`] is not element-wise; for it this returns the
    /// neighbor sub-vector unchanged. The combiner computes the distance
    /// itself.
    pub fn apply(&self, own: &Tensor, neighbor: &Tensor) -> candle_core::Result<Tensor> {
        match self {
            CombineOp::Sum => own.add(neighbor),
            CombineOp::Multiply => own.mul(neighbor),
            CombineOp::Divide => own.div(neighbor),
            CombineOp::Subtract => own.sub(neighbor),
            CombineOp::Distance => Ok(neighbor.clone()),
            CombineOp::Custom(op) => op.call(own, neighbor),
        }
    }
}

impl FromStr for CombineOp {
    type Err = LayerError;

    fn from_str(s: &str) -> Result<Self> {
        CombineOp::from_name(s)
    }
}

impl From<CustomOp> for CombineOp {
    fn from(op: CustomOp) -> Self {
        CombineOp::Custom(op)
    }
}

/// One `(start, end, operator)` entry. `end = None` runs to the end of the
/// vector.
#[derive(Debug, Clone)]
pub struct CombinationRule {
    pub start: usize,
    pub end: Option<usize>,
    pub op: CombineOp,
}

impl CombinationRule {
    /// Resolve the rule's range against a vector of length `len`.
    pub fn range(&self, len: usize) -> Result<(usize, usize)> {
        let end = self.end.unwrap_or(len);
        if self.start > end || end > len {
            return Err(LayerError::RangeOutOfBounds {
                start: self.start,
                end,
                len,
            });
        }
        Ok((self.start, end))
    }

    pub fn is_open_ended(&self) -> bool {
        self.end.is_none()
    }
}

/// Serialisable form of a named rule, as it appears in configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub rule: String,
    pub start: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<usize>,
}

impl RuleSpec {
    pub fn new(rule: impl Into<String>, start: usize, end: Option<usize>) -> Self {
        Self {
            rule: rule.into(),
            start,
            end,
        }
    }
}

/// Ordered list of combination rules.
#[derive(Debug, Clone, Default)]
pub struct RulePipeline {
    rules: Vec<CombinationRule>,
}

impl RulePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pipeline from named rule specs.
    pub fn from_specs(specs: &[RuleSpec]) -> Result<Self> {
        let mut pipeline = Self::new();
        for spec in specs {
            pipeline.add_rule(&spec.rule, spec.start, spec.end)?;
        }
        Ok(pipeline)
    }

    /// Append a rule by symbolic name.
    ///
    /// Ranges are not checked here; a range that does not fit the feature
    /// vector fails during the forward pass.
    pub fn add_rule(
        &mut self,
        rule: &str,
        start: usize,
        end: Option<usize>,
    ) -> Result<&mut Self> {
        let op = CombineOp::from_name(rule)?;
        self.add_op(op, start, end)
    }

    /// Append an already-resolved operator.
    ///
    /// Fails with [`LayerError::OpenRangeNotLast`] if the current last rule
    /// has no end.
    pub fn add_op(
        &mut self,
        op: impl Into<CombineOp>,
        start: usize,
        end: Option<usize>,
    ) -> Result<&mut Self> {
        if let Some(last) = self.rules.last() {
            if last.is_open_ended() {
                return Err(LayerError::OpenRangeNotLast {
                    position: self.rules.len() - 1,
                });
            }
        }
        self.rules.push(CombinationRule {
            start,
            end,
            op: op.into(),
        });
        Ok(self)
    }

    /// Rules in the order they are applied.
    pub fn rules(&self) -> &[CombinationRule] {
        &self.rules
    }

    /// Number of registered rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Named specs for every non-custom rule, in order.
    pub fn to_specs(&self) -> Vec<RuleSpec> {
        self.rules
            .iter()
            .filter(|r| !matches!(r.op, CombineOp::Custom(_)))
            .map(|r| RuleSpec::new(r.op.name(), r.start, r.end))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn test_resolve_known_names() {
        for name in ["sum", "multiply", "distance", "divide", "subtract"] {
            let op: CombineOp = name.parse().unwrap();
            assert_eq!(op.name(), name);
        }
        assert!(CombineOp::from_name("distance").unwrap().is_distance());
    }

    #[test]
    fn test_unknown_rule_rejected() {
        let err = CombineOp::from_name("average").unwrap_err();
        assert!(matches!(err, LayerError::UnknownRule(ref n) if n == "average"));

        let mut pipeline = RulePipeline::new();
        assert!(pipeline.add_rule("max", 0, None).is_err());
        assert!(pipeline.is_empty());
    }

    #[test]
    fn test_rules_keep_insertion_order() {
        let mut pipeline = RulePipeline::new();
        pipeline
            .add_rule("sum", 0, Some(2))
            .unwrap()
            .add_rule("multiply", 2, Some(5))
            .unwrap()
            .add_rule("subtract", 5, None)
            .unwrap();

        let names: Vec<&str> = pipeline.rules().iter().map(|r| r.op.name()).collect();
        assert_eq!(names, vec!["sum", "multiply", "subtract"]);
        assert_eq!(pipeline.rules()[2].end, None);
    }

    #[test]
    fn test_open_range_must_be_last() {
        let mut pipeline = RulePipeline::new();
        pipeline.add_rule("sum", 0, None).unwrap();
        let err = pipeline.add_rule("multiply", 3, Some(4)).unwrap_err();
        assert!(matches!(err, LayerError::OpenRangeNotLast { position: 0 }));
        assert_eq!(pipeline.len(), 1);
    }

    #[test]
    fn test_ranges_not_checked_at_add_time() {
        let mut pipeline = RulePipeline::new();
        pipeline.add_rule("sum", 10, Some(500)).unwrap();
        let err = pipeline.rules()[0].range(81).unwrap_err();
        assert!(matches!(err, LayerError::RangeOutOfBounds { start: 10, end: 500, len: 81 }));
    }

    #[test]
    fn test_custom_op() {
        let max = CustomOp::new("max", |a, b| a.maximum(b));
        let mut pipeline = RulePipeline::new();
        pipeline.add_op(max, 0, None).unwrap();

        let device = Device::Cpu;
        let a = Tensor::new(&[1.0f32, 5.0], &device).unwrap();
        let b = Tensor::new(&[3.0f32, 2.0], &device).unwrap();
        let out = pipeline.rules()[0].op.apply(&a, &b).unwrap();
        assert_eq!(out.to_vec1::<f32>().unwrap(), vec![3.0, 5.0]);
        assert!(pipeline.to_specs().is_empty());
    }

    #[test]
    fn test_specs_round_trip_through_pipeline() {
        let specs = vec![RuleSpec::new("distance", 0, Some(3)), RuleSpec::new("sum", 3, None)];
        let pipeline = RulePipeline::from_specs(&specs).unwrap();
        assert_eq!(pipeline.to_specs(), specs);
    }
}

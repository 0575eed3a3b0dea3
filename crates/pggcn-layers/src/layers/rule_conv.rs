//! Rule-based graph convolution.

use std::time::Instant;

use candle_core::{DType, Tensor};
use candle_nn::VarBuilder;
use tracing::{debug, info};

use super::{check_weight, forward_graph, glorot_uniform, MessagePassing};
use crate::activation::Activation;
use crate::combiner::NeighborCombiner;
use crate::config::RuleGraphConvConfig;
use crate::graph::Graph;
use crate::rules::{CombineOp, RulePipeline};
use crate::Result;

/// Graph convolution whose neighbor messages are built by a [`RulePipeline`].
///
/// For node `i` with neighbors `j`:
///
/// ```text
/// h_i' = h_i W_s + sum_j [combine(h_i, h_j) || b_ij] W_n
/// ```
pub struct RuleGraphConv {
    w_s: Tensor,
    w_n: Tensor,
    combiner: NeighborCombiner,
    out_channel: usize,
    num_features: usize,
    num_bond: usize,
    activation: Option<Activation>,
}

impl RuleGraphConv {
    /// Create the layer with Glorot-initialised weights from `vb`.
    pub fn new(config: RuleGraphConvConfig, vb: VarBuilder) -> Result<Self> {
        config.validate()?;
        let w_s = glorot_uniform(&vb, config.num_features, config.out_channel, "w_s")?;
        let w_n = glorot_uniform(
            &vb,
            config.num_features + config.num_bond,
            config.out_channel,
            "w_n",
        )?;
        Self::from_weights(config, w_s, w_n)
    }

    /// Create the layer around existing weights.
    ///
    /// `w_s` must be `(num_features, out_channel)` and `w_n`
    /// `(num_features + num_bond, out_channel)`.
    pub fn from_weights(config: RuleGraphConvConfig, w_s: Tensor, w_n: Tensor) -> Result<Self> {
        config.validate()?;
        check_weight(&w_s, config.num_features, config.out_channel, "w_s")?;
        check_weight(
            &w_n,
            config.num_features + config.num_bond,
            config.out_channel,
            "w_n",
        )?;

        let pipeline = RulePipeline::from_specs(&config.rules)?;
        info!(
            "RuleGraphConv: {} features + {} bond -> {} channels, {} rules",
            config.num_features,
            config.num_bond,
            config.out_channel,
            pipeline.len()
        );

        Ok(Self {
            w_s,
            w_n,
            combiner: NeighborCombiner::new(pipeline, config.num_features, config.num_bond),
            out_channel: config.out_channel,
            num_features: config.num_features,
            num_bond: config.num_bond,
            activation: config.activation,
        })
    }

    /// Replace the rule pipeline.
    pub fn with_pipeline(mut self, pipeline: RulePipeline) -> Self {
        self.combiner = NeighborCombiner::new(pipeline, self.num_features, self.num_bond);
        self
    }

    /// Append a named rule to the pipeline.
    pub fn add_rule(
        &mut self,
        rule: &str,
        start: usize,
        end: Option<usize>,
    ) -> Result<&mut Self> {
        self.combiner.pipeline_mut().add_rule(rule, start, end)?;
        Ok(self)
    }

    /// Append a resolved or custom operator to the pipeline.
    pub fn add_op(
        &mut self,
        op: impl Into<CombineOp>,
        start: usize,
        end: Option<usize>,
    ) -> Result<&mut Self> {
        self.combiner.pipeline_mut().add_op(op, start, end)?;
        Ok(self)
    }

    pub fn pipeline(&self) -> &RulePipeline {
        self.combiner.pipeline()
    }

    pub fn combiner(&self) -> &NeighborCombiner {
        &self.combiner
    }

    pub fn w_s(&self) -> &Tensor {
        &self.w_s
    }

    pub fn w_n(&self) -> &Tensor {
        &self.w_n
    }

    pub fn num_bond(&self) -> usize {
        self.num_bond
    }

    /// Configured activation. The forward pass returns the raw projection;
    /// callers apply this between layers if they want it.
    pub fn activation(&self) -> Option<Activation> {
        self.activation
    }

    /// New node features for one graph, shape `(N, out_channel)`.
    pub fn forward_single(&self, graph: &Graph) -> Result<Tensor> {
        forward_graph(self, graph)
    }

    /// New node features for each graph in `batch`, in input order.
    pub fn forward(&self, batch: &[Graph]) -> Result<Vec<Tensor>> {
        let start = Instant::now();
        let output = batch
            .iter()
            .map(|graph| self.forward_single(graph))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            "RuleGraphConv forward: {} graphs in {:.2}ms",
            batch.len(),
            start.elapsed().as_secs_f32() * 1000.0
        );
        Ok(output)
    }
}

impl MessagePassing for RuleGraphConv {
    fn num_features(&self) -> usize {
        self.num_features
    }

    fn out_channel(&self) -> usize {
        self.out_channel
    }

    fn dtype(&self) -> DType {
        self.w_s.dtype()
    }

    fn self_message(&self, own: &Tensor) -> Result<Tensor> {
        Ok(own.matmul(&self.w_s)?)
    }

    fn neighbor_message(
        &self,
        own: &Tensor,
        neighbor: &Tensor,
        bond: &Tensor,
    ) -> Result<Tensor> {
        let combined = self.combiner.combine(own, neighbor, bond)?;
        let combined = combined.reshape((1, self.combiner.output_len()))?;
        Ok(combined.matmul(&self.w_n)?)
    }
}

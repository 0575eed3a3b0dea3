//! Plain graph convolution.

use candle_core::{DType, Tensor};
use candle_nn::VarBuilder;
use tracing::{debug, info};

use super::{check_weight, forward_graph, glorot_uniform, MessagePassing};
use crate::activation::Activation;
use crate::config::GraphConvConfig;
use crate::graph::Graph;
use crate::Result;

/// Graph convolution without combination rules or bond features.
///
/// ```text
/// acc = h_i W_s
/// for j in N(i): acc = act(acc + h_j W_n)
/// ```
///
/// The activation is re-applied after every neighbor, so a node's output
/// depends on its neighbor order when the activation is not idempotent.
/// Isolated nodes skip the activation entirely.
pub struct GraphConv {
    w_s: Tensor,
    w_n: Tensor,
    out_channel: usize,
    num_features: usize,
    activation: Option<Activation>,
}

impl GraphConv {
    /// Create the layer with Glorot-initialised `w_s` and `w_n` from `vb`.
    pub fn new(config: GraphConvConfig, vb: VarBuilder) -> Result<Self> {
        config.validate()?;
        let w_s = glorot_uniform(&vb, config.num_features, config.out_channel, "w_s")?;
        let w_n = glorot_uniform(&vb, config.num_features, config.out_channel, "w_n")?;
        Self::from_weights(config, w_s, w_n)
    }

    /// Both weights must be `(num_features, out_channel)`.
    pub fn from_weights(config: GraphConvConfig, w_s: Tensor, w_n: Tensor) -> Result<Self> {
        config.validate()?;
        check_weight(&w_s, config.num_features, config.out_channel, "w_s")?;
        check_weight(&w_n, config.num_features, config.out_channel, "w_n")?;
        info!(
            "GraphConv: {} features -> {} channels, activation {:?}",
            config.num_features, config.out_channel, config.activation
        );
        Ok(Self {
            w_s,
            w_n,
            out_channel: config.out_channel,
            num_features: config.num_features,
            activation: config.activation,
        })
    }

    /// Self weight, `(num_features, out_channel)`.
    pub fn w_s(&self) -> &Tensor {
        &self.w_s
    }

    /// Neighbor weight, `(num_features, out_channel)`.
    pub fn w_n(&self) -> &Tensor {
        &self.w_n
    }

    /// Activation re-applied after each neighbor, if any.
    pub fn activation(&self) -> Option<Activation> {
        self.activation
    }

    /// New features for one graph, paired with its unchanged adjacency.
    pub fn forward_single(&self, graph: &Graph) -> Result<Graph> {
        let features = forward_graph(self, graph)?;
        Ok(Graph::new(features, graph.adjacency.clone()))
    }

    pub fn forward(&self, batch: &[Graph]) -> Result<Vec<Graph>> {
        debug!("GraphConv forward: {} graphs", batch.len());
        batch.iter().map(|graph| self.forward_single(graph)).collect()
    }
}

impl MessagePassing for GraphConv {
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
        _own: &Tensor,
        neighbor: &Tensor,
        _bond: &Tensor,
    ) -> Result<Tensor> {
        let neighbor = neighbor.reshape((1, self.num_features))?;
        Ok(neighbor.matmul(&self.w_n)?)
    }

    fn step_activation(&self) -> Option<Activation> {
        self.activation
    }
}

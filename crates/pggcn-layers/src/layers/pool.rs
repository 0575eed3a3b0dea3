//! Softmax-weighted graph readout.

use candle_core::{Tensor, D};
use candle_nn::VarBuilder;
use tracing::{debug, info};

use super::{check_weight, glorot_uniform};
use crate::config::SoftmaxPoolConfig;
use crate::{LayerError, Result};

/// Reduces a node feature matrix to one vector per graph:
///
/// ```text
/// out = sum_i softmax(x_i W)
/// ```
pub struct SoftmaxPoolConv {
    w: Tensor,
    out_channel: usize,
    num_features: usize,
}

impl SoftmaxPoolConv {
    /// Create the layer with a Glorot-initialised `w` from `vb`.
    pub fn new(config: SoftmaxPoolConfig, vb: VarBuilder) -> Result<Self> {
        config.validate()?;
        let w = glorot_uniform(&vb, config.num_features, config.out_channel, "w")?;
        Self::from_weights(config, w)
    }

    /// `w` must be `(num_features, out_channel)`.
    pub fn from_weights(config: SoftmaxPoolConfig, w: Tensor) -> Result<Self> {
        config.validate()?;
        check_weight(&w, config.num_features, config.out_channel, "w")?;
        info!(
            "SoftmaxPoolConv: {} features -> {} channels",
            config.num_features, config.out_channel
        );
        Ok(Self {
            w,
            out_channel: config.out_channel,
            num_features: config.num_features,
        })
    }

    /// Projection weight, `(num_features, out_channel)`.
    pub fn w(&self) -> &Tensor {
        &self.w
    }

    /// Pool one `(N, num_features)` node matrix into `(out_channel,)`.
    ///
    /// A graph with no nodes pools to zeros.
    pub fn forward_single(&self, features: &Tensor) -> Result<Tensor> {
        let (num_nodes, width) = features.dims2()?;
        if num_nodes == 0 {
            return Ok(Tensor::zeros(self.out_channel, self.w.dtype(), self.w.device())?);
        }
        if width != self.num_features {
            return Err(LayerError::shape(
                "node features",
                (num_nodes, self.num_features),
                (num_nodes, width),
            ));
        }

        let features = features.to_dtype(self.w.dtype())?;
        let scores = features.matmul(&self.w)?;
        let weights = candle_nn::ops::softmax(&scores, D::Minus1)?;
        Ok(weights.sum(0)?)
    }

    /// Pool every graph in `batch`, returning `(B, out_channel)`.
    pub fn forward(&self, batch: &[Tensor]) -> Result<Tensor> {
        debug!("SoftmaxPoolConv forward: {} graphs", batch.len());
        if batch.is_empty() {
            return Ok(Tensor::zeros((0, self.out_channel), self.w.dtype(), self.w.device())?);
        }
        let pooled = batch
            .iter()
            .map(|features| self.forward_single(features))
            .collect::<Result<Vec<_>>>()?;
        Ok(Tensor::stack(&pooled, 0)?)
    }
}

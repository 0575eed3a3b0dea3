//! Graph convolution layers.
//!
//! - [`RuleGraphConv`]: rule-based neighbor combination with bond features
//! - [`GraphConv`]: plain neighbor projection with activation, adjacency
//!   passed through for stacking
//! - [`SoftmaxPoolConv`]: softmax-weighted readout of a whole graph
//!
//! The two message-passing layers share [`aggregate`] and [`forward_graph`]
//! through the [`MessagePassing`] trait.

pub mod graph_conv;
pub mod pool;
pub mod rule_conv;

pub use graph_conv::GraphConv;
pub use pool::SoftmaxPoolConv;
pub use rule_conv::RuleGraphConv;

use candle_core::{DType, Tensor};
use candle_nn::{Init, VarBuilder};

use crate::activation::Activation;
use crate::graph::Graph;
use crate::{LayerError, Result};

/// Per-node update shared by the message-passing layers.
pub trait MessagePassing {
    fn num_features(&self) -> usize;

    fn out_channel(&self) -> usize;

    /// Element type of the layer's weights and outputs.
    fn dtype(&self) -> DType;

    /// Project a node's own features, `(1, num_features)` -> `(1, out_channel)`.
    fn self_message(&self, own: &Tensor) -> Result<Tensor>;

    /// Contribution of one neighbor, `(1, out_channel)`.
    ///
    /// `own` and `neighbor` have shape `(num_features,)`.
    fn neighbor_message(
        &self,
        own: &Tensor,
        neighbor: &Tensor,
        bond: &Tensor,
    ) -> Result<Tensor>;

    /// Activation re-applied to the accumulator after every neighbor.
    fn step_activation(&self) -> Option<Activation> {
        None
    }
}

/// Compute one node's new feature vector.
///
/// `neighbors` holds `(neighbor_features, bond)` pairs. Returns a tensor of
/// shape `(out_channel,)`.
pub fn aggregate<L>(layer: &L, own: &Tensor, neighbors: &[(Tensor, Tensor)]) -> Result<Tensor>
where
    L: MessagePassing + ?Sized,
{
    let own_row = own.reshape((1, layer.num_features()))?;
    let mut acc = layer.self_message(&own_row)?;
    for (neighbor, bond) in neighbors {
        acc = acc.add(&layer.neighbor_message(own, neighbor, bond)?)?;
        // Applied inside the loop, so it compounds across neighbors.
        if let Some(activation) = layer.step_activation() {
            acc = activation.apply(&acc)?;
        }
    }
    Ok(acc.squeeze(0)?)
}

/// Apply [`aggregate`] to every node of `graph`, returning `(N, out_channel)`.
///
/// Neighbor features are always read from the input matrix, never from
/// nodes already updated in this pass.
pub fn forward_graph<L>(layer: &L, graph: &Graph) -> Result<Tensor>
where
    L: MessagePassing + ?Sized,
{
    let num_nodes = graph.check(layer.num_features())?;
    if num_nodes == 0 {
        return Ok(Tensor::zeros(
            (0, layer.out_channel()),
            layer.dtype(),
            graph.features.device(),
        )?);
    }

    let mut new_features = Vec::with_capacity(num_nodes);
    for (i, adj) in graph.adjacency.iter().enumerate() {
        let own = graph.features.get(i)?;
        let neighbors = adj
            .iter()
            .map(|entry| -> Result<(Tensor, Tensor)> {
                Ok((graph.features.get(entry.neighbor)?, entry.bond.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        new_features.push(aggregate(layer, &own, &neighbors)?);
    }
    Ok(Tensor::stack(&new_features, 0)?)
}

/// Glorot/Xavier uniform weight of shape `(fan_in, fan_out)`.
pub(crate) fn glorot_uniform(
    vb: &VarBuilder,
    fan_in: usize,
    fan_out: usize,
    name: &str,
) -> Result<Tensor> {
    let bound = (6.0 / (fan_in + fan_out) as f64).sqrt();
    let init = Init::Uniform {
        lo: -bound,
        up: bound,
    };
    Ok(vb.get_with_hints((fan_in, fan_out), name, init)?)
}

/// Validate an externally supplied weight matrix.
pub(crate) fn check_weight(weight: &Tensor, rows: usize, cols: usize, name: &str) -> Result<()> {
    let dims = weight.dims();
    if dims != [rows, cols] {
        return Err(LayerError::shape(name, (rows, cols), dims));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;
    use candle_nn::VarMap;

    #[test]
    fn test_glorot_bounds() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);

        let w = glorot_uniform(&vb, 10, 5, "w").unwrap();
        assert_eq!(w.dims(), &[10, 5]);

        let bound = (6.0f32 / 15.0).sqrt();
        let values: Vec<f32> = w.flatten_all().unwrap().to_vec1().unwrap();
        assert!(values.iter().all(|v| v.abs() <= bound));
        assert_eq!(varmap.all_vars().len(), 1);
    }

    #[test]
    fn test_check_weight() {
        let w = Tensor::zeros((3, 2), DType::F32, &Device::Cpu).unwrap();
        assert!(check_weight(&w, 3, 2, "w_s").is_ok());
        assert!(matches!(
            check_weight(&w, 2, 3, "w_s"),
            Err(LayerError::ShapeMismatch { .. })
        ));
    }
}

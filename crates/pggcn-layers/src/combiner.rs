//! Rule-driven neighbor feature combination.

use candle_core::Tensor;
use tracing::trace;

use crate::rules::RulePipeline;
use crate::{LayerError, Result};

/// Floor applied to an atom distance before it is used as a divisor.
pub const MIN_DISTANCE: f64 = 1e-2;

/// Combines an atom's features with one neighbor's features and bond.
///
/// The output has length `num_features + num_bond` and is ready to be
/// projected through the neighbor weight matrix.
#[derive(Debug, Clone)]
pub struct NeighborCombiner {
    pipeline: RulePipeline,
    num_features: usize,
    num_bond: usize,
}

impl NeighborCombiner {
    pub fn new(pipeline: RulePipeline, num_features: usize, num_bond: usize) -> Self {
        Self {
            pipeline,
            num_features,
            num_bond,
        }
    }

    pub fn pipeline(&self) -> &RulePipeline {
        &self.pipeline
    }

    pub(crate) fn pipeline_mut(&mut self) -> &mut RulePipeline {
        &mut self.pipeline
    }

    pub fn output_len(&self) -> usize {
        self.num_features + self.num_bond
    }

    /// Combine `own` and `neighbor` (both shape `(num_features,)`) and append
    /// `bond` (shape `(num_bond,)`).
    pub fn combine(&self, own: &Tensor, neighbor: &Tensor, bond: &Tensor) -> Result<Tensor> {
        let len = own.dim(0)?;
        let neighbor_len = neighbor.dim(0)?;
        if neighbor_len != len {
            return Err(LayerError::shape("neighbor features", len, neighbor_len));
        }

        // Only the last distance rule's value is kept.
        let mut distance: Option<Tensor> = None;
        let mut chunks = Vec::with_capacity(self.pipeline.len());

        for rule in self.pipeline.rules() {
            let (start, end) = rule.range(len)?;
            let own_part = own.narrow(0, start, end - start)?;
            let neighbor_part = neighbor.narrow(0, start, end - start)?;
            trace!(op = rule.op.name(), start, end, "applying combination rule");

            if rule.op.is_distance() {
                distance = Some(atom_distance(&own_part, &neighbor_part)?);
                chunks.push(neighbor_part);
            } else {
                chunks.push(rule.op.apply(&own_part, &neighbor_part)?);
            }
        }

        let width: usize = chunks.iter().map(|c| c.elem_count()).sum();
        if width != self.num_features {
            return Err(LayerError::shape("combined features", self.num_features, width));
        }
        let mut combined = Tensor::cat(&chunks, 0)?;

        if let Some(distance) = distance {
            let distance = distance.maximum(MIN_DISTANCE)?;
            combined = combined.broadcast_div(&distance.sqr()?)?;
        }

        let bond_len = bond.dim(0)?;
        if bond_len != self.num_bond {
            return Err(LayerError::shape("bond descriptor", self.num_bond, bond_len));
        }
        Ok(Tensor::cat(&[&combined, bond], 0)?)
    }
}

/// Euclidean distance between two vectors, as a scalar tensor.
pub fn atom_distance(x: &Tensor, y: &Tensor) -> candle_core::Result<Tensor> {
    x.sub(y)?.sqr()?.sum_all()?.sqrt()
}

//! Element-wise activation functions.

use candle_core::Tensor;
use serde::{Deserialize, Serialize};

/// Activation applied element-wise to a node's accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Relu,
    Sigmoid,
    Tanh,
    Gelu,
    /// Pass-through, useful to disable activation from a config file
    Identity,
}

impl Activation {
    pub fn apply(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        match self {
            Activation::Relu => xs.relu(),
            Activation::Sigmoid => candle_nn::ops::sigmoid(xs),
            Activation::Tanh => xs.tanh(),
            Activation::Gelu => xs.gelu(),
            Activation::Identity => Ok(xs.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn test_relu_clamps_negatives() {
        let xs = Tensor::new(&[-1.0f32, 0.0, 2.5], &Device::Cpu).unwrap();
        let out = Activation::Relu.apply(&xs).unwrap().to_vec1::<f32>().unwrap();
        assert_eq!(out, vec![0.0, 0.0, 2.5]);
    }

    #[test]
    fn test_sigmoid_midpoint() {
        let xs = Tensor::new(&[0.0f32], &Device::Cpu).unwrap();
        let out = Activation::Sigmoid.apply(&xs).unwrap().to_vec1::<f32>().unwrap();
        assert!((out[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_deserialize_lowercase() {
        let act: Activation = serde_json::from_str("\"tanh\"").unwrap();
        assert_eq!(act, Activation::Tanh);
    }
}

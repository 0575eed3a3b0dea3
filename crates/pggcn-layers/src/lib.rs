//! PGGCN graph convolution layers
//!
//! Message-passing layers for molecular graphs, built on Candle.
//!
//! # Layers
//! - [`RuleGraphConv`]: combines each atom with each neighbor through a
//!   configurable [`RulePipeline`] (sum, multiply, divide, subtract,
//!   distance, or custom operators), appends the bond descriptor and
//!   projects through learned weights
//! - [`GraphConv`]: plain neighbor projection with activation; returns the
//!   adjacency list alongside the new features so layers stack
//! - [`SoftmaxPoolConv`]: softmax-weighted readout to one vector per graph
//!
//! Weights come from a `candle_nn::VarBuilder`; a `VarMap`-backed builder
//! exposes them to an external optimizer.
//!
//! # Example
//! ```rust,no_run
//! use candle_core::{DType, Device};
//! use candle_nn::{VarBuilder, VarMap};
//! use pggcn_layers::{Graph, RuleGraphConv, RuleGraphConvConfig};
//!
//! fn main() -> pggcn_layers::Result<()> {
//!     let device = Device::Cpu;
//!     let varmap = VarMap::new();
//!     let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
//!
//!     let config = RuleGraphConvConfig::new(8).with_num_features(4).with_num_bond(2);
//!     let mut layer = RuleGraphConv::new(config, vb)?;
//!     layer.add_rule("distance", 0, Some(3))?.add_rule("multiply", 3, None)?;
//!
//!     let graph = Graph::from_parts(
//!         &[vec![0.0, 0.0, 0.0, 1.0], vec![1.2, 0.0, 0.0, 0.5]],
//!         &[vec![(1, vec![1.0, 0.0])], vec![(0, vec![1.0, 0.0])]],
//!         &device,
//!     )?;
//!
//!     let out = layer.forward(&[graph])?;
//!     println!("{:?}", out[0].dims()); // [2, 8]
//!     Ok(())
//! }
//! ```

pub mod activation;
pub mod combiner;
pub mod config;
pub mod device;
pub mod error;
pub mod graph;
pub mod layers;
pub mod rules;

pub use activation::Activation;
pub use combiner::{NeighborCombiner, MIN_DISTANCE};
pub use config::{GraphConvConfig, ModelConfig, RuleGraphConvConfig, SoftmaxPoolConfig};
pub use device::select_device;
pub use error::{LayerError, Result};
pub use graph::{AdjacencyEntry, AdjacencyList, Graph};
pub use layers::{
    aggregate, forward_graph, GraphConv, MessagePassing, RuleGraphConv, SoftmaxPoolConv,
};
pub use rules::{CombinationRule, CombineOp, CustomOp, RulePipeline, RuleSpec};

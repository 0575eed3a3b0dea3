//! Molecular graph inputs.
//!
//! A [`Graph`] pairs an `(N, num_features)` atom feature matrix with an
//! adjacency list. Entry `i` of the adjacency list holds the directed edges
//! leaving atom `i`, each carrying a bond descriptor.

use candle_core::{Device, Tensor};

use crate::{LayerError, Result};

/// One directed edge: neighbor index plus its bond descriptor.
#[derive(Debug, Clone)]
pub struct AdjacencyEntry {
    pub neighbor: usize,
    /// Bond descriptor, shape `(num_bond,)`
    pub bond: Tensor,
}

impl AdjacencyEntry {
    pub fn new(neighbor: usize, bond: Tensor) -> Self {
        Self { neighbor, bond }
    }

    /// Build an entry from raw bond values.
    pub fn from_slice(neighbor: usize, bond: &[f32], device: &Device) -> Result<Self> {
        let bond = Tensor::from_slice(bond, bond.len(), device)?;
        Ok(Self { neighbor, bond })
    }
}

/// Per-node neighbor sets, indexed by node.
pub type AdjacencyList = Vec<Vec<AdjacencyEntry>>;

/// A single molecule: node features plus adjacency.
#[derive(Debug, Clone)]
pub struct Graph {
    /// Node feature matrix, shape `(N, num_features)`
    pub features: Tensor,
    pub adjacency: AdjacencyList,
}

impl Graph {
    pub fn new(features: Tensor, adjacency: AdjacencyList) -> Self {
        Self { features, adjacency }
    }

    /// Build a graph from row-major feature rows and `(neighbor, bond)` edges.
    ///
    /// All rows must have the same width. An empty `rows` yields a
    /// `(0, 0)` feature matrix.
    pub fn from_parts(
        rows: &[Vec<f32>],
        edges: &[Vec<(usize, Vec<f32>)>],
        device: &Device,
    ) -> Result<Self> {
        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        if let Some(bad) = rows.iter().find(|r| r.len() != width) {
            return Err(LayerError::shape("feature row", width, bad.len()));
        }
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        let features = Tensor::from_vec(flat, (rows.len(), width), device)?;

        let adjacency = edges
            .iter()
            .map(|adj| {
                adj.iter()
                    .map(|(n, bond)| AdjacencyEntry::from_slice(*n, bond, device))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<AdjacencyList>>()?;

        Ok(Self { features, adjacency })
    }

    pub fn num_nodes(&self) -> Result<usize> {
        Ok(self.features.dim(0)?)
    }

    pub fn num_edges(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum()
    }

    /// Check the structural invariants a forward pass relies on: one
    /// adjacency entry per node, features of the expected width, and every
    /// neighbor index inside the graph.
    pub(crate) fn check(&self, num_features: usize) -> Result<usize> {
        let (num_nodes, width) = self.features.dims2()?;
        if width != num_features && num_nodes > 0 {
            return Err(LayerError::shape(
                "node features",
                (num_nodes, num_features),
                (num_nodes, width),
            ));
        }
        if self.adjacency.len() != num_nodes {
            return Err(LayerError::shape(
                "adjacency list length",
                num_nodes,
                self.adjacency.len(),
            ));
        }
        for (node, adj) in self.adjacency.iter().enumerate() {
            if let Some(entry) = adj.iter().find(|e| e.neighbor >= num_nodes) {
                return Err(LayerError::NeighborOutOfRange {
                    node,
                    neighbor: entry.neighbor,
                    num_nodes,
                });
            }
        }
        Ok(num_nodes)
    }
}

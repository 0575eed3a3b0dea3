//! Shared fixtures for PGGCN tests: seeded molecule-like graphs and float
//! assertions.

use candle_core::{Device, Tensor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Raw graph data: one feature row per atom and `(neighbor, bond)` edges.
#[derive(Debug, Clone, PartialEq)]
pub struct MoleculeFixture {
    pub rows: Vec<Vec<f32>>,
    pub edges: Vec<Vec<(usize, Vec<f32>)>>,
}

impl MoleculeFixture {
    pub fn num_atoms(&self) -> usize {
        self.rows.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.iter().map(Vec::len).sum()
    }
}

/// A seeded random molecule.
///
/// Atoms form a chain with a few extra ring-closing bonds; every bond is
/// stored in both directions. The first three features of each row are
/// spread-out coordinates so distance rules see non-trivial distances.
pub fn random_molecule(
    num_atoms: usize,
    num_features: usize,
    num_bond: usize,
    seed: u64,
) -> MoleculeFixture {
    let mut rng = StdRng::seed_from_u64(seed);

    let rows = (0..num_atoms)
        .map(|i| {
            (0..num_features)
                .map(|f| {
                    if f < 3 {
                        i as f32 * 1.5 + rng.gen_range(-0.2..0.2)
                    } else {
                        rng.gen_range(-1.0..1.0)
                    }
                })
                .collect()
        })
        .collect();

    let mut edges: Vec<Vec<(usize, Vec<f32>)>> = vec![Vec::new(); num_atoms];
    let bond = |rng: &mut StdRng| -> Vec<f32> {
        let kind = rng.gen_range(0..num_bond.max(1));
        (0..num_bond).map(|b| if b == kind { 1.0 } else { 0.0 }).collect()
    };

    for i in 1..num_atoms {
        let b = bond(&mut rng);
        edges[i - 1].push((i, b.clone()));
        edges[i].push((i - 1, b));
    }
    if num_atoms > 3 {
        for _ in 0..num_atoms / 3 {
            let a = rng.gen_range(0..num_atoms);
            let c = rng.gen_range(0..num_atoms);
            if a.abs_diff(c) > 1 {
                let b = bond(&mut rng);
                edges[a].push((c, b.clone()));
                edges[c].push((a, b));
            }
        }
    }

    MoleculeFixture { rows, edges }
}

/// Three-atom bent molecule (O with two H), 3D coordinates then one
/// element flag per atom type.
pub fn water() -> MoleculeFixture {
    let rows = vec![
        vec![0.0, 0.0, 0.0, 1.0, 0.0],
        vec![0.96, 0.0, 0.0, 0.0, 1.0],
        vec![-0.24, 0.93, 0.0, 0.0, 1.0],
    ];
    let single = vec![1.0, 0.0];
    let edges = vec![
        vec![(1, single.clone()), (2, single.clone())],
        vec![(0, single.clone())],
        vec![(0, single)],
    ];
    MoleculeFixture { rows, edges }
}

/// Build a 2-D tensor from rows.
pub fn matrix(rows: &[Vec<f32>], device: &Device) -> Tensor {
    let cols = rows.first().map(|r| r.len()).unwrap_or(0);
    let flat: Vec<f32> = rows.iter().flatten().copied().collect();
    Tensor::from_vec(flat, (rows.len(), cols), device).expect("matrix shape")
}

/// Assert two float slices match within `tol`.
pub fn assert_close(actual: &[f32], expected: &[f32], tol: f32) {
    pretty_assertions::assert_eq!(actual.len(), expected.len(), "length mismatch");
    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert!(
            (a - e).abs() <= tol,
            "element {}: {} vs {} (tol {})\nactual:   {:?}\nexpected: {:?}",
            i,
            a,
            e,
            tol,
            actual,
            expected
        );
    }
}

/// Assert two tensors have equal shape and values within `tol`.
pub fn assert_tensor_close(actual: &Tensor, expected: &Tensor, tol: f32) {
    pretty_assertions::assert_eq!(actual.dims(), expected.dims());
    let a: Vec<f32> = actual.flatten_all().and_then(|t| t.to_vec1()).expect("actual to_vec1");
    let e: Vec<f32> = expected.flatten_all().and_then(|t| t.to_vec1()).expect("expected to_vec1");
    assert_close(&a, &e, tol);
}

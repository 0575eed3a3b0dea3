//! Stacking layers built from a config file.

use std::io::Write;

use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};
use pggcn_layers::{
    select_device, Activation, Graph, GraphConv, GraphConvConfig, ModelConfig, RuleGraphConv,
    SoftmaxPoolConfig, SoftmaxPoolConv,
};
use pggcn_test_utils::{assert_close, assert_tensor_close, random_molecule};

const CONFIG: &str = r#"
use_gpu = false

[rule_conv]
out_channel = 12
num_features = 10
num_bond = 4
rules = [
    { rule = "distance", start = 0, end = 3 },
    { rule = "subtract", start = 3, end = 6 },
    { rule = "sum", start = 6 },
]

[graph_conv]
out_channel = 8
num_features = 12

[pool]
out_channel = 5
num_features = 8
"#;

fn load_config() -> ModelConfig {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(CONFIG.as_bytes()).unwrap();
    ModelConfig::from_file(file.path()).unwrap()
}

#[test]
fn test_config_file_round_trip() {
    let config = load_config();
    let rule_conv = config.rule_conv.as_ref().unwrap();
    assert_eq!(rule_conv.rules.len(), 3);
    assert_eq!(config.graph_conv.as_ref().unwrap().activation, Some(Activation::Relu));
    assert_eq!(config.pool.as_ref().unwrap().num_features, 8);
}

#[test]
fn test_rule_graph_pool_stack() {
    let config = load_config();
    let device = select_device(config.use_gpu).unwrap();
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);

    let rule_conv = RuleGraphConv::new(config.rule_conv.unwrap(), vb.pp("rule_conv")).unwrap();
    let graph_conv = GraphConv::new(config.graph_conv.unwrap(), vb.pp("graph_conv")).unwrap();
    let pool = SoftmaxPoolConv::new(config.pool.unwrap(), vb.pp("pool")).unwrap();
    assert_eq!(varmap.all_vars().len(), 5);

    let batch: Vec<Graph> = [(4, 1u64), (7, 2), (3, 3)]
        .iter()
        .map(|&(atoms, seed)| {
            let mol = random_molecule(atoms, 10, 4, seed);
            Graph::from_parts(&mol.rows, &mol.edges, &device).unwrap()
        })
        .collect();

    let hidden = rule_conv.forward(&batch).unwrap();
    let hidden: Vec<Graph> = hidden
        .into_iter()
        .zip(&batch)
        .map(|(features, graph)| Graph::new(features, graph.adjacency.clone()))
        .collect();

    let convolved = graph_conv.forward(&hidden).unwrap();
    for (out, input) in convolved.iter().zip(&batch) {
        assert_eq!(out.adjacency.len(), input.adjacency.len());
        assert_eq!(out.num_edges(), input.num_edges());
    }

    let node_features: Vec<_> = convolved.iter().map(|g| g.features.clone()).collect();
    let pooled = pool.forward(&node_features).unwrap();
    assert_eq!(pooled.dims(), &[3, 5]);

    // Each row is a sum of one probability vector per atom.
    let rows = pooled.to_vec2::<f32>().unwrap();
    let totals: Vec<f32> = rows.iter().map(|r| r.iter().sum()).collect();
    assert_close(&totals, &[4.0, 7.0, 3.0], 1e-4);
}

#[test]
fn test_relu_graph_conv_outputs_nonnegative_for_connected_nodes() {
    let device = Device::Cpu;
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
    let config = GraphConvConfig::new(6).with_num_features(10);
    let layer = GraphConv::new(config, vb).unwrap();

    let mol = random_molecule(9, 10, 4, 77);
    let graph = Graph::from_parts(&mol.rows, &mol.edges, &device).unwrap();
    let out = layer.forward_single(&graph).unwrap();
    let out = out.features.to_vec2::<f32>().unwrap();

    for (row, adj) in out.iter().zip(&mol.edges) {
        assert!(!adj.is_empty());
        assert!(row.iter().all(|v| *v >= 0.0));
    }
}

#[test]
fn test_pool_batch_matches_single() {
    let device = Device::Cpu;
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
    let config = SoftmaxPoolConfig::new(3).with_num_features(10);
    let pool = SoftmaxPoolConv::new(config, vb).unwrap();

    let a = random_molecule(5, 10, 1, 8);
    let b = random_molecule(2, 10, 1, 9);
    let a = Graph::from_parts(&a.rows, &vec![vec![]; 5], &device).unwrap();
    let b = Graph::from_parts(&b.rows, &vec![vec![]; 2], &device).unwrap();

    let batched = pool
        .forward(&[a.features.clone(), b.features.clone()])
        .unwrap()
        .to_vec2::<f32>()
        .unwrap();
    for (k, features) in [a.features, b.features].into_iter().enumerate() {
        let single = pool.forward(&[features]).unwrap().to_vec2::<f32>().unwrap();
        assert_close(&batched[k], &single[0], 1e-6);
    }
}

#[test]
fn test_graph_conv_batch_matches_single() {
    let device = Device::Cpu;
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
    let config = GraphConvConfig::new(6).with_num_features(10);
    let layer = GraphConv::new(config, vb).unwrap();

    let batch: Vec<Graph> = [(6, 21u64), (3, 22)]
        .iter()
        .map(|&(atoms, seed)| {
            let mol = random_molecule(atoms, 10, 4, seed);
            Graph::from_parts(&mol.rows, &mol.edges, &device).unwrap()
        })
        .collect();

    let batched = layer.forward(&batch).unwrap();
    assert_eq!(batched.len(), 2);
    for (k, graph) in batch.iter().enumerate() {
        let single = layer.forward(std::slice::from_ref(graph)).unwrap();
        assert_tensor_close(&batched[k].features, &single[0].features, 1e-6);
        assert_eq!(batched[k].num_edges(), single[0].num_edges());
    }
}

//! Run a rule conv -> graph conv -> pool stack over random molecules.
//!
//! ```bash
//! cargo run -p pggcn-layers --example forward_demo -- path/to/model.toml
//! ```
//!
//! Without an argument a built-in configuration is used.

use std::time::Instant;

use candle_core::DType;
use candle_nn::{VarBuilder, VarMap};
use pggcn_layers::{
    device, select_device, Graph, GraphConv, ModelConfig, RuleGraphConv, SoftmaxPoolConv,
};
use pggcn_test_utils::random_molecule;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEFAULT_CONFIG: &str = r#"
[rule_conv]
out_channel = 40
num_features = 81
num_bond = 22
rules = [
    { rule = "distance", start = 0, end = 3 },
    { rule = "multiply", start = 3, end = 40 },
    { rule = "sum", start = 40 },
]

[graph_conv]
out_channel = 40
num_features = 40

[pool]
out_channel = 16
num_features = 40
"#;

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading config from {}", path);
            ModelConfig::from_file(path)?
        }
        None => ModelConfig::from_toml_str(DEFAULT_CONFIG)?,
    };

    let rule_cfg = config
        .rule_conv
        .clone()
        .ok_or_else(|| anyhow::anyhow!("config has no [rule_conv] section"))?;
    let graph_cfg = config
        .graph_conv
        .clone()
        .ok_or_else(|| anyhow::anyhow!("config has no [graph_conv] section"))?;
    let pool_cfg = config
        .pool
        .clone()
        .ok_or_else(|| anyhow::anyhow!("config has no [pool] section"))?;

    let dev = select_device(config.use_gpu)?;
    info!("Using device: {:?} (gpu: {})", dev, device::is_gpu(&dev));

    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &dev);
    let num_features = rule_cfg.num_features;
    let num_bond = rule_cfg.num_bond;
    let rule_conv = RuleGraphConv::new(rule_cfg, vb.pp("rule_conv"))?;
    let graph_conv = GraphConv::new(graph_cfg, vb.pp("graph_conv"))?;
    let pool = SoftmaxPoolConv::new(pool_cfg, vb.pp("pool"))?;

    let batch = (0..4u64)
        .map(|seed| {
            let mol = random_molecule(6 + 3 * seed as usize, num_features, num_bond, seed);
            Graph::from_parts(&mol.rows, &mol.edges, &dev)
        })
        .collect::<pggcn_layers::Result<Vec<_>>>()?;
    info!("Built batch of {} molecules", batch.len());

    let start = Instant::now();
    let hidden: Vec<Graph> = rule_conv
        .forward(&batch)?
        .into_iter()
        .zip(&batch)
        .map(|(features, graph)| Graph::new(features, graph.adjacency.clone()))
        .collect();
    let convolved = graph_conv.forward(&hidden)?;
    let node_features: Vec<_> = convolved.into_iter().map(|g| g.features).collect();
    let pooled = pool.forward(&node_features)?;
    info!(
        "Forward pass in {:.2}ms, output shape {:?}",
        start.elapsed().as_secs_f64() * 1000.0,
        pooled.dims()
    );

    for (i, row) in pooled.to_vec2::<f32>()?.iter().enumerate() {
        println!("  {}: [{:.4}, {:.4}, {:.4}, ...]", i, row[0], row[1], row[2]);
    }

    Ok(())
}

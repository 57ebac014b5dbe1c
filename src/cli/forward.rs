use std::path::PathBuf;

use burn::backend::ndarray::NdArrayDevice;
use burn::backend::wgpu::WgpuDevice;
use burn::backend::{NdArray, Wgpu};
use burn::prelude::*;
use clap::Args;

use dialogue_gcn::graph::export::to_dot;
use dialogue_gcn::{BatchFile, DeviceKind, DialogueBatch, DialogueGcnConfig, Error, Result};

#[derive(Args)]
pub struct ForwardArgs {
    /// JSON batch file: {"dialogues": [{"features": [[...]], "speakers": [...]}]}
    #[arg(short, long)]
    pub input: Option<PathBuf>,
    /// Dialogue lengths for a random synthetic batch (when no --input)
    #[arg(long, value_delimiter = ',', default_value = "3,2")]
    pub lengths: Vec<usize>,
    /// Model config JSON (default: built-in defaults)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Feature width when no config is given and the input has no utterances
    #[arg(long, default_value = "8")]
    pub feature_dim: usize,
    /// Speaker count when no config is given
    #[arg(long, default_value = "2")]
    pub speakers: usize,
    /// Override the configured device
    #[arg(long, value_enum)]
    pub device: Option<DeviceKind>,
    /// Write the batch graph as Graphviz DOT
    #[arg(long, value_name = "PATH")]
    pub dot: Option<PathBuf>,
}

pub fn cmd_forward(args: ForwardArgs) -> Result<()> {
    let file = args.input.as_deref().map(BatchFile::load).transpose()?;

    let mut config = match &args.config {
        Some(path) => DialogueGcnConfig::load_validated(path)?,
        None => {
            let feature_dim = file
                .as_ref()
                .and_then(BatchFile::feature_dim)
                .unwrap_or(args.feature_dim);
            DialogueGcnConfig::for_speakers(feature_dim, args.speakers)
        }
    };
    if let Some(device) = args.device {
        config.device = device;
    }

    match config.device {
        DeviceKind::Cpu => run::<NdArray>(&config, file.as_ref(), &args, &NdArrayDevice::default()),
        DeviceKind::Accelerator => {
            run::<Wgpu>(&config, file.as_ref(), &args, &WgpuDevice::default())
        }
    }
}

fn run<B: Backend>(
    config: &DialogueGcnConfig,
    file: Option<&BatchFile>,
    args: &ForwardArgs,
    device: &B::Device,
) -> Result<()> {
    let model = config.init::<B>(device)?;
    let batch = match file {
        Some(f) => {
            DialogueBatch::<B>::from_file(f, config.feature_dim, config.num_speakers, device)?
        }
        None => DialogueBatch::<B>::synthetic(
            &args.lengths,
            config.feature_dim,
            config.num_speakers,
            device,
        )?,
    };

    let start = std::time::Instant::now();
    let out = model.forward(&batch)?;
    let predictions = out.predictions()?;
    let probs = out
        .log_probs
        .clone()
        .exp()
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| Error::TensorData(format!("{:?}", e)))?;
    let elapsed = start.elapsed();

    let graph = &out.graph;
    let num_classes = config.num_classes;
    for (node, &class) in predictions.iter().enumerate() {
        let dialogue = graph.dialogue_of(node).unwrap_or(0);
        let position = node - graph.node_offsets[dialogue];
        let speaker = batch.speakers.speaker(position, dialogue)?;
        println!(
            "d{}:u{:<3} speaker {}  class {}  p={:.3}",
            dialogue,
            position,
            speaker,
            class,
            probs[node * num_classes + class]
        );
    }

    eprintln!();
    eprintln!(
        "{} dialogues, {} nodes, {} edges, {} relations ({:.1}ms on {})",
        graph.num_dialogues(),
        graph.num_nodes,
        graph.num_edges(),
        graph.num_relations,
        elapsed.as_secs_f64() * 1000.0,
        config.device,
    );
    eprintln!("  relation map {}", &model.relation_map().fingerprint()[..16]);

    if let Some(path) = &args.dot {
        super::write_or_print(Some(path), &to_dot(graph)?)?;
    }
    Ok(())
}

use std::path::PathBuf;

use clap::Args;

use dialogue_gcn::{DialogueGcnConfig, Result};

#[derive(Args)]
pub struct ConfigArgs {
    /// Encoder feature width
    #[arg(long, default_value = "200")]
    pub feature_dim: usize,
    /// Number of distinct speakers
    #[arg(long, default_value = "2")]
    pub speakers: usize,
    /// Output JSON file (default: stdout)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

pub fn cmd_config(args: ConfigArgs) -> Result<()> {
    let config = DialogueGcnConfig::for_speakers(args.feature_dim, args.speakers);
    config.validate()?;
    super::write_or_print(args.output.as_deref(), &config.to_string())
}

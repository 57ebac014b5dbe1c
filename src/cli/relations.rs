use std::path::PathBuf;

use clap::Args;

use dialogue_gcn::{RelationTypeMap, Result};

#[derive(Args)]
pub struct RelationsArgs {
    /// Number of distinct speakers
    #[arg(short, long)]
    pub speakers: usize,
    /// Save the map as JSON instead of printing the table
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

pub fn cmd_relations(args: RelationsArgs) -> Result<()> {
    let map = RelationTypeMap::new(args.speakers);

    match args.output {
        Some(path) => {
            map.save(&path)?;
            eprintln!("wrote {}", path.display());
        }
        None => {
            for entry in map.entries() {
                println!("{}", entry);
            }
        }
    }
    eprintln!("{} relations, fingerprint {}", map.len(), map.fingerprint());
    Ok(())
}

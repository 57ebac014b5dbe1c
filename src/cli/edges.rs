use clap::Args;

use dialogue_gcn::{Result, WindowSpec};

#[derive(Args)]
pub struct EdgesArgs {
    /// Number of utterances in the dialogue
    #[arg(short, long)]
    pub length: usize,
    /// Past window (-1 for unbounded)
    #[arg(long, default_value = "10", allow_hyphen_values = true)]
    pub past: i64,
    /// Future window (-1 for unbounded)
    #[arg(long, default_value = "10", allow_hyphen_values = true)]
    pub future: i64,
}

pub fn cmd_edges(args: EdgesArgs) -> Result<()> {
    let window = WindowSpec::try_new(args.past, args.future)?;
    let edges = window.edges(args.length);

    for anchor in 0..args.length {
        let targets: Vec<String> = edges
            .iter()
            .filter(|&&(i, _)| i == anchor)
            .map(|&(_, j)| j.to_string())
            .collect();
        println!("{:>4} -> {}", anchor, targets.join(" "));
    }
    eprintln!(
        "{} edges (past {}, future {})",
        edges.len(),
        window.past,
        window.future
    );
    Ok(())
}

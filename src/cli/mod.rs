pub mod config;
pub mod edges;
pub mod forward;
pub mod relations;

use std::path::Path;

use dialogue_gcn::Result;

/// Write `text` to `path`, or to stdout when no path is given.
pub fn write_or_print(path: Option<&Path>, text: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, text)?;
            eprintln!("wrote {}", path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}

use std::path::PathBuf;

use clap::Parser;

/// mole - background file-system indexer
#[derive(Parser, Debug)]
#[command(name = "mole")]
#[command(about = "Indexes a directory tree and answers queries over it", long_about = None)]
pub struct Cli {
    /// Directory tree to index (or set $MOLE_DIR)
    #[arg(short = 'd', value_name = "PATH", env = "MOLE_DIR")]
    pub dir: PathBuf,

    /// Index storage path (or $MOLE_INDEX_PATH; default ~/.mole-index)
    #[arg(short = 'm', value_name = "PATH", env = "MOLE_INDEX_PATH")]
    pub index: Option<PathBuf>,

    /// Rebuild the index periodically, every SECONDS seconds
    #[arg(short = 't', value_name = "SECONDS",
          value_parser = clap::value_parser!(u64).range(30..=7200))]
    pub interval: Option<u64>,
}

impl Cli {
    /// Storage path after the fallback chain: `-m`, `$MOLE_INDEX_PATH`
    /// (both handled by clap), then `~/.mole-index`.
    pub fn index_path(&self) -> Option<PathBuf> {
        self.index
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join(".mole-index")))
    }
}

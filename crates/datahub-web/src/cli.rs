use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "datahub")]
#[command(about = "Hierarchical JSON document store with search and path-scoped ACLs", version)]
pub struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, default_value_t = 8080)]
    pub port: u16,

    /// Overrides `DATAHUB_STATE_PATH`.
    #[arg(long)]
    pub state_path: Option<PathBuf>,
}

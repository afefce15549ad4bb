use clap::Parser;
use plantree::cli::commands::{Cli, Commands};
use plantree::cli::handlers;

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        // Init is handled before workspace discovery
        Commands::Init(args) => handlers::cmd_init(args, cli.workspace_dir.as_deref()),
        _ => handlers::dispatch(cli),
    };
    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

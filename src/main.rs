use clap::Parser;
use optim::cli::{
    chat, entries, generate, handle_completions, handle_config_init, load_config_with_overrides,
    run, stream, Cli, Commands, ConfigCommands,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Config(ConfigCommands::Init(args)) => handle_config_init(&args),
        Commands::Completions(args) => {
            handle_completions(&args);
            Ok(())
        }
        command => dispatch(command, &cli.config, cli.log_level.as_deref()).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn dispatch(
    command: Commands,
    config_path: &std::path::Path,
    log_level: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config_with_overrides(config_path, log_level)?;
    optim::logging::init_tracing(&config.logging)?;

    match command {
        Commands::Logs(args) => stream::run_logs(&args, &config).await,
        Commands::Status(args) => stream::run_status(&args, &config).await,
        Commands::Run(args) => run::run_job(&args, &config).await,
        Commands::Entries(args) => {
            println!("{}", entries::handle_entries(&args, &config).await?);
            Ok(())
        }
        Commands::Generate(args) => {
            println!("{}", generate::handle_generate(&args, &config).await?);
            Ok(())
        }
        Commands::Chat(args) => {
            println!("{}", chat::handle_chat(&args, &config).await?);
            Ok(())
        }
        Commands::Config(_) | Commands::Completions(_) => Ok(()),
    }
}

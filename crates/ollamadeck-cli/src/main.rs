//! CLI entry point.

use clap::Parser;

use ollamadeck_cli::{Cli, Commands, bootstrap, commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let mut settings = bootstrap::load_settings(cli.config.as_deref())?;
    if let Some(binary) = cli.runner_binary {
        settings.runner_binary = Some(binary);
    }
    let runner_name = settings.effective_runner_binary().to_string();

    let Some(command) = cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        return Ok(());
    };

    let mut ctx = bootstrap::bootstrap(settings).await;
    if !ctx.runner_available {
        eprintln!("warning: '{runner_name}' was not found; local model commands will fail");
    }

    match command {
        Commands::Models => commands::models(&mut ctx).await,
        Commands::Ps { watch } => commands::ps(&mut ctx, watch).await,
        Commands::Search { filter } => commands::search(&mut ctx, filter.as_deref()).await,
        Commands::Tags { family } => commands::tags(&mut ctx, &family).await,
        Commands::Pull { reference } => commands::pull(&mut ctx, &reference).await,
        Commands::Rm { name } => commands::rm(&mut ctx, &name).await,
        Commands::Stop { name } => commands::stop(&mut ctx, &name).await,
        Commands::Show { name } => commands::show(&ctx, &name).await,
        Commands::FlushCache => {
            commands::flush_cache(&ctx);
            Ok(())
        }
    }
}

use clap::ArgMatches;
use colored::Colorize;
use docent::command_argument_builder;
use docent::handlers::{
    handle_cache_clear, handle_cache_list, handle_cache_remove, handle_config_show, handle_graph,
    handle_run,
};
use docent_core::print_banner;
use tracing_subscriber::EnvFilter;

/// Log to stderr so reports on stdout stay clean; RUST_LOG overrides --verbose
fn init_tracing(args: &ArgMatches) {
    let level = if args.get_flag("verbose") { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    let result = match chosen_command.subcommand() {
        // No subcommand provided, just show the banner
        None => return,
        Some(("run", primary_command)) => {
            init_tracing(primary_command);
            handle_run(primary_command).await
        }
        Some(("graph", primary_command)) => handle_graph(primary_command),
        Some(("cache", primary_command)) => match primary_command.subcommand() {
            Some(("list", secondary_command)) => handle_cache_list(secondary_command),
            Some(("remove", secondary_command)) => handle_cache_remove(secondary_command),
            Some(("clear", secondary_command)) => handle_cache_clear(secondary_command),
            _ => unreachable!("clap should ensure we don't get here"),
        },
        Some(("config", primary_command)) => match primary_command.subcommand() {
            Some(("show", secondary_command)) => handle_config_show(secondary_command),
            _ => unreachable!("clap should ensure we don't get here"),
        },
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

use crate::CLAP_STYLING;
use clap::{arg, command};
use url::Url;

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("docent")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("docent")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("run")
                .about(
                    "Explore a site, plan a paced tour of it and drive the tour, writing the \
                timeline, graph and captions for a narrated recording.",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("The start URL of the tour")
                        .value_parser(clap::value_parser!(Url))
                        .conflicts_with("hosts-file"),
                )
                .arg(
                    arg!(-H --"hosts-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of start URLs, toured one after another")
                        .value_parser(clap::value_parser!(std::path::PathBuf))
                        .conflicts_with("url"),
                )
                .arg(
                    arg!(-c --"config" <PATH>)
                        .required(false)
                        .help("TOML configuration file; flags below override its values"),
                )
                .arg(
                    arg!(-o --"output" <DIR>)
                        .required(false)
                        .help("Directory for tour artifacts (default: docent-output)"),
                )
                .arg(
                    arg!(-d --"duration" <SECONDS>)
                        .required(false)
                        .help("Target duration of the tour")
                        .value_parser(clap::value_parser!(u64).range(1..)),
                )
                .arg(
                    arg!(-s --"strategy" <MODE>)
                        .required(false)
                        .help("Exploration strategy")
                        .value_parser(["priority", "depth-first", "breadth-first", "ai-guided"]),
                )
                .arg(
                    arg!(--"max-depth" <DEPTH>)
                        .required(false)
                        .help("Maximum link depth explored from the start page")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"max-pages" <COUNT>)
                        .required(false)
                        .help("Maximum number of pages in the explored graph")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"focus" <TEXT>)
                        .required(false)
                        .help("What the tour should concentrate on, passed to the decision oracle"),
                )
                .arg(
                    arg!(--"follow")
                        .required(false)
                        .help("Follow links to other domains (default: stay on the start domain)")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"cache")
                        .required(false)
                        .help("Reuse a cached graph for the domain instead of exploring, and cache new ones")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"cache-dir" <PATH>)
                        .required(false)
                        .help("Graph cache directory (default: ~/.cache/docent)"),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("HTTP request timeout in seconds")
                        .value_parser(clap::value_parser!(u64).range(1..))
                        .default_value("10"),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json, markdown")
                        .value_parser(["text", "json", "markdown"])
                        .default_value("text"),
                )
                .arg(
                    arg!(-r --"report" <PATH>)
                        .required(false)
                        .help("Save the report to a file (default: display to screen)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-v --"verbose")
                        .required(false)
                        .help("Log debug output (RUST_LOG takes precedence)")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("graph")
                .about("Print a cached navigation graph")
                .arg(
                    arg!(<DOMAIN>)
                        .required(true)
                        .help("Domain the graph was cached under, e.g. example.com"),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Output format: tree, dot, json")
                        .value_parser(["tree", "dot", "json"])
                        .default_value("tree"),
                )
                .arg(
                    arg!(--"cache-dir" <PATH>)
                        .required(false)
                        .help("Graph cache directory (default: ~/.cache/docent)"),
                ),
        )
        .subcommand(
            command!("cache")
                .about("Manage cached navigation graphs")
                .arg(
                    arg!(--"cache-dir" <PATH>)
                        .required(false)
                        .global(true)
                        .help("Graph cache directory (default: ~/.cache/docent)"),
                )
                .subcommand_required(true)
                .subcommand(command!("list").about("List cached domains"))
                .subcommand(
                    command!("remove")
                        .about("Remove the cached graph of a domain")
                        .arg(arg!(<DOMAIN>).required(true).help("The cached domain")),
                )
                .subcommand(command!("clear").about("Remove every cached graph")),
        )
        .subcommand(
            command!("config")
                .about("Inspect tour configuration")
                .subcommand_required(true)
                .subcommand(
                    command!("show")
                        .about("Print the effective configuration as TOML")
                        .arg(
                            arg!(-c --"config" <PATH>)
                                .required(false)
                                .help("TOML configuration file to load before printing"),
                        ),
                ),
        )
}

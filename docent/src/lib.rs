pub mod commands;
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use commands::command_argument_builder;
pub use handlers::{
    RunOverrides, apply_overrides, load_config, load_urls_from_file, load_urls_from_source,
    parse_url_line, render_tree, site_dir_name,
};

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    FetchOverrides, load_fetch_config, load_urls_from_file, load_urls_from_source,
    parse_url_line, profile_rows, resolve_fetch_config, select_relays,
};

pub fn print_banner() {
    use colored::Colorize;

    println!(
        "{} {}",
        "pageweight".bright_cyan().bold(),
        env!("CARGO_PKG_VERSION").bright_black()
    );
    println!("{}", "webpage resource weight analyzer".bright_black());
}

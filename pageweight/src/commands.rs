use crate::CLAP_STYLING;
use clap::{arg, command};

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("pageweight")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("pageweight")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and progress output").required(false))
        .arg(
            arg!(-v --"verbose" "Log per-request detail to stderr (RUST_LOG overrides)")
                .required(false),
        )
        .subcommand_required(false)
        .subcommand(
            command!("analyze")
                .about(
                    "Fetch a page, size every resource it references and report score, \
                duplicates, load time estimates and optimization suggestions.",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("The page to analyze (https:// is assumed when no scheme is given)")
                        .conflicts_with("hosts-file"),
                )
                .arg(
                    arg!(-H --"hosts-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of pages to analyze")
                        .value_parser(clap::value_parser!(std::path::PathBuf))
                        .conflicts_with("url"),
                )
                .group(
                    clap::ArgGroup::new("target")
                        .args(["url", "hosts-file"])
                        .required(true),
                )
                .arg(
                    arg!(-c --"concurrency" <NUM>)
                        .required(false)
                        .help("Maximum number of resource fetches in flight")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("3"),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Timeout for each document and relay request")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(--"retries" <NUM>)
                        .required(false)
                        .help("Relay retries per resource after the first attempt")
                        .value_parser(clap::value_parser!(u32)),
                )
                .arg(
                    arg!(--"delay" <MS>)
                        .required(false)
                        .help("Minimum spacing between relay requests in milliseconds")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(--"relay" <NAME>)
                        .required(false)
                        .help("Relay to use, in failover order (repeatable; default: all)")
                        .action(clap::ArgAction::Append),
                )
                .arg(
                    arg!(--"allow-manual-relays")
                        .required(false)
                        .help("Also rotate through relays that need manual authorization")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"no-direct-probe")
                        .required(false)
                        .help("Skip the direct HEAD size probe and always go through relays")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"config" <PATH>)
                        .required(false)
                        .help("JSON file with fetch settings (flags take precedence)"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                )
                .arg(
                    arg!(--"no-progress")
                        .required(false)
                        .help("Do not draw a progress bar")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(command!("relays").about("List the built-in relays in failover order"))
        .subcommand(
            command!("profiles").about("List the network profiles used for load time estimates"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_definition_is_valid() {
        command_argument_builder().debug_assert();
    }

    #[test]
    fn test_analyze_arguments() {
        let matches = command_argument_builder()
            .try_get_matches_from([
                "pageweight",
                "-q",
                "analyze",
                "-u",
                "example.com",
                "--relay",
                "direct",
                "--relay",
                "codetabs",
                "-c",
                "5",
            ])
            .unwrap();
        assert!(matches.get_flag("quiet"));

        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "analyze");
        assert_eq!(sub.get_one::<String>("url").unwrap(), "example.com");
        assert_eq!(*sub.get_one::<usize>("concurrency").unwrap(), 5);
        let relays: Vec<&String> = sub.get_many::<String>("relay").unwrap().collect();
        assert_eq!(relays, vec!["direct", "codetabs"]);
        assert_eq!(sub.get_one::<String>("format").unwrap(), "text");
    }

    #[test]
    fn test_analyze_requires_a_target() {
        let result =
            command_argument_builder().try_get_matches_from(["pageweight", "analyze"]);
        assert!(result.is_err());

        let result = command_argument_builder().try_get_matches_from([
            "pageweight",
            "analyze",
            "-u",
            "example.com",
            "-H",
            "hosts.txt",
        ]);
        assert!(result.is_err());
    }
}

use crate::drag::PartitionPolicy;
use std::{env, path};

fn usage() -> ! {
    println!(
        "Usage: {} [options]

  -c, --config <config>  Specify a config file.
      --demo             Browse a generated in-memory history instead of cclip.
  -g, --group <name>     Start filtered to a group (cclip tag).
  -f, --favorites        Start with favorites only.
      --policy <name>    Drag across the pinned boundary: strict | auto_toggle.
  -ss <search>           Pre-fill search (must be last option).
  -v, --debug            Write a debug log for this session.
  -h, --help             Show this help message.
  -V, --version          Show the version number and quit.
",
        &env::args().next().unwrap_or_else(|| "clipdeck".to_string())
    );
    std::process::exit(0);
}

/// Command line interface.
#[derive(Debug, Default, PartialEq)]
pub struct Opts {
    /// Config file given with `-c`
    pub config: Option<path::PathBuf>,
    /// Use the in-memory demo backend
    pub demo: bool,
    /// Initial group filter
    pub group: Option<String>,
    /// Initial favorites-only filter
    pub favorites: bool,
    /// Overrides `[drag] policy` from the config file
    pub policy: Option<PartitionPolicy>,
    /// Search string to pre-populate
    pub search_string: Option<String>,
    /// Write a session log
    pub debug: bool,
}

/// Parses the process arguments
pub fn parse() -> Result<Opts, lexopt::Error> {
    parse_from(env::args().skip(1).collect())
}

/// Parses `args` (program name excluded)
pub fn parse_from(args: Vec<String>) -> Result<Opts, lexopt::Error> {
    use lexopt::prelude::*;
    let mut opts = Opts::default();

    // Everything after -ss is the search string
    let args = match args.iter().position(|arg| arg == "-ss") {
        Some(ss_pos) => {
            opts.search_string = Some(args[ss_pos + 1..].join(" "));
            args[..ss_pos].to_vec()
        }
        None => args,
    };
    let mut parser = lexopt::Parser::from_args(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('c') | Long("config") => {
                opts.config = Some(path::PathBuf::from(parser.value()?));
            }
            Long("demo") => {
                opts.demo = true;
            }
            Short('g') | Long("group") => {
                opts.group = Some(
                    parser
                        .value()?
                        .into_string()
                        .map_err(|_| "Group name must be valid UTF-8")?,
                );
            }
            Short('f') | Long("favorites") => {
                opts.favorites = true;
            }
            Long("policy") => {
                let value = parser.value()?;
                opts.policy = Some(match value.to_str() {
                    Some("strict") => PartitionPolicy::Strict,
                    Some("auto_toggle") | Some("auto-toggle") => PartitionPolicy::AutoToggle,
                    _ => {
                        return Err(lexopt::Error::UnexpectedValue {
                            option: "policy".to_string(),
                            value,
                        })
                    }
                });
            }
            Short('v') | Long("debug") | Long("verbose") => {
                opts.debug = true;
            }
            Short('h') | Long("help") => {
                usage();
            }
            Short('V') | Long("version") => {
                println!("{}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            _ => return Err(arg.unexpected()),
        }
    }

    Ok(opts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_flags() {
        let opts = parse_from(args(&["--demo", "-g", "code", "-f", "--policy", "strict", "-v"]))
            .unwrap();
        assert!(opts.demo);
        assert_eq!(opts.group.as_deref(), Some("code"));
        assert!(opts.favorites);
        assert_eq!(opts.policy, Some(PartitionPolicy::Strict));
        assert!(opts.debug);
    }

    #[test]
    fn test_search_string_takes_rest() {
        let opts = parse_from(args(&["-c", "/tmp/c.toml", "-ss", "git", "rebase"])).unwrap();
        assert_eq!(opts.config, Some(path::PathBuf::from("/tmp/c.toml")));
        assert_eq!(opts.search_string.as_deref(), Some("git rebase"));

        let opts = parse_from(args(&["-ss"])).unwrap();
        assert_eq!(opts.search_string.as_deref(), Some(""));
    }

    #[test]
    fn test_rejects_unknown() {
        assert!(parse_from(args(&["--nope"])).is_err());
        assert!(parse_from(args(&["--policy", "sideways"])).is_err());
    }
}

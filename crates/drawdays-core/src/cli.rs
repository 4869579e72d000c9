use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

/// `KEY=VALUE` for `--rc`.
fn parse_rc_pair(raw: &str) -> anyhow::Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {raw}"))?;
    Ok((key.trim().to_string(), value.trim().to_string()))
}

/// `rc.KEY=VALUE` or `rc.KEY:VALUE` positional override.
fn split_rc_token(token: &str) -> Option<(String, String)> {
    let rest = token.strip_prefix("rc.")?;
    let (key, value) = rest.split_once(['=', ':'])?;
    Some((format!("rc.{key}"), value.to_string()))
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "drawdays",
    version,
    about = "Track a 100-day drawing practice plan",
    disable_help_subcommand = true,
    arg_required_else_help = false
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    /// Config override, repeatable.
    #[arg(long = "rc", value_name = "KEY=VALUE", value_parser = parse_rc_pair, action = ArgAction::Append)]
    pub rc_overrides: Vec<(String, String)>,

    /// Alternate rc file.
    #[arg(long = "rcfile")]
    pub rcfile: Option<PathBuf>,

    /// Data directory holding `themes.data` and `artifacts.data`.
    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub rest: Vec<OsString>,
}

/// Logs go to stderr. `-q` wins over `-v`; `RUST_LOG` wins over both.
pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = match (quiet, verbose) {
        (2.., _) => "error",
        (1, _) | (0, 0) => "warn",
        (0, 1) => "info",
        (0, 2) => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init()
    {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls `rc.key=value` / `rc.key:value` tokens out of the argument list,
/// leaving the program name in place.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned_args = Vec::with_capacity(raw.len());
    let mut rc_overrides = Vec::new();

    for (idx, arg) in raw.iter().enumerate() {
        let token = arg.to_string_lossy();
        match split_rc_token(&token) {
            Some((key, value)) if idx > 0 => {
                debug!(key = %key, value = %value, "captured positional rc override");
                rc_overrides.push((key, value));
            }
            _ => cleaned_args.push(arg.clone()),
        }
    }

    Ok(PreprocessedArgs {
        cleaned_args,
        rc_overrides,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    pub command_args: Vec<String>,
}

impl Invocation {
    #[tracing::instrument(skip(cfg, rest))]
    pub fn parse(cfg: &Config, rest: Vec<OsString>) -> anyhow::Result<Self> {
        let mut tokens = rest
            .into_iter()
            .map(|arg| arg.to_string_lossy().to_string());

        let Some(first) = tokens.next() else {
            let cmd = cfg
                .get("default.command")
                .unwrap_or_else(|| "calendar".to_string());
            debug!(command = %cmd, "no explicit command, using default");
            return Ok(Self {
                command: cmd,
                command_args: vec![],
            });
        };

        let known = crate::commands::known_command_names();
        let command = crate::commands::expand_command_abbrev(&first, &known)
            .ok_or_else(|| anyhow!("unknown or ambiguous command: {first}"))?;
        debug!(token = %first, expanded = %command, "resolved command token");

        Ok(Self {
            command: command.to_string(),
            command_args: tokens.collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use super::*;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn positional_rc_overrides_are_extracted() {
        let pre = preprocess_args(&os(&["drawdays", "rc.plan.duration=30", "board", "rc.color:off"]))
            .expect("preprocess");
        assert_eq!(pre.cleaned_args, os(&["drawdays", "board"]));
        assert_eq!(
            pre.rc_overrides,
            vec![
                ("rc.plan.duration".to_string(), "30".to_string()),
                ("rc.color".to_string(), "off".to_string()),
            ]
        );
    }

    #[test]
    fn rc_flag_and_verbosity_parse() {
        let cli = GlobalCli::parse_from(os(&[
            "drawdays",
            "-vv",
            "--rc",
            "plan.duration = 30",
            "calendar",
            "+1",
        ]));
        assert_eq!(cli.verbose, 2);
        assert_eq!(
            cli.rc_overrides,
            vec![("plan.duration".to_string(), "30".to_string())]
        );
        assert_eq!(cli.rest, os(&["calendar", "+1"]));
        assert!(GlobalCli::try_parse_from(os(&["drawdays", "--rc", "color"])).is_err());
    }

    #[test]
    fn commands_resolve_by_prefix() {
        let cfg = Config::defaults();
        let inv = Invocation::parse(&cfg, os(&["cal", "+1"])).expect("calendar");
        assert_eq!(inv.command, "calendar");
        assert_eq!(inv.command_args, vec!["+1".to_string()]);

        let default = Invocation::parse(&cfg, vec![]).expect("default");
        assert_eq!(default.command, "calendar");

        assert!(Invocation::parse(&cfg, os(&["d"])).is_err());
        assert!(Invocation::parse(&cfg, os(&["paint"])).is_err());
    }
}

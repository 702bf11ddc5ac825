//! Argument parsing that keeps usage errors out of private logs.
//!
//! Clap's error text only ever contains the command line, which the caller
//! supplied, so it is logged as public.

use crate::category::{ConfidentialLogger, DataCategory};
use clap::error::ErrorKind;
use clap::Parser;
use std::collections::HashSet;
use std::ffi::OsString;
use tracing::Level;

/// Exit code for invalid arguments.
pub const EINVAL: i32 = 22;

/// Parsing stopped; the process should exit with `code`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgsExit {
    pub code: i32,
    /// Rendered clap output (usage error or help text).
    pub message: String,
}

impl ArgsExit {
    pub fn is_error(&self) -> bool {
        self.code != 0
    }

    /// Print the message to the matching stream and exit.
    pub fn exit(&self) -> ! {
        if self.is_error() {
            eprint!("{}", self.message);
        } else {
            print!("{}", self.message);
        }
        std::process::exit(self.code)
    }
}

impl std::fmt::Display for ArgsExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message.trim_end())
    }
}

/// Parse `args` into `P`.
///
/// Usage errors are logged as public errors and reported with [`EINVAL`].
/// Help and version requests keep clap's exit code and are not logged.
pub fn parse_compliant<P, I, T>(logger: &ConfidentialLogger, args: I) -> Result<P, ArgsExit>
where
    P: Parser,
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    P::try_parse_from(args).map_err(|err| {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::DisplayHelp
            | ErrorKind::DisplayVersion
            | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => ArgsExit {
                code: err.exit_code(),
                message,
            },
            _ => {
                logger.log(Level::ERROR, DataCategory::Public, message.trim_end());
                ArgsExit {
                    code: EINVAL,
                    message,
                }
            }
        }
    })
}

/// Parse the arguments `P` declares and return the rest.
///
/// A token is unknown when it starts with `--` and names a long flag `P`
/// does not declare (`--name` or `--name=value`). When `P` declares no
/// positional arguments, a bare `--name` also takes the following token as
/// its value unless that token starts with `-`. With positionals declared
/// the following token is left for `P`. Unknown tokens are logged as a
/// public warning and returned in order.
pub fn parse_known<P, I, T>(logger: &ConfidentialLogger, args: I) -> Result<(P, Vec<String>), ArgsExit>
where
    P: Parser,
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let command = P::command();
    let mut known: HashSet<String> = command
        .get_arguments()
        .filter_map(|arg| arg.get_long())
        .map(str::to_string)
        .collect();
    known.insert("help".to_string());
    known.insert("version".to_string());
    let takes_positionals = command.get_positionals().next().is_some();

    let mut kept: Vec<OsString> = Vec::new();
    let mut unknown = Vec::new();
    let mut after_separator = false;
    let mut awaiting_value = false;

    for (index, token) in args.into_iter().map(Into::into).enumerate() {
        if index == 0 || after_separator {
            kept.push(token);
            continue;
        }
        let text = token.to_string_lossy().into_owned();
        if text == "--" {
            after_separator = true;
            kept.push(token);
            continue;
        }
        if std::mem::take(&mut awaiting_value) && !text.starts_with('-') {
            unknown.push(text);
            continue;
        }
        let unknown_flag = text
            .strip_prefix("--")
            .filter(|flag| !known.contains(flag.split('=').next().unwrap_or(flag)));
        match unknown_flag {
            Some(flag) => {
                awaiting_value = !takes_positionals && !flag.contains('=');
                unknown.push(text);
            }
            None => kept.push(token),
        }
    }

    if !unknown.is_empty() {
        logger.warn(
            DataCategory::Public,
            &format!(
                "Following arguments provided cannot be recognized: {:?}",
                unknown
            ),
        );
    }

    parse_compliant::<P, _, _>(logger, kept).map(|parsed| (parsed, unknown))
}

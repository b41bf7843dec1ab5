//! Run configuration, parsed from flags with env fallback for AWS
//! credentials. Errors here abort startup before any queue or database
//! interaction.

use std::str::FromStr;

use getopts::Options;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    BadFlags(#[from] getopts::Fail),
    #[error("missing required option --{0}")]
    Missing(&'static str),
    #[error("unknown run mode `{0}`, expected poll, postfix, or both")]
    BadMode(String),
    #[error("help requested")]
    HelpRequested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Poll,
    Postfix,
    Both,
}

impl RunMode {
    pub fn polls(self) -> bool {
        matches!(self, RunMode::Poll | RunMode::Both)
    }

    pub fn exports(self) -> bool {
        matches!(self, RunMode::Postfix | RunMode::Both)
    }
}

impl FromStr for RunMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "poll" => Ok(RunMode::Poll),
            "postfix" => Ok(RunMode::Postfix),
            "both" => Ok(RunMode::Both),
            other => Err(ConfigError::BadMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub mode: RunMode,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub mail_domain: String,
    pub store_host: String,
    pub bounces_collection: String,
    pub banned_collection: String,
    pub database: String,
    pub quiet: bool,
}

impl Config {
    pub fn options() -> Options {
        let mut opts = Options::new();
        opts.optflag("h", "help", "Print this help message");
        opts.optopt(
            "m",
            "mode",
            "Mode to run in: 'poll', 'postfix', or 'both'\nDefault: both",
            "MODE",
        );
        opts.optopt(
            "r",
            "region",
            "AWS region where SES and SQS queues are, eg us-east-1\nFalls back to AWS_REGION",
            "REGION",
        );
        opts.optopt(
            "a",
            "access",
            "AWS access key for the queue\nFalls back to AWS_ACCESS_KEY_ID",
            "KEY",
        );
        opts.optopt(
            "s",
            "secret",
            "AWS secret key for the queue\nFalls back to AWS_SECRET_ACCESS_KEY",
            "KEY",
        );
        opts.optopt(
            "d",
            "domain",
            "The mail domain for which to receive bounces, used to compose the queue name",
            "DOMAIN",
        );
        opts.optopt(
            "",
            "store-host",
            "The database host where bounces and bans are stored",
            "HOST",
        );
        opts.optopt(
            "",
            "bounces",
            "Table storing all complaints and bounces in full form\nDefault: bounces",
            "TABLE",
        );
        opts.optopt(
            "",
            "banned",
            "Table storing banned addresses with a unique key on email\nDefault: banned",
            "TABLE",
        );
        opts.optopt(
            "",
            "database",
            "The database name to use\nDefault: mailbounces",
            "NAME",
        );
        opts.optflag(
            "q",
            "quiet",
            "Be very silent, logging nothing unless there's a warning or error",
        );
        opts.optflag("", "cron", "Alias for --quiet");
        opts
    }

    pub fn parse(args: &[String]) -> Result<Self, ConfigError> {
        let opts = Self::options();
        let matches = opts.parse(args)?;

        if matches.opt_present("help") {
            return Err(ConfigError::HelpRequested);
        }

        let mode = match matches.opt_str("mode") {
            Some(mode) => mode.parse()?,
            None => RunMode::Both,
        };

        Ok(Config {
            mode,
            region: required(&matches, "region", Some("AWS_REGION"))?,
            access_key: required(&matches, "access", Some("AWS_ACCESS_KEY_ID"))?,
            secret_key: required(&matches, "secret", Some("AWS_SECRET_ACCESS_KEY"))?,
            mail_domain: required(&matches, "domain", None)?,
            store_host: required(&matches, "store-host", None)?,
            bounces_collection: matches
                .opt_str("bounces")
                .unwrap_or_else(|| "bounces".to_string()),
            banned_collection: matches
                .opt_str("banned")
                .unwrap_or_else(|| "banned".to_string()),
            database: matches
                .opt_str("database")
                .unwrap_or_else(|| "mailbounces".to_string()),
            quiet: matches.opt_present("quiet") || matches.opt_present("cron"),
        })
    }

    /// Queue name derived from the mail domain: dots become underscores,
    /// then the `-bounce-queue` suffix.
    pub fn queue_name(&self) -> String {
        format!("{}-bounce-queue", self.mail_domain.replace('.', "_"))
    }

    pub fn database_url(&self) -> String {
        format!("mysql://{}/{}", self.store_host, self.database)
    }
}

fn required(
    matches: &getopts::Matches,
    flag: &'static str,
    env: Option<&str>,
) -> Result<String, ConfigError> {
    if let Some(value) = matches.opt_str(flag) {
        return Ok(value);
    }
    if let Some(var) = env {
        if let Ok(value) = std::env::var(var) {
            if !value.is_empty() {
                return Ok(value);
            }
        }
    }
    Err(ConfigError::Missing(flag))
}

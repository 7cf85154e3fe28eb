use crate::config::RuntimeConfigOverrides;
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;

const USAGE: &str = "usage: kestrel_script_host [--root DIR] [--verbose on|off]";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CliOverrides {
    root: Option<PathBuf>,
    verbose: Option<bool>,
}

impl CliOverrides {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args().skip(1))
    }

    /// Parses flags without the program name. Each flag takes a value, either as the next
    /// argument or after `=`. A repeated flag overrides the earlier one.
    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = CliOverrides::default();
        let mut args = args.into_iter().map(|arg| arg.as_ref().to_string());
        while let Some(arg) = args.next() {
            let Some(flag) = arg.strip_prefix("--") else {
                bail!("stray argument '{arg}'\n{USAGE}");
            };
            let (name, inline) = match flag.split_once('=') {
                Some((name, value)) => (name.to_string(), Some(value.to_string())),
                None => (flag.to_string(), None),
            };
            let value = match inline {
                Some(value) => value,
                None => args.next().ok_or_else(|| anyhow!("--{name} needs a value\n{USAGE}"))?,
            };
            match name.as_str() {
                "root" => overrides.root = Some(parse_root(&value)?),
                "verbose" => {
                    overrides.verbose = Some(parse_switch(&value).with_context(|| format!("--verbose {value}"))?)
                }
                _ => bail!("unknown flag --{name}\n{USAGE}"),
            }
        }
        Ok(overrides)
    }

    pub fn into_config_overrides(self) -> RuntimeConfigOverrides {
        RuntimeConfigOverrides { root: self.root, verbose: self.verbose }
    }
}

/// The root may not exist yet, but an existing file cannot serve as one.
fn parse_root(value: &str) -> Result<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        bail!("--root needs a directory");
    }
    let root = PathBuf::from(trimmed);
    if root.is_file() {
        bail!("--root {} is a file, not a script directory", root.display());
    }
    Ok(root)
}

fn parse_switch(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => bail!("expected on or off"),
    }
}

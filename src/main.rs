use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use kestrel_script_host::cli::CliOverrides;
use kestrel_script_host::config::{RuntimeConfig, RuntimeConfigOverrides};
use kestrel_script_host::logging::{init_tracing, TracingLogger};
use kestrel_script_host::{ConsoleEntryKind, ScriptConsole, ScriptRuntime};

fn main() {
    let cli_overrides = match CliOverrides::parse_from_env() {
        Ok(parsed) => parsed.into_config_overrides(),
        Err(err) => {
            eprintln!("[cli] {err}");
            std::process::exit(2);
        }
    };
    if let Err(err) = run(cli_overrides) {
        eprintln!("Application error: {err:?}");
        std::process::exit(1);
    }
}

fn run(overrides: RuntimeConfigOverrides) -> Result<()> {
    let root = overrides.root.clone().unwrap_or_else(|| PathBuf::from("."));
    let mut config = RuntimeConfig::for_root(&root);
    config.apply_overrides(&overrides);
    init_tracing(config.verbose);
    if !overrides.is_empty() {
        tracing::debug!("CLI overrides applied: {}", overrides.applied_fields().join(", "));
    }

    let runtime = Arc::new(ScriptRuntime::with_config(&root, config, Arc::new(TracingLogger))?);
    let report = runtime.autoload_plugins()?;
    tracing::info!(
        "Loaded {} plugin(s) from {}, {} failed",
        report.loaded.len(),
        runtime.root().display(),
        report.failed.len()
    );

    let mut console = ScriptConsole::new(runtime);
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        write!(stdout, "js> ").and_then(|_| stdout.flush()).context("Writing prompt")?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line).context("Reading console input")? == 0 {
            break;
        }
        for entry in console.execute(&line) {
            match entry.kind {
                ConsoleEntryKind::Input => {}
                ConsoleEntryKind::Output => writeln!(stdout, "{}", entry.text)?,
                ConsoleEntryKind::Error => eprintln!("{}", entry.text),
            }
        }
    }
    Ok(())
}

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use kestrel_script_host::logging::{init_tracing, TracingLogger};
use kestrel_script_host::runtime::collect_scripts;
use kestrel_script_host::ScriptRuntime;

fn main() -> Result<()> {
    let args: Vec<_> = std::env::args().collect();
    let script_root = args.get(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("plugins"));
    init_tracing(false);
    println!("[module-check] loading scripts under '{}'", script_root.display());

    let runtime = ScriptRuntime::with_logger(&script_root, Arc::new(TracingLogger))?;
    let extension = runtime.config().script_extension.clone();
    let mut loaded = 0usize;
    let mut failed = Vec::new();
    for script in collect_scripts(runtime.root(), &extension)? {
        match runtime.load(&script, true)? {
            Some(_) => loaded += 1,
            None => failed.push(script),
        }
    }
    println!("[module-check] loaded {loaded} scripts");
    if !failed.is_empty() {
        for script in &failed {
            eprintln!("[module-check] failed: {}", script.display());
        }
        bail!("{} script(s) failed to load", failed.len());
    }
    Ok(())
}

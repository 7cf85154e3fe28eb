use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use anyhow::{anyhow, Context, Result};
use parking_lot::{RwLock, RwLockReadGuard};
use rhai::{Array, Dynamic, Engine, EvalAltResult, ImmutableString};

use crate::commands::{CommandRegistry, CommandSpec};
use crate::completion::{self, CompletionRequest};
use crate::config::RuntimeConfig;
use crate::evaluator::{base_engine, RhaiEvaluator};
use crate::filesystem::OsFileSystem;
use crate::foreign::ForeignHandle;
use crate::logging::{ScriptLogger, TracingLogger};
use crate::module_cache::{ModuleCache, ModuleValue};
use crate::namespace::Namespace;
use crate::paths::{CanonicalPath, FileReference, PathCanonicalizer};

/// Which completion path a host routes a tab request through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionTarget {
    GeneralEval,
    RegisteredCommand,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutoloadReport {
    pub loaded: Vec<CanonicalPath>,
    pub failed: Vec<CanonicalPath>,
    pub exported: Vec<String>,
}

/// Functions scripts call back into the host with. Holds the cache weakly because the cache
/// owns the engine these functions are registered on.
#[derive(Clone)]
struct ScriptApi {
    modules: Weak<ModuleCache>,
    commands: Arc<CommandRegistry>,
    logger: Arc<dyn ScriptLogger>,
}

impl ScriptApi {
    fn modules(&self) -> Result<Arc<ModuleCache>, Box<EvalAltResult>> {
        self.modules.upgrade().ok_or_else(|| "module cache is no longer available".into())
    }

    fn load(&self, path: &str, warn_on_missing: bool) -> Result<Dynamic, Box<EvalAltResult>> {
        let loaded = self.modules()?.load(path, warn_on_missing);
        module_result(loaded)
    }

    fn require(&self, name: &str) -> Result<Dynamic, Box<EvalAltResult>> {
        let loaded = self.modules()?.require(name);
        module_result(loaded)
    }

    fn command(&self, name: &str, options: Array, intercepts: bool) {
        let options = options.into_iter().map(|opt| opt.to_string()).collect();
        let spec = CommandSpec { options, intercepts_completion: intercepts };
        if self.commands.register(name, spec).is_some() {
            self.logger.warn(&format!("command '{name}' was redefined"));
        }
    }

    fn echo(&self, message: &str) {
        self.logger.info(message);
    }
}

fn module_result(
    loaded: Result<Option<ModuleValue>, crate::error::ScriptError>,
) -> Result<Dynamic, Box<EvalAltResult>> {
    match loaded {
        Ok(Some(value)) => Ok((*value).clone()),
        Ok(None) => Ok(Dynamic::UNIT),
        Err(err) => Err(err.to_string().into()),
    }
}

fn script_engine(api: ScriptApi) -> Engine {
    let mut engine = base_engine();
    engine.register_type_with_name::<ForeignHandle>("ForeignHandle");
    engine.register_fn("type_name", |handle: &mut ForeignHandle| handle.type_name().to_string());
    engine.register_indexer_get(|handle: &mut ForeignHandle, name: ImmutableString| {
        handle.get(name.as_str()).unwrap_or(Dynamic::UNIT)
    });

    let load_api = api.clone();
    engine.register_fn("load", move |path: &str| load_api.load(path, false));
    let load_api = api.clone();
    engine.register_fn("load", move |path: &str, warn: bool| load_api.load(path, warn));
    let require_api = api.clone();
    engine.register_fn("require", move |name: &str| require_api.require(name));
    let command_api = api.clone();
    engine.register_fn("command", move |name: &str, options: Array| command_api.command(name, options, false));
    let command_api = api.clone();
    engine.register_fn("command", move |name: &str, options: Array, intercepts: bool| {
        command_api.command(name, options, intercepts)
    });
    engine.register_fn("echo", move |message: &str| api.echo(message));
    engine
}

/// Everything a host needs to run scripts out of one root directory: the module cache, the
/// global namespace, the command registry and the two completion paths.
pub struct ScriptRuntime {
    root: PathBuf,
    config: RuntimeConfig,
    modules: Arc<ModuleCache>,
    commands: Arc<CommandRegistry>,
    globals: Arc<RwLock<Namespace>>,
    logger: Arc<dyn ScriptLogger>,
    console_engine: Engine,
}

impl ScriptRuntime {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        Self::with_logger(root, Arc::new(TracingLogger))
    }

    pub fn with_logger(root: impl AsRef<Path>, logger: Arc<dyn ScriptLogger>) -> Result<Self> {
        let config = RuntimeConfig::for_root(root.as_ref());
        Self::with_config(root, config, logger)
    }

    pub fn with_config(root: impl AsRef<Path>, config: RuntimeConfig, logger: Arc<dyn ScriptLogger>) -> Result<Self> {
        let root = fs::canonicalize(root.as_ref())
            .with_context(|| format!("Opening script root {}", root.as_ref().display()))?;
        let commands = Arc::new(CommandRegistry::new());
        let module_dirs = config.module_dirs(&root);

        let mut namespace = Namespace::new();
        let config_value =
            rhai::serde::to_dynamic(&config).map_err(|err| anyhow!("Exposing config to scripts: {err}"))?;
        namespace.set("config", config_value);
        let globals = Arc::new(RwLock::new(namespace));

        let modules = Arc::new_cyclic(|cache: &Weak<ModuleCache>| {
            let api = ScriptApi { modules: cache.clone(), commands: Arc::clone(&commands), logger: Arc::clone(&logger) };
            let canonicalizer = PathCanonicalizer::new(Arc::new(OsFileSystem))
                .with_base_dir(&root)
                .with_default_extension(config.script_extension.clone());
            let evaluator = RhaiEvaluator::from_engine(script_engine(api)).with_globals(Arc::clone(&globals));
            ModuleCache::new(Arc::new(evaluator))
                .with_canonicalizer(canonicalizer)
                .with_logger(Arc::clone(&logger))
                .with_search_paths(module_dirs)
        });
        let console_engine = script_engine(ScriptApi {
            modules: Arc::downgrade(&modules),
            commands: Arc::clone(&commands),
            logger: Arc::clone(&logger),
        });

        Ok(Self {
            root,
            config,
            modules,
            commands,
            globals,
            logger,
            console_engine,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn modules(&self) -> &Arc<ModuleCache> {
        &self.modules
    }

    pub fn commands(&self) -> &Arc<CommandRegistry> {
        &self.commands
    }

    pub fn globals(&self) -> RwLockReadGuard<'_, Namespace> {
        self.globals.read()
    }

    pub fn set_global(&self, name: &str, value: Dynamic) {
        self.globals.write().set(name, value);
    }

    pub fn publish_foreign(&self, name: &str, handle: ForeignHandle) {
        self.set_global(name, handle.into_dynamic());
    }

    pub fn load(&self, reference: impl Into<FileReference>, warn_on_missing: bool) -> Result<Option<ModuleValue>> {
        Ok(self.modules.load(reference, warn_on_missing)?)
    }

    pub fn require(&self, name: &str) -> Result<Option<ModuleValue>> {
        Ok(self.modules.require(name)?)
    }

    /// Loads every script under the plugin directory and merges map exports into the globals.
    pub fn autoload_plugins(&self) -> Result<AutoloadReport> {
        let dir = self.config.plugin_root(&self.root);
        let mut report = AutoloadReport::default();
        if !dir.is_dir() {
            self.logger.warn(&format!("plugin directory {} not found", dir.display()));
            return Ok(report);
        }
        for script in collect_scripts(&dir, &self.config.script_extension)? {
            let canonical = self.modules.canonicalize(&script)?;
            match self.modules.load(canonical.clone(), true)? {
                Some(value) => {
                    let names = self.globals.write().merge_exports(&value);
                    report.exported.extend(names);
                    report.loaded.push(canonical);
                }
                None => report.failed.push(canonical),
            }
        }
        if self.config.verbose {
            self.logger.info(&format!(
                "autoloaded {} plugin(s), {} failed, {} global(s) exported",
                report.loaded.len(),
                report.failed.len(),
                report.exported.len()
            ));
        }
        Ok(report)
    }

    /// Evaluates console input with every global in scope.
    pub fn eval(&self, source: &str) -> Result<Dynamic> {
        let mut scope = self.globals.read().to_scope();
        scope.push_constant("__folder", format!("{}/", self.root.display()));
        self.console_engine.eval_with_scope::<Dynamic>(&mut scope, source).map_err(|err| anyhow!("{err}"))
    }

    pub fn tab_complete(&self, full_line: &str, last_token: &str, target: CompletionTarget) -> Vec<String> {
        match target {
            CompletionTarget::GeneralEval => {
                let request = CompletionRequest::new(full_line, last_token);
                let globals = self.globals.read();
                let candidates = completion::complete(&globals, &request);
                candidates
            }
            CompletionTarget::RegisteredCommand => self.commands.complete(&command_args(full_line)),
        }
    }
}

/// Arguments as the host splits them: single spaces, so trailing space leaves an empty argument.
fn command_args(line: &str) -> Vec<&str> {
    let line = line.trim_start();
    if line.is_empty() {
        Vec::new()
    } else {
        line.split(' ').collect()
    }
}

pub fn collect_scripts(root: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    if root.is_file() {
        if root.extension().and_then(|ext| ext.to_str()) == Some(extension) {
            out.push(root.to_path_buf());
        }
        return Ok(out);
    }
    for entry in fs::read_dir(root).with_context(|| format!("Reading '{}'", root.display()))? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            out.extend(collect_scripts(&path, extension)?);
        } else if path.extension().and_then(|ext| ext.to_str()) == Some(extension) {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_args_keep_trailing_empty_argument() {
        assert!(command_args("   ").is_empty());
        assert_eq!(command_args("heal"), vec!["heal"]);
        assert_eq!(command_args("heal "), vec!["heal", ""]);
        assert_eq!(command_args("heal a"), vec!["heal", "a"]);
    }
}

use std::sync::Arc;

use parking_lot::RwLock;
use rhai::{Dynamic, Engine, Scope};

use crate::error::EvaluationError;
use crate::namespace::Namespace;
use crate::paths::CanonicalPath;

/// What an evaluation can see about the file it is running.
#[derive(Debug, Clone)]
pub struct EvalContext {
    pub script: CanonicalPath,
    pub directory: String,
}

impl EvalContext {
    pub fn for_script(script: &CanonicalPath) -> Self {
        Self { script: script.clone(), directory: script.directory() }
    }
}

pub trait Evaluator: Send + Sync {
    fn evaluate(&self, source: &str, ctx: &EvalContext) -> Result<Dynamic, EvaluationError>;
}

pub struct RhaiEvaluator {
    engine: Engine,
    globals: Option<Arc<RwLock<Namespace>>>,
}

impl Default for RhaiEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl RhaiEvaluator {
    pub fn new() -> Self {
        Self::from_engine(base_engine())
    }

    pub fn from_engine(engine: Engine) -> Self {
        Self { engine, globals: None }
    }

    /// Binds every global into the scope of each evaluated script.
    pub fn with_globals(mut self, globals: Arc<RwLock<Namespace>>) -> Self {
        self.globals = Some(globals);
        self
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

impl Evaluator for RhaiEvaluator {
    fn evaluate(&self, source: &str, ctx: &EvalContext) -> Result<Dynamic, EvaluationError> {
        let mut scope = match &self.globals {
            Some(globals) => globals.read().to_scope(),
            None => Scope::new(),
        };
        scope.push_constant("__script", ctx.script.to_string());
        scope.push_constant("__folder", ctx.directory.clone());
        let result = self
            .engine
            .eval_with_scope::<Dynamic>(&mut scope, source)
            .map_err(|err| EvaluationError::new(err.to_string()))?;
        if result.is_unit() {
            if let Some(exports) = scope.get_value::<Dynamic>("exports") {
                return Ok(exports);
            }
        }
        Ok(result)
    }
}

/// Engine with script output routed into the `script` log target.
pub fn base_engine() -> Engine {
    let mut engine = Engine::new();
    engine.set_fast_operators(true);
    engine.on_print(|text| tracing::info!(target: "script", "{text}"));
    engine.on_debug(|text, source, pos| match source {
        Some(source) => tracing::debug!(target: "script", "{source} @ {pos:?} | {text}"),
        None => tracing::debug!(target: "script", "{pos:?} | {text}"),
    });
    engine
}

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use rhai::Dynamic;

use crate::error::ScriptError;
use crate::evaluator::{EvalContext, Evaluator};
use crate::filesystem::{FileSystem, OsFileSystem};
use crate::logging::{ScriptLogger, TracingLogger};
use crate::paths::{CanonicalPath, FileReference, PathCanonicalizer};
use crate::transform::SourceTransforms;

/// Value a module evaluated to. Shared so repeated loads hand out the same instance.
pub type ModuleValue = Arc<Dynamic>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleStatus {
    Unloaded,
    Loading,
    Loaded,
    Failed,
}

enum ModuleState {
    Unloaded,
    Loading,
    Loaded(ModuleValue),
    Failed,
}

impl ModuleState {
    fn status(&self) -> ModuleStatus {
        match self {
            ModuleState::Unloaded => ModuleStatus::Unloaded,
            ModuleState::Loading => ModuleStatus::Loading,
            ModuleState::Loaded(_) => ModuleStatus::Loaded,
            ModuleState::Failed => ModuleStatus::Failed,
        }
    }
}

/// Per-path lock. Reentrant so a script that loads itself sees `Loading` instead of deadlocking.
struct ModuleSlot {
    state: ReentrantMutex<RefCell<ModuleState>>,
}

impl ModuleSlot {
    fn new() -> Self {
        Self { state: ReentrantMutex::new(RefCell::new(ModuleState::Unloaded)) }
    }
}

/// Process-wide module table: each canonical path is evaluated at most once successfully.
/// Failed evaluations are not remembered, so a fixed file loads on the next attempt.
pub struct ModuleCache {
    canonicalizer: PathCanonicalizer,
    evaluator: Arc<dyn Evaluator>,
    transforms: SourceTransforms,
    logger: Arc<dyn ScriptLogger>,
    search_paths: Vec<PathBuf>,
    slots: Mutex<HashMap<CanonicalPath, Arc<ModuleSlot>>>,
}

impl ModuleCache {
    pub fn new(evaluator: Arc<dyn Evaluator>) -> Self {
        Self {
            canonicalizer: PathCanonicalizer::new(Arc::new(OsFileSystem)),
            evaluator,
            transforms: SourceTransforms::with_json_data(),
            logger: Arc::new(TracingLogger),
            search_paths: Vec::new(),
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_canonicalizer(mut self, canonicalizer: PathCanonicalizer) -> Self {
        self.canonicalizer = canonicalizer;
        self
    }

    pub fn with_transforms(mut self, transforms: SourceTransforms) -> Self {
        self.transforms = transforms;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn ScriptLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Directories searched, in order, by [`ModuleCache::require`] for bare module names.
    pub fn with_search_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.search_paths = paths;
        self
    }

    pub fn canonicalizer(&self) -> &PathCanonicalizer {
        &self.canonicalizer
    }

    pub fn canonicalize(&self, reference: impl Into<FileReference>) -> Result<CanonicalPath, ScriptError> {
        self.canonicalizer.canonicalize(&reference.into())
    }

    fn filesystem(&self) -> &Arc<dyn FileSystem> {
        self.canonicalizer.filesystem()
    }

    /// Slot for `path`. Missing files that were never tracked get no slot.
    fn slot(&self, path: &CanonicalPath) -> Option<Arc<ModuleSlot>> {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(path) {
            return Some(Arc::clone(slot));
        }
        if !self.filesystem().exists(path.as_path()) {
            return None;
        }
        Some(Arc::clone(slots.entry(path.clone()).or_insert_with(|| Arc::new(ModuleSlot::new()))))
    }

    fn report_missing(&self, path: &CanonicalPath, warn_on_missing: bool) {
        if warn_on_missing {
            self.logger.warn(&format!("{path} not found"));
        }
    }

    /// Loads and evaluates a script once. `Ok(None)` covers a missing file, a failed read or
    /// evaluation (logged, retried next time) and a circular load. Only an unresolvable path errors.
    pub fn load(
        &self,
        reference: impl Into<FileReference>,
        warn_on_missing: bool,
    ) -> Result<Option<ModuleValue>, ScriptError> {
        let canonical = self.canonicalize(reference)?;
        let Some(slot) = self.slot(&canonical) else {
            self.report_missing(&canonical, warn_on_missing);
            return Ok(None);
        };
        let guard = slot.state.lock();
        match &*guard.borrow() {
            ModuleState::Loaded(value) => return Ok(Some(Arc::clone(value))),
            ModuleState::Loading => {
                self.logger.warn(&format!("{canonical} is already loading; circular load skipped"));
                return Ok(None);
            }
            ModuleState::Unloaded | ModuleState::Failed => {}
        }

        if !self.filesystem().exists(canonical.as_path()) {
            self.report_missing(&canonical, warn_on_missing);
            return Ok(None);
        }

        guard.replace(ModuleState::Loading);
        let _unwind = FailOnUnwind(&guard);
        match self.evaluate_file(&canonical) {
            Ok(value) => {
                guard.replace(ModuleState::Loaded(Arc::clone(&value)));
                Ok(Some(value))
            }
            Err(err) => {
                guard.replace(ModuleState::Failed);
                self.logger.severe(&err.to_string());
                Ok(None)
            }
        }
    }

    fn evaluate_file(&self, path: &CanonicalPath) -> Result<ModuleValue, ScriptError> {
        let source = self
            .filesystem()
            .read_all(path.as_path())
            .map_err(|source| ScriptError::FileRead { path: path.clone(), source })?;
        let source = self
            .transforms
            .apply(path, source)
            .map_err(|source| ScriptError::Transform { path: path.clone(), source })?;
        let value = self
            .evaluator
            .evaluate(&source, &EvalContext::for_script(path))
            .map_err(|source| ScriptError::Evaluation { path: path.clone(), source })?;
        if value.is_unit() {
            Ok(Arc::new(Dynamic::TRUE))
        } else {
            Ok(Arc::new(value))
        }
    }

    /// Loads a module by name. Absolute names and names starting with `.` resolve against the
    /// base directory; bare names are tried in each search path in order.
    pub fn require(&self, name: &str) -> Result<Option<ModuleValue>, ScriptError> {
        let path = Path::new(name);
        if path.is_absolute() || name.starts_with('.') {
            return self.load(path, true);
        }
        for dir in &self.search_paths {
            let candidate = self.canonicalize(dir.join(path))?;
            if self.is_loaded(&candidate) || self.filesystem().exists(candidate.as_path()) {
                return self.load(candidate, true);
            }
        }
        self.logger.warn(&format!("module '{name}' not found in search paths"));
        Ok(None)
    }

    pub fn status(&self, path: &CanonicalPath) -> ModuleStatus {
        let slot = match self.slots.lock().get(path) {
            Some(slot) => Arc::clone(slot),
            None => return ModuleStatus::Unloaded,
        };
        slot_status(&slot)
    }

    pub fn is_loaded(&self, path: &CanonicalPath) -> bool {
        self.status(path) == ModuleStatus::Loaded
    }

    pub fn loaded_paths(&self) -> Vec<CanonicalPath> {
        let slots: Vec<(CanonicalPath, Arc<ModuleSlot>)> =
            self.slots.lock().iter().map(|(path, slot)| (path.clone(), Arc::clone(slot))).collect();
        let mut loaded: Vec<CanonicalPath> = slots
            .into_iter()
            .filter(|(_, slot)| slot_status(slot) == ModuleStatus::Loaded)
            .map(|(path, _)| path)
            .collect();
        loaded.sort();
        loaded
    }
}

/// Leaves a slot `Failed` instead of `Loading` when evaluation unwinds.
struct FailOnUnwind<'a>(&'a RefCell<ModuleState>);

impl Drop for FailOnUnwind<'_> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.0.try_borrow_mut() {
            if matches!(*state, ModuleState::Loading) {
                *state = ModuleState::Failed;
            }
        }
    }
}

fn slot_status(slot: &ModuleSlot) -> ModuleStatus {
    let Some(guard) = slot.state.try_lock() else {
        return ModuleStatus::Loading;
    };
    let status = match guard.try_borrow() {
        Ok(state) => state.status(),
        Err(_) => ModuleStatus::Loading,
    };
    status
}

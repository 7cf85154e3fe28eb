use std::collections::HashMap;
use std::fs;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use kestrel_script_host::evaluator::{EvalContext, Evaluator, RhaiEvaluator};
use kestrel_script_host::filesystem::{FileSystem, OsFileSystem};
use kestrel_script_host::{
    EvaluationError, LogLevel, MemoryLogger, ModuleCache, ModuleStatus, PathCanonicalizer, ScriptError,
};
use parking_lot::Mutex;
use rhai::{Dynamic, Map};
use tempfile::tempdir;

#[derive(Default)]
struct MemoryFs {
    files: Mutex<HashMap<PathBuf, String>>,
}

impl MemoryFs {
    fn with_file(self, path: &str, source: &str) -> Self {
        self.write(path, source);
        self
    }

    fn write(&self, path: &str, source: &str) {
        self.files.lock().insert(PathBuf::from(path), source.to_string());
    }
}

impl FileSystem for MemoryFs {
    fn exists(&self, path: &Path) -> bool {
        let files = self.files.lock();
        files.contains_key(path) || files.keys().any(|file| file.starts_with(path))
    }

    fn read_all(&self, path: &Path) -> io::Result<String> {
        self.files.lock().get(path).cloned().ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    fn resolve_canonical(&self, path: &Path) -> io::Result<PathBuf> {
        Ok(path.components().collect())
    }
}

struct DeniedFs;

impl FileSystem for DeniedFs {
    fn exists(&self, _path: &Path) -> bool {
        true
    }

    fn read_all(&self, _path: &Path) -> io::Result<String> {
        Err(io::Error::from(io::ErrorKind::PermissionDenied))
    }

    fn resolve_canonical(&self, _path: &Path) -> io::Result<PathBuf> {
        Err(io::Error::from(io::ErrorKind::PermissionDenied))
    }
}

struct UnreadableFs;

impl FileSystem for UnreadableFs {
    fn exists(&self, _path: &Path) -> bool {
        true
    }

    fn read_all(&self, _path: &Path) -> io::Result<String> {
        Err(io::Error::from(io::ErrorKind::PermissionDenied))
    }

    fn resolve_canonical(&self, path: &Path) -> io::Result<PathBuf> {
        Ok(path.to_path_buf())
    }
}

/// Panics on its first evaluation, then behaves.
struct PanicOnceEvaluator {
    inner: RhaiEvaluator,
    calls: AtomicUsize,
}

impl Evaluator for PanicOnceEvaluator {
    fn evaluate(&self, source: &str, ctx: &EvalContext) -> Result<Dynamic, EvaluationError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("evaluator blew up");
        }
        self.inner.evaluate(source, ctx)
    }
}

struct CountingEvaluator {
    inner: RhaiEvaluator,
    calls: AtomicUsize,
    delay: Duration,
}

impl CountingEvaluator {
    fn new(delay: Duration) -> Self {
        Self { inner: RhaiEvaluator::new(), calls: AtomicUsize::new(0), delay }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Evaluator for CountingEvaluator {
    fn evaluate(&self, source: &str, ctx: &EvalContext) -> Result<Dynamic, EvaluationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);
        self.inner.evaluate(source, ctx)
    }
}

fn memory_cache(fs: Arc<MemoryFs>, evaluator: Arc<CountingEvaluator>, logger: Arc<MemoryLogger>) -> ModuleCache {
    ModuleCache::new(evaluator)
        .with_canonicalizer(PathCanonicalizer::new(fs).with_base_dir("/mem").with_default_extension("rhai"))
        .with_logger(logger)
}

#[test]
fn repeated_loads_share_one_evaluation() {
    let fs = Arc::new(MemoryFs::default().with_file("/mem/greeter.rhai", "#{ greeting: \"hi\" }"));
    let evaluator = Arc::new(CountingEvaluator::new(Duration::ZERO));
    let cache = memory_cache(fs, Arc::clone(&evaluator), Arc::new(MemoryLogger::new()));

    let first = cache.load("greeter.rhai", true).expect("load").expect("value");
    let second = cache.load("greeter", true).expect("load").expect("value");
    let third = cache.load("/mem/./greeter.rhai", true).expect("load").expect("value");
    assert!(Arc::ptr_eq(&first, &second), "same path should return the cached instance");
    assert!(Arc::ptr_eq(&first, &third), "equivalent spellings share one entry");
    assert_eq!(evaluator.calls(), 1, "evaluated exactly once");
    assert_eq!(cache.loaded_paths().len(), 1);
}

#[test]
fn failed_evaluation_is_retried_after_fix() {
    let fs = Arc::new(MemoryFs::default().with_file("/mem/bad.rhai", "let = ;"));
    let evaluator = Arc::new(CountingEvaluator::new(Duration::ZERO));
    let logger = Arc::new(MemoryLogger::new());
    let cache = memory_cache(Arc::clone(&fs), Arc::clone(&evaluator), Arc::clone(&logger));

    assert!(cache.load("bad.rhai", true).expect("load").is_none());
    let path = cache.canonicalize("bad.rhai").expect("canonical");
    assert_eq!(cache.status(&path), ModuleStatus::Failed);
    let severe = logger.messages(LogLevel::Severe);
    assert_eq!(severe.len(), 1);
    assert!(severe[0].starts_with("error evaluating /mem/bad.rhai"), "unexpected message {}", severe[0]);

    fs.write("/mem/bad.rhai", "40 + 2");
    let value = cache.load("bad.rhai", true).expect("load").expect("fixed script loads");
    assert_eq!(value.as_int(), Ok(42));
    assert_eq!(evaluator.calls(), 2, "failures are not cached");
}

#[test]
fn missing_files_warn_only_when_asked() {
    let fs = Arc::new(MemoryFs::default());
    let logger = Arc::new(MemoryLogger::new());
    let cache = memory_cache(fs, Arc::new(CountingEvaluator::new(Duration::ZERO)), Arc::clone(&logger));

    assert!(cache.load("ghost.rhai", false).expect("load").is_none());
    assert!(logger.take().is_empty(), "silent when warnOnMissing is false");
    assert!(cache.load("ghost.rhai", true).expect("load").is_none());
    assert_eq!(logger.messages(LogLevel::Warn), vec!["/mem/ghost.rhai not found".to_string()]);
}

#[test]
fn unresolvable_paths_propagate() {
    let cache = ModuleCache::new(Arc::new(RhaiEvaluator::new()))
        .with_canonicalizer(PathCanonicalizer::new(Arc::new(DeniedFs)).with_base_dir("/locked"));
    let err = cache.load("secret.rhai", true).expect_err("permission errors propagate");
    assert!(matches!(err, ScriptError::PathResolution { .. }), "unexpected error {err}");
}

#[test]
fn unit_results_become_true() {
    let fs = Arc::new(MemoryFs::default().with_file("/mem/side_effect.rhai", "let x = 1;"));
    let cache = memory_cache(fs, Arc::new(CountingEvaluator::new(Duration::ZERO)), Arc::new(MemoryLogger::new()));
    let value = cache.load("side_effect.rhai", false).expect("load").expect("value");
    assert_eq!(value.as_bool(), Ok(true));
}

#[test]
fn exports_variable_is_the_module_value() {
    let fs = Arc::new(MemoryFs::default().with_file("/mem/lib.rhai", "let exports = #{ answer: 42 };"));
    let cache = memory_cache(fs, Arc::new(CountingEvaluator::new(Duration::ZERO)), Arc::new(MemoryLogger::new()));
    let value = cache.load("lib", false).expect("load").expect("value");
    let map = value.read_lock::<Map>().expect("map export");
    assert_eq!(map.get("answer").and_then(|v| v.as_int().ok()), Some(42));
}

#[test]
fn concurrent_loads_evaluate_once() {
    let fs = Arc::new(MemoryFs::default().with_file("/mem/slow.rhai", "#{ ready: true }"));
    let evaluator = Arc::new(CountingEvaluator::new(Duration::from_millis(50)));
    let cache = Arc::new(memory_cache(fs, Arc::clone(&evaluator), Arc::new(MemoryLogger::new())));

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.load("slow.rhai", true).expect("load").expect("value"))
        })
        .collect();
    let values: Vec<_> = workers.into_iter().map(|worker| worker.join().expect("worker")).collect();
    assert_eq!(evaluator.calls(), 1, "concurrent loads must not double-evaluate");
    assert!(values.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}

#[test]
fn json_files_load_as_maps() {
    let dir = tempdir().expect("temp dir");
    fs::write(dir.path().join("kit.json"), r#"{ "name": "starter", "items": [1, 2.5, null], "nested": { "ok": true } }"#)
        .expect("write json");
    let cache = ModuleCache::new(Arc::new(RhaiEvaluator::new()))
        .with_canonicalizer(PathCanonicalizer::new(Arc::new(OsFileSystem)).with_base_dir(dir.path()));
    let value = cache.load("kit.json", true).expect("load").expect("value");
    let map = value.read_lock::<Map>().expect("json object becomes a map");
    assert_eq!(map.get("name").map(ToString::to_string).as_deref(), Some("starter"));
    assert_eq!(map.get("items").map(|items| items.is_array()), Some(true));
    assert!(map.get("nested").map(|nested| nested.is_map()).unwrap_or(false));
}

#[test]
fn require_searches_paths_in_order() {
    let fs = Arc::new(
        MemoryFs::default()
            .with_file("/mem/lib/util.rhai", "#{ from: \"lib\" }")
            .with_file("/mem/modules/util.rhai", "#{ from: \"modules\" }")
            .with_file("/mem/modules/only.rhai", "7"),
    );
    let logger = Arc::new(MemoryLogger::new());
    let cache = memory_cache(fs, Arc::new(CountingEvaluator::new(Duration::ZERO)), Arc::clone(&logger))
        .with_search_paths(vec![PathBuf::from("/mem/lib"), PathBuf::from("/mem/modules")]);

    let util = cache.require("util").expect("require").expect("util");
    let from = util.read_lock::<Map>().and_then(|map| map.get("from").map(ToString::to_string));
    assert_eq!(from.as_deref(), Some("lib"));
    assert_eq!(cache.require("only").expect("require").and_then(|v| v.as_int().ok()), Some(7));
    assert!(cache.require("nowhere").expect("require").is_none());
    assert_eq!(logger.messages(LogLevel::Warn), vec!["module 'nowhere' not found in search paths".to_string()]);
}

#[test]
fn unreadable_files_fail_without_caching() {
    let logger = Arc::new(MemoryLogger::new());
    let cache = ModuleCache::new(Arc::new(RhaiEvaluator::new()))
        .with_canonicalizer(PathCanonicalizer::new(Arc::new(UnreadableFs)).with_base_dir("/locked"))
        .with_logger(logger.clone());

    assert!(cache.load("secret.rhai", true).expect("read errors are logged, not returned").is_none());
    let severe = logger.messages(LogLevel::Severe);
    assert_eq!(severe.len(), 1);
    assert!(severe[0].starts_with("error reading /locked/secret.rhai"), "unexpected message {}", severe[0]);
    let path = cache.canonicalize("secret.rhai").expect("canonical");
    assert_eq!(cache.status(&path), ModuleStatus::Failed);
}

#[test]
fn panicking_evaluation_leaves_the_module_retryable() {
    let fs = Arc::new(MemoryFs::default().with_file("/mem/a.rhai", "40 + 2"));
    let logger = Arc::new(MemoryLogger::new());
    let evaluator = Arc::new(PanicOnceEvaluator { inner: RhaiEvaluator::new(), calls: AtomicUsize::new(0) });
    let cache = ModuleCache::new(evaluator)
        .with_canonicalizer(PathCanonicalizer::new(fs).with_base_dir("/mem"))
        .with_logger(logger.clone());

    let first = panic::catch_unwind(AssertUnwindSafe(|| cache.load("a.rhai", true)));
    assert!(first.is_err(), "the first evaluation panics");
    let path = cache.canonicalize("a.rhai").expect("canonical");
    assert_eq!(cache.status(&path), ModuleStatus::Failed);

    let second = cache.load("a.rhai", true).expect("load").expect("retried after the panic");
    assert_eq!(second.as_int(), Ok(42));
    assert!(logger.messages(LogLevel::Warn).is_empty(), "no circular-load warning after a panic");
}

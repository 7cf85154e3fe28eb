pub mod cli;
pub mod commands;
pub mod completion;
pub mod config;
pub mod console;
pub mod error;
pub mod evaluator;
pub mod filesystem;
pub mod foreign;
pub mod introspect;
pub mod logging;
pub mod module_cache;
pub mod namespace;
pub mod paths;
pub mod runtime;
pub mod transform;

pub use commands::{CommandRegistry, CommandSpec};
pub use console::{ConsoleEntry, ConsoleEntryKind, ScriptConsole};
pub use error::{EvaluationError, ProbeError, ScriptError, TransformError};
pub use evaluator::{EvalContext, Evaluator, RhaiEvaluator};
pub use foreign::{ForeignHandle, ForeignObject, MemberKind, ReflectedObject};
pub use logging::{LogLevel, MemoryLogger, ScriptLogger, TracingLogger};
pub use module_cache::{ModuleCache, ModuleStatus, ModuleValue};
pub use namespace::Namespace;
pub use paths::{CanonicalPath, FileReference, PathCanonicalizer};
pub use runtime::{AutoloadReport, CompletionTarget, ScriptRuntime};

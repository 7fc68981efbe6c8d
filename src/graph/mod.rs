//! The corpus model: per-file records, the module (include) graph and the
//! function call graph, plus the directory scan that feeds them.

pub mod builder;
pub mod engine;
pub mod types;

pub use builder::{rel_path, scan, ScanResult, ScanStats};
pub use engine::{
    CallGraph, CallResolution, FileSnapshot, IncludeResolution, Model, ModelSnapshot, ModelStats,
    ModuleGraph, Resolution, ResolvedInclude,
};
pub use types::{
    CallKind, CallSite, EdgeData, EdgeKind, FunctionDef, HeaderInfo, IncludeRef, IncludeTarget,
    LineEndings, ManifestBlock, NodeData, NodeKind, Role, ScriptRecord,
};

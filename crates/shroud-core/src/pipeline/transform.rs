use crate::analysis::AnalysisCache;
use crate::error::CoreError;
use crate::ir::Module;

use super::config::DebugConfig;

/// Shared state threaded through every pass in one pipeline run.
///
/// Holds the analysis cache so transforms can request cached results and
/// declare what they invalidate. One context per pipeline; analyses are
/// never stored in globals.
#[derive(Debug, Default)]
pub struct PassContext {
    pub analyses: AnalysisCache,
    /// Mirror of [`DebugConfig::trace`]; passes may emit diagnostic lines
    /// to stderr when set. Observability only, never part of the contract.
    pub trace: bool,
}

impl PassContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Result of applying a transform pass.
pub struct TransformResult {
    pub module: Module,
    /// Whether the pass modified the module.
    pub changed: bool,
}

/// Output of the transform pipeline.
pub struct PipelineOutput {
    pub module: Module,
    /// `true` when the pipeline was stopped early by a dump-after request.
    pub stopped_early: bool,
}

/// A pass that transforms IR modules.
///
/// A pass either completes and leaves every function well-formed, or
/// returns an error without having touched the rejected function.
pub trait Transform {
    /// Name of this transform pass: the identifier the registry and the
    /// CLI use to request it.
    fn name(&self) -> &str;

    /// Apply this transform to a module, returning the transformed module
    /// and whether any changes were made. The context carries the analysis
    /// cache; a pass that mutates a function's instructions must bump its
    /// generation there.
    fn apply(&self, module: Module, cx: &mut PassContext) -> Result<TransformResult, CoreError>;

    /// If true, the pipeline skips this pass on fixpoint iterations after
    /// the first.
    fn run_once(&self) -> bool {
        false
    }
}

/// Maximum number of fixpoint iterations before giving up.
const MAX_FIXPOINT_ITERATIONS: usize = 100;

/// Valid pass names, in canonical pipeline order.
pub const VALID_PASS_NAMES: &[&str] = &["flattening", "substitution"];

/// An ordered sequence of transforms to apply.
pub struct TransformPipeline {
    transforms: Vec<Box<dyn Transform>>,
    fixpoint: bool,
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self {
            transforms: Vec::new(),
            fixpoint: false,
        }
    }

    pub fn add(&mut self, transform: Box<dyn Transform>) {
        self.transforms.push(transform);
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Enable fixpoint iteration: re-run the entire pipeline until no pass
    /// reports changes, or until the iteration cap is reached.
    pub fn set_fixpoint(&mut self, enabled: bool) {
        self.fixpoint = enabled;
    }

    /// Run all transforms in order on the given module.
    pub fn run(&self, module: Module) -> Result<Module, CoreError> {
        Ok(self.run_with_debug(module, &DebugConfig::none())?.module)
    }

    /// Run the pipeline, honouring debug configuration.
    ///
    /// When `debug.dump_ir_after` is `Some(pass_name)` and fixpoint mode is
    /// off, the pipeline stops after the named pass, dumps IR (filtered by
    /// `debug.function_filter`), and returns with `stopped_early = true`.
    /// If the named pass is not in the pipeline, the run completes and
    /// returns `stopped_early = false` and the caller can emit a warning.
    pub fn run_with_debug(
        &self,
        mut module: Module,
        debug: &DebugConfig,
    ) -> Result<PipelineOutput, CoreError> {
        let mut cx = PassContext {
            analyses: AnalysisCache::new(),
            trace: debug.trace,
        };

        let stop_after = debug.dump_ir_after.as_deref();

        if self.fixpoint {
            // In fixpoint mode we can't meaningfully stop mid-iteration, so
            // we run to completion and ignore `dump_ir_after`.
            for iteration in 0..MAX_FIXPOINT_ITERATIONS {
                let mut any_changed = false;
                for transform in &self.transforms {
                    if iteration > 0 && transform.run_once() {
                        continue;
                    }
                    let result = transform.apply(module, &mut cx)?;
                    any_changed |= result.changed;
                    module = result.module;
                }
                if !any_changed {
                    break;
                }
            }
        } else {
            for transform in &self.transforms {
                module = transform.apply(module, &mut cx)?.module;
                if stop_after == Some(transform.name()) {
                    dump_ir_functions(&module, debug);
                    return Ok(PipelineOutput {
                        module,
                        stopped_early: true,
                    });
                }
            }
        }

        // Compact instruction arenas: substitution and flattening unlink
        // instructions without removing arena entries.
        for func in module.functions.values_mut() {
            func.compact_insts();
        }

        Ok(PipelineOutput {
            module,
            stopped_early: false,
        })
    }
}

/// Dump IR for all functions in `module` that pass the debug filter.
fn dump_ir_functions(module: &Module, debug: &DebugConfig) {
    for func in module.functions.values() {
        if debug.should_dump(&func.name) {
            eprintln!("=== IR: {} ===\n{}\n=== end IR ===\n", func.name, func);
        }
    }
}

impl Default for TransformPipeline {
    fn default() -> Self {
        Self::new()
    }
}

pub mod config;
pub mod transform;

pub use config::{DebugConfig, PassConfig};
pub use transform::{
    PassContext, PipelineOutput, Transform, TransformPipeline, TransformResult, VALID_PASS_NAMES,
};

//! Obfuscating transforms over the IR.

pub mod flatten;
pub mod substitute;
pub mod util;


pub use flatten::ControlFlowFlattening;
pub use substitute::InstructionSubstitution;

use crate::error::CoreError;
use crate::pipeline::{PassConfig, Transform, TransformPipeline};

/// Builds the standard pipeline from a pass configuration.
pub fn default_pipeline(config: &PassConfig) -> TransformPipeline {
    let mut pipeline = TransformPipeline::new();
    if config.flattening {
        pipeline.add(Box::new(ControlFlowFlattening));
    }
    if config.substitution {
        pipeline.add(Box::new(InstructionSubstitution));
    }
    pipeline.set_fixpoint(config.fixpoint);
    pipeline
}

/// Looks up a transform by its pass name.
pub fn transform_by_name(name: &str) -> Result<Box<dyn Transform>, CoreError> {
    match name {
        "flattening" => Ok(Box::new(ControlFlowFlattening)),
        "substitution" => Ok(Box::new(InstructionSubstitution)),
        other => Err(CoreError::UnknownPass(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name() {
        assert_eq!(transform_by_name("flattening").unwrap().name(), "flattening");
        assert_eq!(
            transform_by_name("substitution").unwrap().name(),
            "substitution"
        );
        assert!(matches!(
            transform_by_name("inliner"),
            Err(CoreError::UnknownPass(_))
        ));
    }

    #[test]
    fn default_pipeline_respects_config() {
        let pipeline = default_pipeline(&PassConfig::default());
        assert_eq!(pipeline.len(), 2);

        let only_flatten = PassConfig {
            flattening: true,
            substitution: false,
            fixpoint: false,
        };
        assert_eq!(default_pipeline(&only_flatten).len(), 1);
    }
}

//! Built-in demo processes.
//!
//! - Math: Add, Multiply, Average, Scale, Fail, Sleep and the MathPipeline
//! - Data: LoadData, TransformData, ValidateData, AnalyzeData, SaveResult and
//!   the DataPipeline

pub mod data;
pub mod math;

pub use data::{AnalyzeData, DataPipeline, LoadData, SaveResult, TransformData, ValidateData};
pub use math::{Add, Average, Fail, MathPipeline, Multiply, Scale, Sleep};

use crate::registry::ProcessRegistry;

/// Registry holding every built-in process under its type name
pub fn registry() -> ProcessRegistry {
    let mut registry = ProcessRegistry::new();
    registry
        .register_atomic::<Add>()
        .register_atomic::<Multiply>()
        .register_atomic::<Average>()
        .register_atomic::<Scale>()
        .register_atomic::<Fail>()
        .register_atomic::<Sleep>()
        .register_atomic::<LoadData>()
        .register_atomic::<TransformData>()
        .register_atomic::<ValidateData>()
        .register_atomic::<AnalyzeData>()
        .register_atomic::<SaveResult>()
        .register_orchestrated::<MathPipeline>()
        .register_orchestrated::<DataPipeline>();
    registry
}

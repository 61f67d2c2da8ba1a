//! Algorithm engines shared by the pipeline stages

pub mod bicubic;
pub mod interpolation;

pub use bicubic::{BicubicParams, BicubicUpscaler, BicubicWeightTable};
pub use interpolation::{BlockMotion, FrameInterpolationEngine, InterpolationParams, MotionParams};

//! Error types shared by every pipeline component

use crate::renderer::{RenderError, ShaderError};

/// Result type returned by every public entry point
pub type FrameliftResult<T> = Result<T, FrameliftError>;

/// Errors surfaced by the pipeline, its stages and its algorithm engines
#[derive(Debug, thiserror::Error)]
pub enum FrameliftError {
    /// The component was never initialized or has been released
    #[error("{component} is not initialized")]
    NotInitialized {
        /// Name of the component
        component: &'static str,
    },

    /// A required texture handle was null
    #[error("{component}: invalid input or output texture")]
    NullTexture {
        /// Name of the component
        component: &'static str,
    },

    /// A component failed to initialize; the pipeline is unusable
    #[error("failed to initialize {component}")]
    Initialization {
        /// Name of the component
        component: &'static str,
        /// Underlying failure
        #[source]
        source: Box<FrameliftError>,
    },

    /// A stage failed while processing a frame
    #[error("stage {stage} failed")]
    Stage {
        /// Name of the stage
        stage: &'static str,
        /// Underlying failure
        #[source]
        source: Box<FrameliftError>,
    },

    /// Synthesizing the intermediate frame at `time_position` failed
    #[error("failed to generate intermediate frame at time position {time_position:.2}")]
    Interpolation {
        /// Temporal offset of the failed frame
        time_position: f32,
        /// Underlying failure
        #[source]
        source: Box<FrameliftError>,
    },

    /// A rendering collaborator call failed
    #[error(transparent)]
    Render(#[from] RenderError),

    /// A program could not be resolved
    #[error(transparent)]
    Shader(#[from] ShaderError),
}

impl FrameliftError {
    /// Wraps `self` as the initialization failure of `component`
    pub fn during_initialization(self, component: &'static str) -> Self {
        Self::Initialization { component, source: Box::new(self) }
    }

    /// Wraps `self` as the processing failure of `stage`
    pub fn in_stage(self, stage: &'static str) -> Self {
        Self::Stage { stage, source: Box::new(self) }
    }

    /// Name of the component or stage that failed, if recorded
    pub fn component(&self) -> Option<&'static str> {
        match self {
            Self::NotInitialized { component } | Self::NullTexture { component } | Self::Initialization { component, .. } => Some(component),
            Self::Stage { stage, .. } => Some(stage),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_initialization_names_component() {
        let err = FrameliftError::from(ShaderError::NotFound("bicubic_upscale.wgsl".into())).during_initialization("BicubicUpscaler");
        assert_eq!(err.component(), Some("BicubicUpscaler"));
        assert_eq!(err.to_string(), "failed to initialize BicubicUpscaler");
        assert!(err.source().unwrap().to_string().contains("bicubic_upscale.wgsl"));
    }

    #[test]
    fn test_interpolation_reports_time_position() {
        let err = FrameliftError::Interpolation {
            time_position: 0.75,
            source: Box::new(RenderError::Device("lost".into()).into()),
        };
        assert!(err.to_string().contains("0.75"));
        assert_eq!(err.component(), None);
    }
}

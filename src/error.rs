use thiserror::Error;

/// Failures reported by a [`Device`](crate::renderer::Device) implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("presentation surface lost")]
    SurfaceLost,
    #[error("device out of memory")]
    OutOfMemory,
    #[error("unknown {kind} handle {id}")]
    UnknownResource { kind: &'static str, id: u32 },
    #[error("output slot {0} is not supported")]
    InvalidSlot(u32),
    #[error("sampler index {0} is not supported")]
    InvalidSampler(u32),
    #[error("constant registers {first}..{end} exceed the register file ({capacity})")]
    RegisterOutOfRange { first: u32, end: u32, capacity: u32 },
    #[error("shader source `{0}` not found")]
    ShaderNotFound(String),
    #[error("{0}")]
    Backend(String),
}

/// Scene elements that must be installed before the render loop starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneElement {
    Plane,
    LightSource,
    TargetPlane,
}

impl std::fmt::Display for SceneElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SceneElement::Plane => "plane",
            SceneElement::LightSource => "light source model",
            SceneElement::TargetPlane => "target plane",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum DemoError {
    /// Device or resource creation failed; partially acquired resources were
    /// already released when this is returned.
    #[error("failed to initialise {what}: {source}")]
    Initialization {
        what: String,
        #[source]
        source: DeviceError,
    },

    /// A per-frame device call failed.
    #[error("device call failed: {0}")]
    Device(#[from] DeviceError),

    #[error("no {0} was set before starting the render loop")]
    MissingSceneElement(SceneElement),

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("model needs {needed} constant registers but only {capacity} are available")]
    ConstantBudgetExceeded { needed: usize, capacity: usize },

    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),

    #[error(transparent)]
    EventLoop(#[from] winit::error::EventLoopError),
}

impl DemoError {
    pub fn init(what: impl Into<String>, source: DeviceError) -> Self {
        DemoError::Initialization {
            what: what.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, DemoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_element_message_names_the_element() {
        let err = DemoError::MissingSceneElement(SceneElement::TargetPlane);
        assert_eq!(
            err.to_string(),
            "no target plane was set before starting the render loop"
        );
    }

    #[test]
    fn device_errors_convert_into_runtime_errors() {
        let err: DemoError = DeviceError::SurfaceLost.into();
        assert!(matches!(err, DemoError::Device(DeviceError::SurfaceLost)));
    }
}

//! Error types.
//!
//! Only device and windowing failures are errors. Degenerate input (empty
//! geometry, zero-length vectors, singular matrices) is always answered with a
//! well-defined degenerate value instead.

use thiserror::Error;

/// Failures reported by a [`GraphicsDevice`](crate::GraphicsDevice).
///
/// These are treated as unrecoverable for the current graphics context: they
/// are propagated to the caller and never retried.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// No adapter compatible with the surface was found.
    #[error("no suitable GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    /// The logical device could not be created.
    #[error("failed to create device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    /// The window surface could not be created.
    #[error("failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    /// The next frame could not be acquired from the surface.
    #[error("failed to acquire frame: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    /// A validation or out-of-memory error raised while allocating `label`.
    #[error("device rejected {label}: {source}")]
    Allocation {
        label: String,
        #[source]
        source: wgpu::Error,
    },

    /// The device ran out of memory for `label`.
    #[error("out of device memory while allocating {label}")]
    OutOfMemory { label: String },

    /// A resource id that this device never issued, or already released.
    #[error("unknown {kind} resource")]
    UnknownResource { kind: &'static str },

    /// A pass draws without binding every vertex buffer its pipeline reads.
    #[error("pipeline reads {expected} vertex buffers but the pass binds {bound}")]
    VertexBuffers { expected: u32, bound: u32 },

    /// A pass was encoded or submitted outside `begin_frame`/`submit`.
    #[error("no frame in progress")]
    NoFrame,
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("window creation failed: {0}")]
    Window(#[from] winit::error::OsError),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_errors_lift_into_crate_error() {
        fn fails() -> Result<()> {
            Err(DeviceError::UnknownResource { kind: "buffer" })?;
            Ok(())
        }

        let err = fails().unwrap_err();
        assert!(matches!(err, Error::Device(DeviceError::UnknownResource { .. })));
        assert_eq!(err.to_string(), "unknown buffer resource");
    }
}

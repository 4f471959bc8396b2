//! Error types.
//!
//! Emitter registration errors are recoverable (the caller can simply stop
//! adding emitters); GPU setup errors are fatal and propagate out to the
//! demo boundary, where the process aborts.

use std::fmt;

use crate::emitter::EmitterKind;

/// Errors from emitter registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitterError {
    /// The per-kind emitter limit was reached.
    LimitReached { kind: EmitterKind, max: usize },
}

impl fmt::Display for EmitterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmitterError::LimitReached { kind, max } => {
                write!(f, "emitter limit reached: at most {} {:?} emitters", max, kind)
            }
        }
    }
}

impl std::error::Error for EmitterError {}

/// Errors that can occur during GPU initialization.
#[derive(Debug)]
pub enum GpuError {
    /// Failed to create a surface for rendering.
    SurfaceCreation(wgpu::CreateSurfaceError),
    /// No compatible GPU adapter found.
    NoAdapter,
    /// Failed to create GPU device.
    DeviceCreation(wgpu::RequestDeviceError),
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::SurfaceCreation(e) => write!(f, "Failed to create GPU surface: {}", e),
            GpuError::NoAdapter => write!(
                f,
                "No compatible GPU adapter found. Ensure your system has a GPU with WebGPU/Vulkan/Metal/DX12 support."
            ),
            GpuError::DeviceCreation(e) => write!(f, "Failed to create GPU device: {}", e),
        }
    }
}

impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::SurfaceCreation(e) => Some(e),
            GpuError::DeviceCreation(e) => Some(e),
            GpuError::NoAdapter => None,
        }
    }
}

impl From<wgpu::CreateSurfaceError> for GpuError {
    fn from(e: wgpu::CreateSurfaceError) -> Self {
        GpuError::SurfaceCreation(e)
    }
}

impl From<wgpu::RequestDeviceError> for GpuError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        GpuError::DeviceCreation(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_reached_display_names_kind() {
        let e = EmitterError::LimitReached {
            kind: EmitterKind::Bar,
            max: 5,
        };
        let msg = e.to_string();
        assert!(msg.contains("Bar"));
        assert!(msg.contains('5'));
    }
}

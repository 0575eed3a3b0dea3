//! Compute device selection.

use candle_core::Device;
use tracing::debug;
#[cfg(any(feature = "cuda", feature = "metal"))]
use tracing::info;

use crate::Result;

/// Select the best available device.
///
/// Falls back to CPU when no accelerator feature is compiled in or the
/// accelerator cannot be opened.
pub fn select_device(use_gpu: bool) -> Result<Device> {
    if !use_gpu {
        return Ok(Device::Cpu);
    }

    #[cfg(feature = "cuda")]
    {
        match Device::new_cuda(0) {
            Ok(device) => {
                info!("CUDA device available");
                return Ok(device);
            }
            Err(e) => {
                debug!("CUDA not available: {}, falling back to CPU", e);
            }
        }
    }

    #[cfg(feature = "metal")]
    {
        match Device::new_metal(0) {
            Ok(device) => {
                info!("Metal device available");
                return Ok(device);
            }
            Err(e) => {
                debug!("Metal not available: {}, falling back to CPU", e);
            }
        }
    }

    debug!("No accelerator selected, using CPU");
    Ok(Device::Cpu)
}

/// Check if a device is an accelerator.
pub fn is_gpu(device: &Device) -> bool {
    matches!(device, Device::Cuda(_) | Device::Metal(_))
}

use crate::{Gpt2, Hub, InferError};
use candle_core::Device;
use std::path::Path;

/// Device selection and model factory.
#[derive(Debug, Clone)]
pub struct Inference {
    device: Device,
}

impl Inference {
    pub fn cpu() -> Self {
        log::info!("Inference device: CPU");
        Self {
            device: Device::Cpu,
        }
    }

    #[cfg(feature = "cuda")]
    pub fn cuda(ordinal: usize) -> Result<Self, InferError> {
        let device = Device::new_cuda(ordinal)?;
        if device.is_cuda() {
            log::info!("Inference device: CUDA (ordinal {})", ordinal);
        } else {
            log::warn!(
                "Inference device: requested CUDA ordinal {} but device reports non-CUDA",
                ordinal
            );
        }
        Ok(Self { device })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Load a GPT-2 checkpoint from a local directory.
    pub fn use_gpt2(&self, model_dir: impl AsRef<Path>) -> Result<Gpt2, InferError> {
        Gpt2::load(model_dir, self.device.clone())
    }

    /// Fetch `repo` through `hub` (reusing cached files) and load it.
    pub async fn use_gpt2_from_hub(&self, hub: &Hub, repo: &str) -> Result<Gpt2, InferError> {
        let dir = hub.snapshot(repo).await?;
        let device = self.device.clone();
        tokio::task::spawn_blocking(move || Gpt2::load(dir, device))
            .await
            .map_err(|e| InferError::Runtime(format!("Task join error: {}", e)))?
    }
}

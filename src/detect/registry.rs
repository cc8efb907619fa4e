use std::collections::HashMap;
use std::fmt;

use anyhow::{anyhow, Result};

use super::backend::DetectorBackend;
use super::backends::{MotionBackend, StubBackend};

type Loader = Box<dyn Fn() -> Result<Box<dyn DetectorBackend>> + Send + Sync>;

/// Named model resources.
///
/// A pipeline is constructed from a model *name*; the registry turns that
/// name into a freshly loaded backend. Loaders run on the analysis worker.
pub struct ModelRegistry {
    loaders: HashMap<String, Loader>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            loaders: HashMap::new(),
        }
    }

    /// Registry with the built-in backends: `stub` (no detections) and
    /// `motion` (CPU frame differencing).
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("stub", || Ok(Box::new(StubBackend::new())));
        registry.register("motion", || Ok(Box::new(MotionBackend::new())));
        registry
    }

    /// Register a loader. Re-registering a name replaces the loader.
    pub fn register<F, B>(&mut self, name: &str, loader: F)
    where
        F: Fn() -> Result<Box<B>> + Send + Sync + 'static,
        B: DetectorBackend + 'static,
    {
        let boxed: Loader = Box::new(move || {
            let backend: Box<dyn DetectorBackend> = loader()?;
            Ok(backend)
        });
        if self.loaders.insert(name.to_string(), boxed).is_some() {
            log::debug!("model '{}' re-registered", name);
        }
    }

    /// Register an ONNX model file under `name`.
    #[cfg(feature = "backend-tract")]
    pub fn register_tract(
        &mut self,
        name: &str,
        model_path: std::path::PathBuf,
        labels_path: Option<std::path::PathBuf>,
        input_width: u32,
        input_height: u32,
    ) {
        use super::backends::TractBackend;
        self.register(name, move || {
            let mut backend = TractBackend::new(&model_path, input_width, input_height)?;
            if let Some(path) = &labels_path {
                backend = backend.with_labels_file(path)?;
            }
            Ok(Box::new(backend))
        });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.loaders.contains_key(name)
    }

    /// List registered model names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.loaders.keys().cloned().collect();
        names.sort();
        names
    }

    /// Load a model by name and run its warm-up hook.
    pub fn load(&self, name: &str) -> Result<Box<dyn DetectorBackend>> {
        let loader = self
            .loaders
            .get(name)
            .ok_or_else(|| anyhow!("model '{}' not registered", name))?;
        let mut backend = loader()?;
        backend
            .warm_up()
            .map_err(|e| anyhow!("model '{}' warm-up failed: {:#}", name, e))?;
        Ok(backend)
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.list())
            .finish()
    }
}

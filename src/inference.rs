//! Inference adapter: the narrow contract between the pipeline and the
//! neural network, and its ONNX Runtime implementation.

use crate::{Error, Result};
use log::{debug, info, warn};
use ndarray::{Array3, Array4, ArrayViewD, Axis, CowArray, Ix3};
use ort::{Environment, Session, Value};
use std::path::Path;
use std::sync::Arc;

/// Raw network output, each map reduced to its last (highest resolution)
/// entry along the leading axis with the batch axis dropped
#[derive(Debug, Clone)]
pub struct InferenceOutput {
    /// 3D coordinate maps, (57, h, w)
    pub features: Array3<f32>,
    /// Keypoint heatmaps, (19, h, w): 18 keypoints plus background
    pub heatmaps: Array3<f32>,
    /// Part affinity fields, (38, h, w)
    pub pafs: Array3<f32>,
}

impl InferenceOutput {
    /// Build from raw engine tensors of shape (N, C, h, w) or (C, h, w)
    pub fn from_raw(features: ArrayViewD<f32>, heatmaps: ArrayViewD<f32>, pafs: ArrayViewD<f32>) -> Result<Self> {
        Ok(Self {
            features: last_scale(features, "features")?,
            heatmaps: last_scale(heatmaps, "heatmaps")?,
            pafs: last_scale(pafs, "pafs")?,
        })
    }
}

/// Drop the leading axis of a 4D map by taking its last entry
fn last_scale(raw: ArrayViewD<f32>, name: &str) -> Result<Array3<f32>> {
    let reduced = match raw.ndim() {
        4 => {
            let last = raw.len_of(Axis(0)).checked_sub(1).ok_or_else(|| {
                Error::ModelOutputError(format!("Output '{name}' has an empty leading axis"))
            })?;
            raw.index_axis(Axis(0), last).to_owned()
        }
        3 => raw.to_owned(),
        n => {
            return Err(Error::ModelDataFormatError(format!(
                "Output '{name}' has {n} dimensions, expected 3 or 4"
            )))
        }
    };

    reduced
        .into_dimensionality::<Ix3>()
        .map_err(|e| Error::ModelDataFormatError(format!("Output '{name}' cannot be reshaped: {e}")))
}

/// Black-box neural inference engine
pub trait InferenceEngine {
    /// Fix the expected input shape; called once per run
    fn configure(&mut self, input_shape: [usize; 4]) -> Result<()>;

    /// Run the network on a normalized (1, 3, H, W) tensor
    fn run(&mut self, tensor: &Array4<f32>) -> Result<InferenceOutput>;
}

/// 3D pose network running on ONNX Runtime
pub struct OnnxEngine {
    session: Session,
    input_shape: Option<[usize; 4]>,
}

impl OnnxEngine {
    /// Load the pose network from an `ONNX` model file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The ONNX runtime environment cannot be created
    /// - The ONNX model file cannot be loaded
    /// - The model does not have one input and three outputs
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        info!("Initializing OnnxEngine with model: {}", model_path.as_ref().display());
        let environment = Arc::new(
            Environment::builder()
                .with_name("human_pose_3d")
                .with_log_level(ort::LoggingLevel::Warning)
                .build()?,
        );

        let session = ort::SessionBuilder::new(&environment)?
            .with_optimization_level(ort::GraphOptimizationLevel::Level3)?
            .with_model_from_file(model_path)?;

        if session.inputs.is_empty() {
            return Err(Error::ModelInputError("Model has no inputs".to_string()));
        }
        if session.outputs.len() < 3 {
            return Err(Error::ModelOutputError(format!(
                "Expected features, heatmaps and pafs outputs, model has {}",
                session.outputs.len()
            )));
        }
        let output_names: Vec<&str> = session.outputs.iter().map(|o| o.name.as_str()).collect();
        info!("Model outputs: {}", output_names.join(", "));

        Ok(Self {
            session,
            input_shape: None,
        })
    }

    /// Input shape set by [`InferenceEngine::configure`]
    #[must_use]
    pub fn input_shape(&self) -> Option<[usize; 4]> {
        self.input_shape
    }
}

impl InferenceEngine for OnnxEngine {
    fn configure(&mut self, input_shape: [usize; 4]) -> Result<()> {
        if let Some(existing) = self.input_shape {
            warn!("Input shape already configured as {:?}, keeping it", existing);
            return Ok(());
        }
        info!("Configuring network input shape {:?}", input_shape);
        self.input_shape = Some(input_shape);
        Ok(())
    }

    fn run(&mut self, tensor: &Array4<f32>) -> Result<InferenceOutput> {
        let shape = self
            .input_shape
            .ok_or_else(|| Error::ModelInputError("Input shape not configured".to_string()))?;
        if tensor.shape()[..3] != shape[..3] {
            return Err(Error::ModelInputError(format!(
                "Tensor shape {:?} does not match configured {:?}",
                tensor.shape(),
                shape
            )));
        }
        if tensor.shape()[3] != shape[3] {
            debug!(
                "Frame width {} differs from configured width {}",
                tensor.shape()[3],
                shape[3]
            );
        }

        let cow_array = CowArray::from(tensor.view().into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;

        let outputs = self.session.run(vec![input_tensor])?;

        let features = outputs[0].try_extract::<f32>()?;
        let heatmaps = outputs[1].try_extract::<f32>()?;
        let pafs = outputs[2].try_extract::<f32>()?;

        InferenceOutput::from_raw(features.view(), heatmaps.view(), pafs.view())
    }
}

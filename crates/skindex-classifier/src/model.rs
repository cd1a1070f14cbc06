//! 推理后端

use skindex_core::{Result, SkindexError};
use std::path::Path;
use tract_onnx::prelude::*;
use tracing::info;

use crate::preprocess::INPUT_SHAPE;

/// 推理后端：输入为 `[1, 224, 224, 3]` 行优先数据，输出每个标签的概率
pub trait InferenceBackend: Send + Sync {
    fn infer(&self, input: &[f32]) -> Result<Vec<f32>>;
}

fn tract_error(e: TractError) -> SkindexError {
    SkindexError::Classification(format!("{:#}", e))
}

/// 基于 tract 的 ONNX 模型
pub struct OnnxBackend {
    model: TypedRunnableModel<TypedModel>,
}

impl std::fmt::Debug for OnnxBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxBackend").finish_non_exhaustive()
    }
}

impl OnnxBackend {
    /// 加载预训练模型文件，输入形状固定为 NHWC float32
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SkindexError::Classification(format!(
                "Model file not found: {}",
                path.display()
            )));
        }

        let model = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|m| m.with_input_fact(0, f32::fact(INPUT_SHAPE).into()))
            .and_then(|m| m.into_optimized())
            .and_then(|m| m.into_runnable())
            .map_err(tract_error)?;

        info!("Loaded classification model from {}", path.display());
        Ok(Self { model })
    }
}

impl InferenceBackend for OnnxBackend {
    fn infer(&self, input: &[f32]) -> Result<Vec<f32>> {
        let tensor: Tensor = tract_ndarray::Array4::from_shape_vec(
            (INPUT_SHAPE[0], INPUT_SHAPE[1], INPUT_SHAPE[2], INPUT_SHAPE[3]),
            input.to_vec(),
        )
        .map_err(|e| SkindexError::Classification(format!("Invalid input tensor: {}", e)))?
        .into();

        let outputs = self.model.run(tvec!(tensor.into())).map_err(tract_error)?;
        let output = outputs
            .first()
            .ok_or_else(|| SkindexError::Classification("Model produced no output".to_string()))?;
        let view = output.to_array_view::<f32>().map_err(tract_error)?;

        Ok(view.iter().copied().collect())
    }
}

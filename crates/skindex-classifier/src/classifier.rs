//! 分类入口

use image::DynamicImage;
use serde::Serialize;
use skindex_core::{Result, SkindexError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::model::{InferenceBackend, OnnxBackend};
use crate::preprocess;
use crate::ranking::{self, Prediction};

/// 一次分类的完整结果，按概率降序
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    pub predictions: Vec<Prediction>,
}

impl Classification {
    pub fn top(&self) -> Option<&Prediction> {
        self.predictions.first()
    }

    pub fn top_k(&self, k: usize) -> &[Prediction] {
        ranking::top_k(&self.predictions, k)
    }

    pub fn report(&self) -> String {
        ranking::format_report(&self.predictions)
    }
}

/// 皮肤影像分类器
#[derive(Clone)]
pub struct Classifier {
    backend: Arc<dyn InferenceBackend>,
}

impl Classifier {
    pub fn new(backend: Arc<dyn InferenceBackend>) -> Self {
        Self { backend }
    }

    /// 从 ONNX 模型文件创建
    pub fn from_model_path(path: &Path) -> Result<Self> {
        Ok(Self::new(Arc::new(OnnxBackend::load(path)?)))
    }

    pub fn classify_image(&self, img: &DynamicImage) -> Result<Classification> {
        let input = preprocess::to_input_tensor(img);
        let scores = self.backend.infer(&input)?;
        let predictions = ranking::rank(&scores)?;

        if let Some(top) = predictions.first() {
            debug!("Top prediction: {}", top.to_report_line());
        }
        Ok(Classification { predictions })
    }

    pub fn classify_bytes(&self, bytes: &[u8]) -> Result<Classification> {
        self.classify_image(&preprocess::decode(bytes)?)
    }

    pub fn classify_path(&self, path: &Path) -> Result<Classification> {
        self.classify_image(&preprocess::open(path)?)
    }

    /// 在阻塞线程池中解码并推理
    pub async fn classify_file(&self, path: PathBuf) -> Result<Classification> {
        let classifier = self.clone();
        tokio::task::spawn_blocking(move || classifier.classify_path(&path))
            .await
            .map_err(|e| SkindexError::Internal(format!("Classification task failed: {}", e)))?
    }
}

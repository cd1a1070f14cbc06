//! # SkinDex皮肤影像分类
//!
//! 解码、缩放、归一化后调用预训练模型推理，并按概率对标签排序。

pub mod classifier;
pub mod labels;
pub mod model;
pub mod preprocess;
pub mod ranking;

pub use classifier::{Classification, Classifier};
pub use labels::{LABELS, LABEL_COUNT};
pub use model::{InferenceBackend, OnnxBackend};
pub use ranking::Prediction;

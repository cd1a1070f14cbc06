//! 影像预处理

use image::{imageops::FilterType, DynamicImage};
use skindex_core::{Result, SkindexError};
use std::path::Path;

/// 模型输入边长
pub const INPUT_SIZE: u32 = 224;

/// 输入张量形状 (N, H, W, C)
pub const INPUT_SHAPE: [usize; 4] = [1, INPUT_SIZE as usize, INPUT_SIZE as usize, 3];

pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes)
        .map_err(|e| SkindexError::Classification(format!("Failed to load image: {}", e)))
}

pub fn open(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|e| {
        SkindexError::Classification(format!("Failed to load image {}: {}", path.display(), e))
    })
}

/// 缩放到 224x224（双线性，不保持宽高比），输出按行优先排列的 RGB 浮点数据，取值 [0, 1]
pub fn to_input_tensor(img: &DynamicImage) -> Vec<f32> {
    let resized = img
        .resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::Triangle)
        .to_rgb8();

    resized
        .pixels()
        .flat_map(|p| p.0)
        .map(|channel| channel as f32 / 255.0)
        .collect()
}

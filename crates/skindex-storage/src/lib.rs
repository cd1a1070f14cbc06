//! # SkinDex存储模块
//!
//! 负责上传影像文件的保存、读取与删除。

pub mod storage;

pub use storage::*;

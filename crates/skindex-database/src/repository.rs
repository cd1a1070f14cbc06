//! 数据访问接口

use async_trait::async_trait;
use skindex_core::{Diagnosis, Image, LogEntry, QualityStatus, Result, User};

use crate::models::*;

/// 存储层抽象，PostgreSQL与内存实现共享同一语义
#[async_trait]
pub trait Repository: Send + Sync {
    // ========== 用户 ==========

    /// 创建用户，邮箱重复返回 `Conflict`
    async fn create_user(&self, user: &NewUser) -> Result<i32>;

    async fn get_user_by_id(&self, id: i32) -> Result<Option<User>>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn list_users(&self) -> Result<Vec<User>>;

    /// 列出患者；`doctor_id` 为 Some 时只返回该医生的患者
    async fn list_patients(&self, doctor_id: Option<i32>) -> Result<Vec<User>>;

    async fn update_user_name(&self, id: i32, name: &str) -> Result<bool>;

    /// 删除用户并级联删除其影像与诊断，返回被删除影像的文件路径；用户不存在时返回 None
    async fn delete_user(&self, id: i32) -> Result<Option<Vec<String>>>;

    async fn count_users(&self) -> Result<i64>;

    // ========== 影像 ==========

    async fn create_image(&self, image: &NewImage) -> Result<i32>;

    async fn get_image(&self, id: i32) -> Result<Option<Image>>;

    async fn list_images(&self, filter: &ImageFilter) -> Result<Vec<Image>>;

    async fn update_image_quality(
        &self,
        id: i32,
        status: QualityStatus,
        comment: Option<&str>,
    ) -> Result<bool>;

    /// 删除影像及其诊断
    async fn delete_image(&self, id: i32) -> Result<bool>;

    // ========== 诊断 ==========

    async fn create_diagnosis(&self, diagnosis: &NewDiagnosis) -> Result<i32>;

    async fn get_diagnosis(&self, id: i32) -> Result<Option<Diagnosis>>;

    async fn list_diagnoses(&self, filter: &DiagnosisFilter) -> Result<Vec<Diagnosis>>;

    async fn update_diagnosis(&self, id: i32, update: &DiagnosisUpdate) -> Result<bool>;

    async fn delete_diagnosis(&self, id: i32) -> Result<bool>;

    // ========== 日志 ==========

    async fn append_log(&self, entry: &NewLogEntry) -> Result<i32>;

    async fn list_logs(&self) -> Result<Vec<LogEntry>>;

    async fn get_log(&self, id: i32) -> Result<Option<LogEntry>>;
}

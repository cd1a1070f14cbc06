//! 数据库模型

use chrono::{DateTime, Utc};
use skindex_core::access::ImageScope;
use skindex_core::models::*;
use skindex_core::SkindexError;
use sqlx::FromRow;

// 数据库表模型 - 使用FromRow trait用于SQL查询

/// 数据库用户表
#[derive(Debug, FromRow)]
pub struct DbUser {
    pub id: i32,
    pub role: String, // 存储为字符串，转换为Role枚举
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub doctor_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbUser> for User {
    type Error = SkindexError;

    fn try_from(db_user: DbUser) -> Result<Self, Self::Error> {
        Ok(User {
            id: db_user.id,
            role: db_user.role.parse()?,
            name: db_user.name,
            email: db_user.email,
            password_hash: db_user.password_hash,
            doctor_id: db_user.doctor_id,
            created_at: db_user.created_at,
        })
    }
}

/// 数据库影像表
#[derive(Debug, FromRow)]
pub struct DbImage {
    pub id: i32,
    pub user_id: Option<i32>,
    pub patient_id: Option<i32>,
    pub file_path: String,
    pub upload_date: DateTime<Utc>,
    pub quality_status: String,
    pub quality_comment: Option<String>,
}

impl From<DbImage> for Image {
    fn from(db_image: DbImage) -> Self {
        Image {
            id: db_image.id,
            user_id: db_image.user_id,
            patient_id: db_image.patient_id,
            file_path: db_image.file_path,
            upload_date: db_image.upload_date,
            // 未知状态按待审核处理
            quality_status: db_image.quality_status.parse().unwrap_or(QualityStatus::Pending),
            quality_comment: db_image.quality_comment,
        }
    }
}

/// 数据库诊断表
#[derive(Debug, FromRow)]
pub struct DbDiagnosis {
    pub id: i32,
    pub image_id: i32,
    pub diagnosis: String,
    pub probability: f64,
    pub doctor_comment: Option<String>,
    pub date_added: DateTime<Utc>,
}

impl From<DbDiagnosis> for Diagnosis {
    fn from(db_diagnosis: DbDiagnosis) -> Self {
        Diagnosis {
            id: db_diagnosis.id,
            image_id: db_diagnosis.image_id,
            diagnosis: db_diagnosis.diagnosis,
            probability: db_diagnosis.probability,
            doctor_comment: db_diagnosis.doctor_comment,
            date_added: db_diagnosis.date_added,
        }
    }
}

/// 数据库日志表
#[derive(Debug, FromRow)]
pub struct DbLogEntry {
    pub id: i32,
    pub user_id: Option<i32>,
    pub action: String,
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<DbLogEntry> for LogEntry {
    fn from(db_log: DbLogEntry) -> Self {
        LogEntry {
            id: db_log.id,
            user_id: db_log.user_id,
            action: db_log.action,
            details: db_log.details,
            timestamp: db_log.timestamp,
        }
    }
}

// 插入模型 - 用于创建新记录

/// 新用户插入模型
#[derive(Debug, Clone)]
pub struct NewUser {
    pub role: Role,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub doctor_id: Option<i32>,
}

/// 新影像插入模型
#[derive(Debug, Clone)]
pub struct NewImage {
    pub user_id: Option<i32>,
    pub patient_id: Option<i32>,
    pub file_path: String,
}

/// 新诊断插入模型
#[derive(Debug, Clone)]
pub struct NewDiagnosis {
    pub image_id: i32,
    pub diagnosis: String,
    pub probability: f64,
    pub doctor_comment: Option<String>,
}

/// 诊断更新；`doctor_comment` 为 None 时保留原值
#[derive(Debug, Clone)]
pub struct DiagnosisUpdate {
    pub diagnosis: String,
    pub probability: f64,
    pub doctor_comment: Option<String>,
}

/// 新日志插入模型
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub user_id: Option<i32>,
    pub action: String,
    pub details: Option<String>,
}

impl NewLogEntry {
    pub fn new(user_id: i32, action: &str, details: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id),
            action: action.to_string(),
            details: Some(details.into()),
        }
    }
}

// 查询过滤条件

/// 影像列表过滤
#[derive(Debug, Clone, Copy)]
pub struct ImageFilter {
    pub scope: ImageScope,
    pub patient_id: Option<i32>,
}

/// 诊断列表过滤
#[derive(Debug, Clone, Copy)]
pub struct DiagnosisFilter {
    pub scope: ImageScope,
    pub image_id: Option<i32>,
}

/// 将可见范围拆成 SQL 参数：(kind, id)
pub(crate) fn scope_params(scope: ImageScope) -> (&'static str, Option<i32>) {
    match scope {
        ImageScope::All => ("all", None),
        ImageScope::Doctor(id) => ("doctor", Some(id)),
        ImageScope::Patient(id) => ("patient", Some(id)),
    }
}

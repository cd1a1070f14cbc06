//! 核心数据模型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SkindexError;

/// 用户角色
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// 管理员 - 完全访问权限
    Admin,
    /// 医生 - 管理自己的患者、影像和诊断
    Doctor,
    /// 患者 - 仅查看自己的数据
    Patient,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Doctor => "doctor",
            Role::Patient => "patient",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = SkindexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "doctor" => Ok(Role::Doctor),
            "patient" => Ok(Role::Patient),
            _ => Err(SkindexError::Validation(
                "Invalid role. Must be 'doctor', 'patient', or 'admin'".to_string(),
            )),
        }
    }
}

/// 影像质量审核状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum QualityStatus {
    Pending,  // 待审核
    Accepted, // 已接受
    Rejected, // 已拒绝
}

impl QualityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityStatus::Pending => "pending",
            QualityStatus::Accepted => "accepted",
            QualityStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for QualityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityStatus {
    type Err = SkindexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(QualityStatus::Pending),
            "accepted" => Ok(QualityStatus::Accepted),
            "rejected" => Ok(QualityStatus::Rejected),
            _ => Err(SkindexError::Validation(
                "Invalid quality status. Must be 'pending', 'accepted', or 'rejected'".to_string(),
            )),
        }
    }
}

/// 用户（医生、患者、管理员共用一张表）
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i32,
    pub role: Role,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub doctor_id: Option<i32>, // 仅患者使用：主治医生
    pub created_at: DateTime<Utc>,
}

/// 皮肤影像
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub id: i32,
    pub user_id: Option<i32>,    // 上传者
    pub patient_id: Option<i32>, // 所属患者
    pub file_path: String,
    pub upload_date: DateTime<Utc>,
    pub quality_status: QualityStatus,
    pub quality_comment: Option<String>,
}

/// 诊断记录
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnosis {
    pub id: i32,
    pub image_id: i32,
    pub diagnosis: String,
    pub probability: f64,
    pub doctor_comment: Option<String>,
    pub date_added: DateTime<Utc>,
}

/// 审计日志
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub id: i32,
    pub user_id: Option<i32>,
    pub action: String,
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// 已认证的请求发起者（来自JWT声明）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: i32,
    pub email: String,
    pub role: Role,
    pub name: String,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_doctor(&self) -> bool {
        self.role == Role::Doctor
    }
}

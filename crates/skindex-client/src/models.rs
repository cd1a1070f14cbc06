//! 与服务端交换的请求/响应结构

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skindex_core::{QualityStatus, Role};

use crate::error::{ClientError, Result};

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub name: &'a str,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct PatientRequest<'a> {
    pub email: &'a str,
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisRequest<'a> {
    pub image_id: i32,
    pub diagnosis: &'a str,
    pub probability: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_comment: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityUpdate<'a> {
    pub quality_status: QualityStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_comment: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub message: String,
}

/// `{"data": ...}` 包装
#[derive(Debug, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i32,
    pub email: String,
    pub role: Role,
    pub name: String,
    pub doctor_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub doctor_id: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: i32,
    pub file_path: String,
    pub quality_status: QualityStatus,
    pub quality_comment: Option<String>,
    pub user_id: Option<i32>,
    pub patient_id: Option<i32>,
    pub upload_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Diagnosis {
    pub id: i32,
    pub image_id: i32,
    pub diagnosis: String,
    pub probability: f64,
    pub doctor_comment: Option<String>,
    pub date_added: DateTime<Utc>,
}

/// 从 `"... created with ID: 12"` 形式的消息中取出新记录ID
pub fn id_from_message(message: &str) -> Result<i32> {
    message
        .rsplit_once(": ")
        .and_then(|(_, id)| id.trim().parse().ok())
        .ok_or_else(|| ClientError::UnexpectedResponse(format!("No ID in message '{}'", message)))
}

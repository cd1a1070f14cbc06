//! SkinDex REST API 客户端

use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use skindex_core::{QualityStatus, Role};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{ClientError, Result};
use crate::models::{
    id_from_message, DataEnvelope, Diagnosis, DiagnosisRequest, Image, LoginRequest, LoginResponse,
    MessageResponse, Patient, PatientRequest, QualityUpdate, RegisterRequest, User,
};

/// REST API 客户端，持有令牌时自动附带 `Authorization: Bearer`
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();
        debug!("{} {}", status.as_u16(), response.url());

        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| {
                if body.is_empty() {
                    status.canonical_reason().unwrap_or("Request failed").to_string()
                } else {
                    body
                }
            });
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_data<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let envelope: DataEnvelope<T> = self.send(self.request(Method::GET, path)).await?;
        Ok(envelope.data)
    }

    async fn send_json<B: Serialize>(&self, method: Method, path: &str, body: &B) -> Result<String> {
        let response: MessageResponse = self.send(self.request(method, path).json(body)).await?;
        Ok(response.message)
    }

    async fn delete(&self, path: &str) -> Result<String> {
        let response: MessageResponse = self.send(self.request(Method::DELETE, path)).await?;
        Ok(response.message)
    }

    /// 登录并保存返回的令牌
    pub async fn login(&mut self, email: &str, password: &str) -> Result<String> {
        let response: LoginResponse = self
            .send(
                self.request(Method::POST, "login")
                    .json(&LoginRequest { email, password }),
            )
            .await?;
        info!("{}", response.message);
        self.token = Some(response.token.clone());
        Ok(response.token)
    }

    /// 注册账号，返回新用户ID
    pub async fn register(&self, email: &str, password: &str, name: &str, role: Role) -> Result<i32> {
        let message = self
            .send_json(
                Method::POST,
                "register",
                &RegisterRequest {
                    email,
                    password,
                    name,
                    role,
                },
            )
            .await?;
        id_from_message(&message)
    }

    pub async fn get_user(&self, id: i32) -> Result<User> {
        self.get_data(&format!("users/{}", id)).await
    }

    pub async fn patients(&self) -> Result<Vec<Patient>> {
        self.get_data("patients").await
    }

    /// 添加患者，返回新患者ID
    pub async fn add_patient(&self, email: &str, name: &str) -> Result<i32> {
        let message = self
            .send_json(Method::POST, "add-patient", &PatientRequest { email, name })
            .await?;
        id_from_message(&message)
    }

    /// 上传影像文件
    pub async fn upload_image(&self, path: &Path, patient_id: Option<i32>) -> Result<i32> {
        let data = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        self.upload_image_bytes(&file_name, data, patient_id).await
    }

    /// 以 multipart 表单上传：`image` 文件字段 + 可选 `patientId`
    pub async fn upload_image_bytes(&self, file_name: &str, data: Vec<u8>, patient_id: Option<i32>) -> Result<i32> {
        let mime = mime_guess::from_path(file_name).first_or_octet_stream();
        let part = Part::bytes(data)
            .file_name(file_name.to_string())
            .mime_str(mime.as_ref())?;

        let mut form = Form::new().part("image", part);
        if let Some(patient_id) = patient_id {
            form = form.text("patientId", patient_id.to_string());
        }

        let response: MessageResponse = self
            .send(self.request(Method::POST, "upload-image").multipart(form))
            .await?;
        id_from_message(&response.message)
    }

    pub async fn update_image_quality(&self, image_id: i32, status: QualityStatus, comment: Option<&str>) -> Result<()> {
        self.send_json(
            Method::PUT,
            &format!("images/{}", image_id),
            &QualityUpdate {
                quality_status: status,
                quality_comment: comment,
            },
        )
        .await?;
        Ok(())
    }

    /// 提交诊断，返回诊断ID
    pub async fn post_diagnosis(
        &self,
        image_id: i32,
        diagnosis: &str,
        probability: f64,
        doctor_comment: Option<&str>,
    ) -> Result<i32> {
        let message = self
            .send_json(
                Method::POST,
                "diagnoses",
                &DiagnosisRequest {
                    image_id,
                    diagnosis,
                    probability,
                    doctor_comment,
                },
            )
            .await?;
        id_from_message(&message)
    }

    pub async fn images_by_patient(&self, patient_id: i32) -> Result<Vec<Image>> {
        self.get_data(&format!("images?patientId={}", patient_id)).await
    }

    pub async fn diagnoses_by_image(&self, image_id: i32) -> Result<Vec<Diagnosis>> {
        self.get_data(&format!("diagnoses?imageId={}", image_id)).await
    }

    pub async fn image(&self, id: i32) -> Result<Image> {
        self.get_data(&format!("images/{}", id)).await
    }

    pub async fn diagnosis(&self, id: i32) -> Result<Diagnosis> {
        self.get_data(&format!("diagnoses/{}", id)).await
    }

    pub async fn delete_user(&self, id: i32) -> Result<()> {
        self.delete(&format!("users/{}", id)).await.map(drop)
    }

    pub async fn delete_image(&self, id: i32) -> Result<()> {
        self.delete(&format!("images/{}", id)).await.map(drop)
    }

    pub async fn delete_diagnosis(&self, id: i32) -> Result<()> {
        self.delete(&format!("diagnoses/{}", id)).await.map(drop)
    }
}

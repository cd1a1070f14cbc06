//! 内存数据存储
//!
//! 与 PostgreSQL 实现保持相同的约束与级联语义，用于测试和本地开发模式。

use async_trait::async_trait;
use chrono::Utc;
use skindex_core::{Diagnosis, Image, LogEntry, QualityStatus, Result, SkindexError, User};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::*;
use crate::repository::Repository;

/// 各表独立的自增序列，与 SERIAL 列一致
#[derive(Debug, Default)]
struct Sequences {
    users: i32,
    images: i32,
    diagnoses: i32,
    logs: i32,
}

fn next_id(seq: &mut i32) -> i32 {
    *seq += 1;
    *seq
}

#[derive(Debug, Default)]
struct MemoryState {
    seq: Sequences,
    users: BTreeMap<i32, User>,
    images: BTreeMap<i32, Image>,
    diagnoses: BTreeMap<i32, Diagnosis>,
    logs: BTreeMap<i32, LogEntry>,
}

impl MemoryState {
    fn patient_doctor(&self, image: &Image) -> Option<i32> {
        image
            .patient_id
            .and_then(|pid| self.users.get(&pid))
            .and_then(|patient| patient.doctor_id)
    }

    fn remove_image(&mut self, id: i32) -> Option<Image> {
        let image = self.images.remove(&id)?;
        self.diagnoses.retain(|_, d| d.image_id != id);
        Some(image)
    }
}

/// 内存实现
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn create_user(&self, user: &NewUser) -> Result<i32> {
        let mut state = self.state.write().await;

        if state.users.values().any(|u| u.email == user.email) {
            return Err(SkindexError::Conflict("Email already registered".to_string()));
        }
        if let Some(doctor_id) = user.doctor_id {
            if !state.users.contains_key(&doctor_id) {
                return Err(SkindexError::validation("doctorId references a missing user"));
            }
        }

        let id = next_id(&mut state.seq.users);
        state.users.insert(
            id,
            User {
                id,
                role: user.role,
                name: user.name.clone(),
                email: user.email.clone(),
                password_hash: user.password_hash.clone(),
                doctor_id: user.doctor_id,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn get_user_by_id(&self, id: i32) -> Result<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.state.read().await.users.values().cloned().collect())
    }

    async fn list_patients(&self, doctor_id: Option<i32>) -> Result<Vec<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .filter(|u| u.role == skindex_core::Role::Patient)
            .filter(|u| doctor_id.is_none() || u.doctor_id == doctor_id)
            .cloned()
            .collect())
    }

    async fn update_user_name(&self, id: i32, name: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.users.get_mut(&id) {
            Some(user) => {
                user.name = name.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_user(&self, id: i32) -> Result<Option<Vec<String>>> {
        let mut state = self.state.write().await;
        if state.users.remove(&id).is_none() {
            return Ok(None);
        }

        let owned: Vec<i32> = state
            .images
            .values()
            .filter(|img| img.user_id == Some(id) || img.patient_id == Some(id))
            .map(|img| img.id)
            .collect();

        let mut file_paths = Vec::with_capacity(owned.len());
        for image_id in owned {
            if let Some(image) = state.remove_image(image_id) {
                file_paths.push(image.file_path);
            }
        }

        for user in state.users.values_mut() {
            if user.doctor_id == Some(id) {
                user.doctor_id = None;
            }
        }
        for log in state.logs.values_mut() {
            if log.user_id == Some(id) {
                log.user_id = None;
            }
        }

        Ok(Some(file_paths))
    }

    async fn count_users(&self) -> Result<i64> {
        Ok(self.state.read().await.users.len() as i64)
    }

    async fn create_image(&self, image: &NewImage) -> Result<i32> {
        let mut state = self.state.write().await;
        for referenced in [image.user_id, image.patient_id].into_iter().flatten() {
            if !state.users.contains_key(&referenced) {
                return Err(SkindexError::validation("Image references a missing user"));
            }
        }

        let id = next_id(&mut state.seq.images);
        state.images.insert(
            id,
            Image {
                id,
                user_id: image.user_id,
                patient_id: image.patient_id,
                file_path: image.file_path.clone(),
                upload_date: Utc::now(),
                quality_status: QualityStatus::Pending,
                quality_comment: None,
            },
        );
        Ok(id)
    }

    async fn get_image(&self, id: i32) -> Result<Option<Image>> {
        Ok(self.state.read().await.images.get(&id).cloned())
    }

    async fn list_images(&self, filter: &ImageFilter) -> Result<Vec<Image>> {
        let state = self.state.read().await;
        Ok(state
            .images
            .values()
            .filter(|img| filter.scope.contains(img, state.patient_doctor(img)))
            .filter(|img| filter.patient_id.is_none() || img.patient_id == filter.patient_id)
            .cloned()
            .collect())
    }

    async fn update_image_quality(
        &self,
        id: i32,
        status: QualityStatus,
        comment: Option<&str>,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.images.get_mut(&id) {
            Some(image) => {
                image.quality_status = status;
                if let Some(comment) = comment {
                    image.quality_comment = Some(comment.to_string());
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_image(&self, id: i32) -> Result<bool> {
        Ok(self.state.write().await.remove_image(id).is_some())
    }

    async fn create_diagnosis(&self, diagnosis: &NewDiagnosis) -> Result<i32> {
        let mut state = self.state.write().await;
        if !state.images.contains_key(&diagnosis.image_id) {
            return Err(SkindexError::validation("Diagnosis references a missing image"));
        }

        let id = next_id(&mut state.seq.diagnoses);
        state.diagnoses.insert(
            id,
            Diagnosis {
                id,
                image_id: diagnosis.image_id,
                diagnosis: diagnosis.diagnosis.clone(),
                probability: diagnosis.probability,
                doctor_comment: diagnosis.doctor_comment.clone(),
                date_added: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn get_diagnosis(&self, id: i32) -> Result<Option<Diagnosis>> {
        Ok(self.state.read().await.diagnoses.get(&id).cloned())
    }

    async fn list_diagnoses(&self, filter: &DiagnosisFilter) -> Result<Vec<Diagnosis>> {
        let state = self.state.read().await;
        Ok(state
            .diagnoses
            .values()
            .filter(|d| filter.image_id.is_none() || Some(d.image_id) == filter.image_id)
            .filter(|d| {
                state
                    .images
                    .get(&d.image_id)
                    .map(|img| filter.scope.contains(img, state.patient_doctor(img)))
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn update_diagnosis(&self, id: i32, update: &DiagnosisUpdate) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.diagnoses.get_mut(&id) {
            Some(diagnosis) => {
                diagnosis.diagnosis = update.diagnosis.clone();
                diagnosis.probability = update.probability;
                if let Some(comment) = &update.doctor_comment {
                    diagnosis.doctor_comment = Some(comment.clone());
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_diagnosis(&self, id: i32) -> Result<bool> {
        Ok(self.state.write().await.diagnoses.remove(&id).is_some())
    }

    async fn append_log(&self, entry: &NewLogEntry) -> Result<i32> {
        let mut state = self.state.write().await;
        let id = next_id(&mut state.seq.logs);
        state.logs.insert(
            id,
            LogEntry {
                id,
                user_id: entry.user_id,
                action: entry.action.clone(),
                details: entry.details.clone(),
                timestamp: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn list_logs(&self) -> Result<Vec<LogEntry>> {
        Ok(self.state.read().await.logs.values().cloned().collect())
    }

    async fn get_log(&self, id: i32) -> Result<Option<LogEntry>> {
        Ok(self.state.read().await.logs.get(&id).cloned())
    }
}

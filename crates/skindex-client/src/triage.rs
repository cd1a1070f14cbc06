//! 拍摄-分类-审核-上传的分诊流程

use skindex_classifier::{Classification, Classifier, Prediction};
use skindex_core::{QualityStatus, SkindexError};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::error::{ClientError, Result};
use crate::models::{Diagnosis, Image, User};

/// 已在本地分类、等待医生审核的影像
#[derive(Debug, Clone)]
pub struct Capture {
    pub path: PathBuf,
    pub classification: Classification,
}

impl Capture {
    pub fn top(&self) -> Option<&Prediction> {
        self.classification.top()
    }
}

/// 审核通过后服务端生成的记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApprovedUpload {
    pub image_id: i32,
    pub diagnosis_id: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageWithDiagnosis {
    pub image: Image,
    pub diagnosis: Option<Diagnosis>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatientOverview {
    pub patient: User,
    pub images: Vec<ImageWithDiagnosis>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosisDetail {
    pub diagnosis: Diagnosis,
    pub image: Image,
}

pub struct TriageWorkflow {
    api: ApiClient,
    classifier: Option<Classifier>,
}

impl TriageWorkflow {
    pub fn new(api: ApiClient) -> Self {
        Self { api, classifier: None }
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// 本地分类，尚未上传
    pub async fn capture(&self, path: PathBuf) -> Result<Capture> {
        let classifier = self
            .classifier
            .as_ref()
            .ok_or_else(|| SkindexError::Classification("No model loaded".to_string()))?;
        let classification = classifier.classify_file(path.clone()).await?;
        if let Some(top) = classification.top() {
            info!("Classified {}: {}", path.display(), top.to_report_line());
        }
        Ok(Capture { path, classification })
    }

    /// 上传影像，标记为已接受，再以最高概率的标签提交诊断
    pub async fn approve(&self, capture: &Capture, patient_id: Option<i32>) -> Result<ApprovedUpload> {
        let top = capture
            .top()
            .ok_or_else(|| ClientError::UnexpectedResponse("Classification has no predictions".to_string()))?;

        let image_id = self.api.upload_image(&capture.path, patient_id).await?;
        let diagnosis_id = match self.accept_and_diagnose(image_id, top).await {
            Ok(id) => id,
            Err(e) => {
                // 后续步骤失败时撤回已上传的影像
                warn!("Approval of image {} failed, removing upload: {}", image_id, e);
                if let Err(cleanup) = self.api.delete_image(image_id).await {
                    warn!("Failed to remove image {}: {}", image_id, cleanup);
                }
                return Err(e);
            }
        };

        info!("Approved image {} with diagnosis {} ({})", image_id, diagnosis_id, top.label);
        Ok(ApprovedUpload { image_id, diagnosis_id })
    }

    async fn accept_and_diagnose(&self, image_id: i32, top: &Prediction) -> Result<i32> {
        self.api
            .update_image_quality(image_id, QualityStatus::Accepted, None)
            .await?;
        self.api
            .post_diagnosis(image_id, top.label, f64::from(top.probability), None)
            .await
    }

    /// 拒绝：仅在本地丢弃，不与服务端交互
    pub fn reject(&self, capture: Capture) {
        info!("Discarded capture {}", capture.path.display());
    }

    /// 患者信息及其影像，每张影像附带第一条诊断
    pub async fn patient_overview(&self, patient_id: i32) -> Result<PatientOverview> {
        let patient = self.api.get_user(patient_id).await?;
        let images = self.api.images_by_patient(patient_id).await?;

        let mut entries = Vec::with_capacity(images.len());
        for image in images {
            let diagnosis = match self.api.diagnoses_by_image(image.id).await {
                Ok(diagnoses) => diagnoses.into_iter().next(),
                Err(e) => {
                    warn!("Failed to load diagnoses for image {}: {}", image.id, e);
                    None
                }
            };
            entries.push(ImageWithDiagnosis { image, diagnosis });
        }

        Ok(PatientOverview {
            patient,
            images: entries,
        })
    }

    pub async fn diagnosis_detail(&self, diagnosis_id: i32) -> Result<DiagnosisDetail> {
        let diagnosis = self.api.diagnosis(diagnosis_id).await?;
        let image = self.api.image(diagnosis.image_id).await?;
        Ok(DiagnosisDetail { diagnosis, image })
    }

    /// 先删除诊断，再删除影像
    pub async fn delete_diagnosis_and_image(&self, diagnosis_id: i32, image_id: i32) -> Result<()> {
        self.api.delete_diagnosis(diagnosis_id).await?;
        self.api.delete_image(image_id).await?;
        info!("Deleted diagnosis {} and image {}", diagnosis_id, image_id);
        Ok(())
    }
}

use image::{DynamicImage, Rgb, RgbImage};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use skindex_classifier::{Classifier, InferenceBackend, LABEL_COUNT};
use skindex_client::{ApiClient, TriageWorkflow};
use skindex_core::Result;
use std::sync::Arc;

/// 固定输出 "Psoriasis & Lichen" 为最高概率
struct PsoriasisBackend;

impl InferenceBackend for PsoriasisBackend {
    fn infer(&self, _input: &[f32]) -> Result<Vec<f32>> {
        let mut scores = vec![0.01; LABEL_COUNT];
        scores[7] = 0.83;
        Ok(scores)
    }
}

fn write_png(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("lesion.png");
    DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 32, Rgb([180, 90, 70])))
        .save_with_format(&path, image::ImageFormat::Png)
        .unwrap();
    path
}

fn json_mock(server: &mut ServerGuard, method: &str, path: &str, status: usize, body: serde_json::Value) -> mockito::Mock {
    server
        .mock(method, path)
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
}

fn image_json(id: i32) -> serde_json::Value {
    json!({
        "id": id,
        "filePath": format!("uploads/{}.png", id),
        "qualityStatus": "accepted",
        "qualityComment": null,
        "userId": 2,
        "patientId": 3,
        "uploadDate": "2024-03-01T10:00:00Z"
    })
}

fn diagnosis_json(id: i32, image_id: i32, label: &str) -> serde_json::Value {
    json!({
        "id": id, "imageId": image_id, "diagnosis": label, "probability": 0.83,
        "doctorComment": null, "dateAdded": "2024-03-01T10:05:00Z"
    })
}

#[tokio::test]
async fn approve_uploads_accepts_and_posts_top_prediction() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_png(&dir);
    let mut server = Server::new_async().await;

    let upload = json_mock(&mut server, "POST", "/upload-image", 201, json!({"message": "Image uploaded with ID: 14"}))
        .match_body(Matcher::Regex(r#"filename="lesion.png""#.to_string()))
        .create_async()
        .await;
    let accept = json_mock(&mut server, "PUT", "/images/14", 200, json!({"message": "Image updated"}))
        .match_body(Matcher::Json(json!({"qualityStatus": "accepted"})))
        .create_async()
        .await;
    let diagnose = json_mock(&mut server, "POST", "/diagnoses", 201, json!({"message": "Diagnosis created with ID: 30"}))
        .match_body(Matcher::PartialJson(json!({"imageId": 14, "diagnosis": "Psoriasis & Lichen"})))
        .create_async()
        .await;

    let workflow = TriageWorkflow::new(ApiClient::new(server.url()).with_token("t"))
        .with_classifier(Classifier::new(Arc::new(PsoriasisBackend)));

    let capture = workflow.capture(path).await.unwrap();
    assert_eq!(capture.top().unwrap().label, "Psoriasis & Lichen");

    let approved = workflow.approve(&capture, Some(3)).await.unwrap();
    assert_eq!(approved.image_id, 14);
    assert_eq!(approved.diagnosis_id, 30);

    upload.assert_async().await;
    accept.assert_async().await;
    diagnose.assert_async().await;
}

#[tokio::test]
async fn failed_approval_removes_upload() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_png(&dir);
    let mut server = Server::new_async().await;

    let _upload = json_mock(&mut server, "POST", "/upload-image", 201, json!({"message": "Image uploaded with ID: 14"}))
        .create_async()
        .await;
    let _accept = json_mock(&mut server, "PUT", "/images/14", 200, json!({"message": "Image updated"}))
        .create_async()
        .await;
    let diagnose = json_mock(&mut server, "POST", "/diagnoses", 403, json!({"error": "Access denied", "status": 403}))
        .create_async()
        .await;
    let cleanup = json_mock(&mut server, "DELETE", "/images/14", 200, json!({"message": "Image deleted"}))
        .expect(1)
        .create_async()
        .await;

    let workflow = TriageWorkflow::new(ApiClient::new(server.url()).with_token("t"))
        .with_classifier(Classifier::new(Arc::new(PsoriasisBackend)));
    let capture = workflow.capture(path).await.unwrap();

    let err = workflow.approve(&capture, Some(3)).await.unwrap_err();
    assert_eq!(err.status(), Some(403));
    diagnose.assert_async().await;
    cleanup.assert_async().await;
}

#[tokio::test]
async fn reject_never_contacts_server() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_png(&dir);
    let mut server = Server::new_async().await;
    let upload = server.mock("POST", "/upload-image").expect(0).create_async().await;

    let workflow = TriageWorkflow::new(ApiClient::new(server.url()).with_token("t"))
        .with_classifier(Classifier::new(Arc::new(PsoriasisBackend)));
    let capture = workflow.capture(path).await.unwrap();
    workflow.reject(capture);

    upload.assert_async().await;
}

#[tokio::test]
async fn capture_without_model_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_png(&dir);
    let workflow = TriageWorkflow::new(ApiClient::new("http://127.0.0.1:9"));
    assert!(workflow.capture(path).await.is_err());
}

#[tokio::test]
async fn overview_pairs_images_with_first_diagnosis() {
    let mut server = Server::new_async().await;
    let _m2 = json_mock(
        &mut server,
        "GET",
        "/users/3",
        200,
        json!({"data": {
            "id": 3, "email": "pat@mail.com", "role": "patient", "name": "Pat",
            "doctorId": 2, "createdAt": "2024-02-01T09:00:00Z"
        }}),
    )
    .create_async()
    .await;
    let _m3 = json_mock(
        &mut server,
        "GET",
        "/images",
        200,
        json!({"data": [image_json(5), image_json(6), image_json(7)]}),
    )
    .match_query(Matcher::UrlEncoded("patientId".to_string(), "3".to_string()))
    .create_async()
    .await;
    let _m4 = json_mock(
        &mut server,
        "GET",
        "/diagnoses",
        200,
        json!({"data": [diagnosis_json(1, 5, "Mole"), diagnosis_json(2, 5, "Eczema")]}),
    )
    .match_query(Matcher::UrlEncoded("imageId".to_string(), "5".to_string()))
    .create_async()
    .await;
    let _m5 = json_mock(&mut server, "GET", "/diagnoses", 200, json!({"data": []}))
        .match_query(Matcher::UrlEncoded("imageId".to_string(), "6".to_string()))
        .create_async()
        .await;
    let _m6 = json_mock(&mut server, "GET", "/diagnoses", 500, json!({"error": "Internal server error", "status": 500}))
        .match_query(Matcher::UrlEncoded("imageId".to_string(), "7".to_string()))
        .create_async()
        .await;

    let workflow = TriageWorkflow::new(ApiClient::new(server.url()).with_token("t"));
    let overview = workflow.patient_overview(3).await.unwrap();

    assert_eq!(overview.patient.name, "Pat");
    assert_eq!(overview.images.len(), 3);
    assert_eq!(overview.images[0].diagnosis.as_ref().unwrap().diagnosis, "Mole");
    assert!(overview.images[1].diagnosis.is_none());
    assert!(overview.images[2].diagnosis.is_none());
}

#[tokio::test]
async fn diagnosis_detail_and_delete() {
    let mut server = Server::new_async().await;
    let _m7 = json_mock(&mut server, "GET", "/diagnoses/30", 200, json!({"data": diagnosis_json(30, 14, "Mole")}))
        .create_async()
        .await;
    let _m8 = json_mock(&mut server, "GET", "/images/14", 200, json!({"data": image_json(14)}))
        .create_async()
        .await;
    let delete_diagnosis = json_mock(&mut server, "DELETE", "/diagnoses/30", 200, json!({"message": "Diagnosis deleted"}))
        .create_async()
        .await;
    let delete_image = json_mock(&mut server, "DELETE", "/images/14", 200, json!({"message": "Image deleted"}))
        .create_async()
        .await;

    let workflow = TriageWorkflow::new(ApiClient::new(server.url()).with_token("t"));
    let detail = workflow.diagnosis_detail(30).await.unwrap();
    assert_eq!(detail.image.id, 14);
    assert_eq!(detail.diagnosis.diagnosis, "Mole");

    workflow.delete_diagnosis_and_image(30, 14).await.unwrap();
    delete_diagnosis.assert_async().await;
    delete_image.assert_async().await;
}

#[tokio::test]
async fn failed_diagnosis_delete_keeps_image() {
    let mut server = Server::new_async().await;
    let _m9 = json_mock(&mut server, "DELETE", "/diagnoses/30", 403, json!({"error": "Access denied", "status": 403}))
        .create_async()
        .await;
    let delete_image = server.mock("DELETE", "/images/14").expect(0).create_async().await;

    let workflow = TriageWorkflow::new(ApiClient::new(server.url()).with_token("t"));
    let err = workflow.delete_diagnosis_and_image(30, 14).await.unwrap_err();
    assert_eq!(err.status(), Some(403));
    delete_image.assert_async().await;
}

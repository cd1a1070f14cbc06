//! SkinDex命令行客户端

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use skindex_classifier::Classifier;
use skindex_client::{token, ApiClient, TokenStore, TriageWorkflow};
use skindex_core::{QualityStatus, Role};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// SkinDex命令行参数
#[derive(Parser, Debug)]
#[command(name = "skindex")]
#[command(about = "SkinDex 皮肤影像分诊客户端")]
struct Args {
    /// 服务端地址
    #[arg(short, long, default_value = "http://localhost:8080")]
    server: String,

    /// 令牌文件
    #[arg(long, default_value = ".skindex/token")]
    token_file: PathBuf,

    /// 日志级别
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 登录并保存令牌
    Login { email: String, password: String },
    /// 注册账号
    Register {
        email: String,
        password: String,
        name: String,
        #[arg(long, default_value = "doctor")]
        role: Role,
    },
    /// 清除本地令牌
    Logout,
    /// 显示当前登录用户
    Whoami,
    /// 列出患者
    Patients,
    /// 添加患者
    AddPatient { email: String, name: String },
    /// 本地分类影像
    Classify {
        image: PathBuf,
        #[arg(short, long)]
        model: PathBuf,
        #[arg(short = 'k', long, default_value = "3")]
        top: usize,
    },
    /// 分类后上传、标记接受并提交最高概率诊断
    Triage {
        image: PathBuf,
        #[arg(short, long)]
        model: PathBuf,
        #[arg(short, long)]
        patient: Option<i32>,
    },
    /// 仅上传影像
    Upload {
        image: PathBuf,
        #[arg(short, long)]
        patient: Option<i32>,
    },
    /// 设置影像质量状态
    SetQuality {
        image_id: i32,
        status: QualityStatus,
        #[arg(long)]
        comment: Option<String>,
    },
    /// 提交诊断
    Diagnose {
        image_id: i32,
        diagnosis: String,
        #[arg(long, default_value = "1.0")]
        probability: f64,
        #[arg(long)]
        comment: Option<String>,
    },
    /// 患者影像及诊断概览
    Overview { patient_id: i32 },
    /// 诊断详情
    Diagnosis { diagnosis_id: i32 },
    /// 删除诊断及其影像
    DeleteDiagnosis { diagnosis_id: i32, image_id: i32 },
    /// 删除影像
    DeleteImage { image_id: i32 },
    /// 删除用户
    DeleteUser { user_id: i32 },
}

async fn authenticated(args: &Args, store: &TokenStore) -> anyhow::Result<ApiClient> {
    let token = store
        .load()
        .await?
        .context("Not logged in, run `skindex login` first")?;
    if token::decode_unverified(&token)?.is_expired() {
        bail!("Session expired, run `skindex login` again");
    }
    Ok(ApiClient::new(&args.server).with_token(token))
}

fn print_classification(classification: &skindex_classifier::Classification, top: usize) {
    for prediction in classification.top_k(top) {
        println!("{}", prediction.to_report_line());
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let store = TokenStore::new(&args.token_file);

    match &args.command {
        Command::Login { email, password } => {
            let mut api = ApiClient::new(&args.server);
            let token = api.login(email, password).await?;
            store.save(&token).await?;
            println!("Logged in as {}", email);
        }
        Command::Register {
            email,
            password,
            name,
            role,
        } => {
            let id = ApiClient::new(&args.server)
                .register(email, password, name, *role)
                .await?;
            println!("Registered user {}", id);
        }
        Command::Logout => {
            store.clear().await?;
            println!("Logged out");
        }
        Command::Whoami => {
            let token = store.load().await?.context("Not logged in")?;
            let info = token::decode_unverified(&token)?;
            println!("{} <{}> (id {})", info.name, info.email, info.user_id);
            if let Some(expires_at) = info.expires_at() {
                println!("expires {}", expires_at);
            }
        }
        Command::Patients => {
            for patient in authenticated(&args, &store).await?.patients().await? {
                println!("{}\t{}\t{}", patient.id, patient.name, patient.email);
            }
        }
        Command::AddPatient { email, name } => {
            let id = authenticated(&args, &store).await?.add_patient(email, name).await?;
            println!("Patient created with ID: {}", id);
        }
        Command::Classify { image, model, top } => {
            let classifier = Classifier::from_model_path(model)?;
            let classification = classifier.classify_file(image.clone()).await?;
            print_classification(&classification, *top);
        }
        Command::Triage { image, model, patient } => {
            let workflow = TriageWorkflow::new(authenticated(&args, &store).await?)
                .with_classifier(Classifier::from_model_path(model)?);
            let capture = workflow.capture(image.clone()).await?;
            print_classification(&capture.classification, 3);
            let approved = workflow.approve(&capture, *patient).await?;
            println!(
                "Image {} uploaded with diagnosis {}",
                approved.image_id, approved.diagnosis_id
            );
        }
        Command::Upload { image, patient } => {
            let id = authenticated(&args, &store)
                .await?
                .upload_image(image, *patient)
                .await?;
            println!("Image uploaded with ID: {}", id);
        }
        Command::SetQuality {
            image_id,
            status,
            comment,
        } => {
            authenticated(&args, &store)
                .await?
                .update_image_quality(*image_id, *status, comment.as_deref())
                .await?;
            println!("Image {} marked {}", image_id, status);
        }
        Command::Diagnose {
            image_id,
            diagnosis,
            probability,
            comment,
        } => {
            let id = authenticated(&args, &store)
                .await?
                .post_diagnosis(*image_id, diagnosis, *probability, comment.as_deref())
                .await?;
            println!("Diagnosis created with ID: {}", id);
        }
        Command::Overview { patient_id } => {
            let api = authenticated(&args, &store).await?;
            let workflow = TriageWorkflow::new(api);
            let overview = workflow.patient_overview(*patient_id).await?;
            println!("{} <{}>", overview.patient.name, overview.patient.email);
            for entry in overview.images {
                let diagnosis = entry
                    .diagnosis
                    .map(|d| format!("{} ({:.0}%)", d.diagnosis, d.probability * 100.0))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}\t{}\t{}\t{}",
                    entry.image.id, entry.image.quality_status, entry.image.upload_date, diagnosis
                );
            }
        }
        Command::Diagnosis { diagnosis_id } => {
            let api = authenticated(&args, &store).await?;
            let workflow = TriageWorkflow::new(api);
            let detail = workflow.diagnosis_detail(*diagnosis_id).await?;
            println!("{} ({:.2})", detail.diagnosis.diagnosis, detail.diagnosis.probability);
            if let Some(comment) = &detail.diagnosis.doctor_comment {
                println!("comment: {}", comment);
            }
            println!("image {} [{}] {}", detail.image.id, detail.image.quality_status, detail.image.file_path);
        }
        Command::DeleteDiagnosis {
            diagnosis_id,
            image_id,
        } => {
            let api = authenticated(&args, &store).await?;
            TriageWorkflow::new(api)
                .delete_diagnosis_and_image(*diagnosis_id, *image_id)
                .await?;
            println!("Deleted diagnosis {} and image {}", diagnosis_id, image_id);
        }
        Command::DeleteImage { image_id } => {
            authenticated(&args, &store).await?.delete_image(*image_id).await?;
            println!("Image {} deleted", image_id);
        }
        Command::DeleteUser { user_id } => {
            authenticated(&args, &store).await?.delete_user(*user_id).await?;
            println!("User {} deleted", user_id);
        }
    }

    info!("Command finished");
    Ok(())
}

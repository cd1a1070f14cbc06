//! 输入校验工具函数

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{Result, SkindexError};

/// 最短密码长度
pub const MIN_PASSWORD_LEN: usize = 6;

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9+_.-]+@[A-Za-z0-9.-]+$").expect("email pattern is valid")
    })
}

/// 验证邮箱格式
pub fn is_valid_email(email: &str) -> bool {
    email_pattern().is_match(email)
}

/// 邮箱统一为小写存储
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> Result<()> {
    if is_valid_email(email.trim()) {
        Ok(())
    } else {
        Err(SkindexError::Validation("Invalid email format".to_string()))
    }
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(SkindexError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(SkindexError::Validation("Name cannot be empty".to_string()));
    }
    Ok(())
}

/// 概率取值 [0, 1]，按两位小数存储
pub fn round_probability(probability: f64) -> Result<f64> {
    if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
        return Err(SkindexError::Validation(
            "Probability must be between 0 and 1".to_string(),
        ));
    }
    Ok((probability * 100.0).round() / 100.0)
}

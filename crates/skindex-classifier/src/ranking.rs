//! 概率排序与结果格式化

use serde::Serialize;
use skindex_core::{Result, SkindexError};

use crate::labels::{LABELS, LABEL_COUNT};

/// 单个标签的预测结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: &'static str,
    pub probability: f32,
}

impl Prediction {
    /// 百分比，保留两位小数，如 `Melanoma: 87.34%`
    pub fn to_report_line(&self) -> String {
        format!("{}: {:.2}%", self.label, self.probability * 100.0)
    }
}

// NaN 排在最后
fn sort_key(probability: f32) -> f32 {
    if probability.is_nan() {
        f32::NEG_INFINITY
    } else {
        probability
    }
}

/// 将模型输出与标签对应，按概率降序排列；概率相同时保持标签原顺序
pub fn rank(probabilities: &[f32]) -> Result<Vec<Prediction>> {
    if probabilities.len() != LABEL_COUNT {
        return Err(SkindexError::Classification(format!(
            "Model returned {} scores, expected {}",
            probabilities.len(),
            LABEL_COUNT
        )));
    }

    let mut predictions: Vec<Prediction> = LABELS
        .iter()
        .zip(probabilities)
        .map(|(label, &probability)| Prediction { label, probability })
        .collect();
    predictions.sort_by(|a, b| sort_key(b.probability).total_cmp(&sort_key(a.probability)));
    Ok(predictions)
}

pub fn top_k(ranked: &[Prediction], k: usize) -> &[Prediction] {
    &ranked[..k.min(ranked.len())]
}

pub fn format_report(ranked: &[Prediction]) -> String {
    ranked
        .iter()
        .map(Prediction::to_report_line)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores() -> Vec<f32> {
        let mut scores = vec![0.01; LABEL_COUNT];
        scores[2] = 0.8734;
        scores[5] = 0.05;
        scores
    }

    #[test]
    fn test_rank_orders_descending() {
        let ranked = rank(&scores()).unwrap();
        assert_eq!(ranked[0].label, "Melanoma");
        assert_eq!(ranked[1].label, "Mole");
        // 相同概率保持原顺序
        assert_eq!(ranked[2].label, "Eczema");
        assert_eq!(ranked[3].label, "Warts & Viral Infections");
        assert_eq!(ranked.len(), LABEL_COUNT);
    }

    #[test]
    fn test_rank_puts_nan_last() {
        let mut scores = scores();
        scores[0] = f32::NAN;
        scores[9] = f32::NAN;

        let ranked = rank(&scores).unwrap();
        assert_eq!(ranked[0].label, "Melanoma");
        assert_eq!(ranked[1].label, "Mole");
        assert_eq!(ranked[LABEL_COUNT - 2].label, "Eczema");
        assert_eq!(ranked[LABEL_COUNT - 1].label, "Tinea & Fungal Infections");
        let labels = |r: &[Prediction]| r.iter().map(|p| p.label).collect::<Vec<_>>();
        assert_eq!(labels(&rank(&scores).unwrap()), labels(&ranked));
    }

    #[test]
    fn test_rank_rejects_wrong_length() {
        assert!(rank(&[0.5, 0.5]).is_err());
    }

    #[test]
    fn test_report_format() {
        let ranked = rank(&scores()).unwrap();
        let report = format_report(top_k(&ranked, 2));
        assert_eq!(report, "Melanoma: 87.34%\nMole: 5.00%");
        assert_eq!(top_k(&ranked, 50).len(), LABEL_COUNT);
    }
}

//! 模型输出标签，顺序与模型输出向量一致

pub const LABEL_COUNT: usize = 11;

pub const LABELS: [&str; LABEL_COUNT] = [
    "Eczema",
    "Warts & Viral Infections",
    "Melanoma",
    "Atopic Dermatitis",
    "Basal Cell Carcinoma",
    "Mole",
    "Benign Keratosis",
    "Psoriasis & Lichen",
    "Seborrheic Keratosis",
    "Tinea & Fungal Infections",
    "Normal Skin",
];

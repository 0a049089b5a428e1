use serde::{Deserialize, Serialize};

use crate::partition::Split;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageEntry {
    pub file_name: String,
    pub stem: String,
    pub sha256: String,
    pub label_present: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitInventory {
    pub split: Split,
    pub image_count: usize,
    pub labeled_count: usize,
    pub images: Vec<ImageEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetInventoryManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub dataset_root: String,
    pub image_count: usize,
    pub splits: Vec<SplitInventory>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelOrigin {
    Existing,
    Placeholder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupImageEntry {
    pub stem: String,
    pub split: Split,
    pub source_path: String,
    pub file_name: String,
    pub class_id: u32,
    pub label: LabelOrigin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupCounts {
    pub image_count: usize,
    pub train: usize,
    pub val: usize,
    pub test: usize,
    pub placeholders_written: usize,
    pub existing_labels: usize,
    pub inferred_classes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub started_at: String,
    pub completed_at: String,
    pub source_directory: String,
    pub dataset_root: String,
    pub data_config_path: String,
    pub seed: Option<u64>,
    pub ratios: [f64; 3],
    pub placeholder_policy: String,
    pub default_class: u32,
    pub infer_class: bool,
    pub counts: SetupCounts,
    pub images: Vec<SetupImageEntry>,
}

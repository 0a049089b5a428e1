use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::labels::PlaceholderPolicy;

#[derive(Parser, Debug)]
#[command(
    name = "road-defects",
    version,
    about = "Road defect repair recommendations and detector dataset tooling"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Recommend(RecommendArgs),
    SetupDataset(SetupDatasetArgs),
    GenerateLabels(GenerateLabelsArgs),
    Inventory(InventoryArgs),
    WriteConfig(WriteConfigArgs),
    Train(TrainArgs),
    Status(StatusArgs),
    Check(CheckArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ClassArgs {
    #[arg(long)]
    pub classes_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct RecommendArgs {
    #[arg(long)]
    pub detections: PathBuf,

    #[arg(long, default_value = "repairs.json")]
    pub catalog_path: PathBuf,

    #[arg(long)]
    pub fallback_path: Option<PathBuf>,

    #[command(flatten)]
    pub classes: ClassArgs,

    #[arg(long, default_value_t = 0.01)]
    pub min_confidence: f64,

    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SplitRatioArgs {
    #[arg(long = "train", default_value_t = 0.7)]
    pub train_ratio: f64,

    #[arg(long = "val", default_value_t = 0.2)]
    pub val_ratio: f64,

    #[arg(long = "test", default_value_t = 0.1)]
    pub test_ratio: f64,
}

#[derive(Args, Debug, Clone)]
pub struct PlaceholderArgs {
    #[arg(long, value_enum)]
    pub policy: PlaceholderPolicy,

    #[arg(long, default_value_t = 0)]
    pub default_class: u32,
}

#[derive(Args, Debug, Clone)]
pub struct SetupDatasetArgs {
    #[arg(long)]
    pub source_dir: PathBuf,

    #[arg(long, default_value = "road_defects_dataset")]
    pub dataset_root: PathBuf,

    #[arg(long, default_value = "data/road_defects.yaml")]
    pub data_config_path: PathBuf,

    #[command(flatten)]
    pub ratios: SplitRatioArgs,

    #[arg(long)]
    pub seed: Option<u64>,

    #[command(flatten)]
    pub placeholder: PlaceholderArgs,

    #[arg(long, default_value_t = false)]
    pub infer_class: bool,

    #[command(flatten)]
    pub classes: ClassArgs,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct GenerateLabelsArgs {
    #[arg(long, default_value = "road_defects_dataset")]
    pub dataset_root: PathBuf,

    #[command(flatten)]
    pub placeholder: PlaceholderArgs,

    #[command(flatten)]
    pub classes: ClassArgs,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct InventoryArgs {
    #[arg(long, default_value = "road_defects_dataset")]
    pub dataset_root: PathBuf,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct WriteConfigArgs {
    #[arg(long, default_value = "road_defects_dataset")]
    pub dataset_root: PathBuf,

    #[arg(long, default_value = "data/road_defects.yaml")]
    pub data_config_path: PathBuf,

    #[command(flatten)]
    pub classes: ClassArgs,
}

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    #[arg(long, default_value = "road_defects_dataset")]
    pub dataset_root: PathBuf,

    #[arg(long, default_value = "data/road_defects.yaml")]
    pub data_config_path: PathBuf,

    #[command(flatten)]
    pub classes: ClassArgs,

    #[arg(long, default_value = "python")]
    pub python: String,

    #[arg(long, default_value = "yolov5/train.py")]
    pub script: PathBuf,

    #[arg(long, default_value_t = 640)]
    pub img: u32,

    #[arg(long, default_value_t = 16)]
    pub batch: u32,

    #[arg(long, default_value_t = 50)]
    pub epochs: u32,

    #[arg(long, default_value = "yolov5s.pt")]
    pub weights: String,

    #[arg(long, default_value = "road_defects_model")]
    pub name: String,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = "road_defects_dataset")]
    pub dataset_root: PathBuf,

    #[arg(long, default_value = "data/road_defects.yaml")]
    pub data_config_path: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    #[arg(long, default_value = "road_defects_dataset")]
    pub dataset_root: PathBuf,

    #[arg(long, default_value = "data/road_defects.yaml")]
    pub data_config_path: PathBuf,
}

use std::path::Path;

use anyhow::Result;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::dataset::DatasetLayout;
use crate::model::DatasetInventoryManifest;
use crate::partition::Split;
use crate::util::read_json;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitStatus {
    pub split: Split,
    pub images: usize,
    pub labels: usize,
    pub unlabeled: usize,
}

pub fn run(args: StatusArgs) -> Result<()> {
    let layout = DatasetLayout::new(&args.dataset_root);
    let inventory_path = layout.manifest_dir().join("dataset_inventory.json");

    info!(dataset_root = %layout.root().display(), "status requested");

    for split in Split::ALL {
        match split_status(&layout, split)? {
            Some(status) => info!(
                split = %split,
                images = status.images,
                labels = status.labels,
                unlabeled = status.unlabeled,
                "split status"
            ),
            None => warn!(
                split = %split,
                path = %layout.images_dir(split).display(),
                "image directory missing"
            ),
        }
    }

    if args.data_config_path.exists() {
        info!(path = %args.data_config_path.display(), "training data config present");
    } else {
        warn!(path = %args.data_config_path.display(), "training data config missing");
    }

    match load_inventory(&inventory_path)? {
        Some(inventory) => info!(
            generated_at = %inventory.generated_at,
            image_count = inventory.image_count,
            "loaded inventory manifest"
        ),
        None => warn!(path = %inventory_path.display(), "inventory manifest missing"),
    }

    Ok(())
}

pub fn split_status(layout: &DatasetLayout, split: Split) -> Result<Option<SplitStatus>> {
    if !layout.images_dir(split).is_dir() {
        return Ok(None);
    }

    let images = layout.image_stems(split)?;
    let labels = layout.label_stems(split)?;
    Ok(Some(SplitStatus {
        split,
        images: images.len(),
        labels: labels.len(),
        unlabeled: images.difference(&labels).count(),
    }))
}

pub fn load_inventory(path: &Path) -> Result<Option<DatasetInventoryManifest>> {
    if !path.exists() {
        return Ok(None);
    }
    read_json(path).map(Some)
}

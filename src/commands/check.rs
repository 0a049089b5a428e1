use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::cli::CheckArgs;
use crate::dataset::DatasetLayout;
use crate::labels::LabelRecord;
use crate::partition::Split;
use crate::training::{REQUIRED_CONFIG_KEYS, read_config_keys, read_config_names};

#[derive(Debug, Default)]
pub struct CheckReport {
    pub violations: Vec<String>,
    pub warnings: Vec<String>,
    pub images_checked: usize,
    pub labels_checked: usize,
}

pub fn run(args: CheckArgs) -> Result<()> {
    let layout = DatasetLayout::new(&args.dataset_root);
    let report = check_dataset(&layout, &args.data_config_path)?;

    for warning in &report.warnings {
        warn!(detail = %warning, "dataset check warning");
    }
    for violation in &report.violations {
        warn!(detail = %violation, "dataset check violation");
    }

    if !report.violations.is_empty() {
        bail!(
            "dataset check failed with {} violation(s)",
            report.violations.len()
        );
    }

    info!(
        images = report.images_checked,
        labels = report.labels_checked,
        warnings = report.warnings.len(),
        "dataset check passed"
    );
    Ok(())
}

pub fn check_dataset(layout: &DatasetLayout, data_config_path: &Path) -> Result<CheckReport> {
    let mut report = CheckReport::default();

    for dir in layout.directories() {
        if !dir.is_dir() {
            report
                .violations
                .push(format!("directory missing: {}", dir.display()));
        }
    }

    let class_count = check_data_config(data_config_path, &mut report)?;

    let mut image_splits: BTreeMap<String, Split> = BTreeMap::new();
    for split in Split::ALL {
        let images = layout.image_stems(split)?;
        let labels = layout.label_stems(split)?;
        report.images_checked += images.len();

        for stem in &images {
            if let Some(first) = image_splits.insert(stem.clone(), split) {
                report
                    .violations
                    .push(format!("image {stem} appears in both {first} and {split}"));
            }
        }

        if layout.images_dir(split).is_dir() && images.is_empty() {
            report.warnings.push(format!("split {split} has no images"));
        }

        for stem in images.difference(&labels) {
            report
                .violations
                .push(format!("image {split}/{stem} has no label file"));
        }
        for stem in labels.difference(&images) {
            report
                .warnings
                .push(format!("label {split}/{stem} has no matching image"));
        }

        for path in layout.label_paths(split)? {
            report.labels_checked += 1;
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            // Without a usable class count only the field layout is checked.
            let limit = class_count.unwrap_or(u32::MAX as usize);
            if let Err(err) = LabelRecord::parse_file(&contents, limit) {
                report
                    .violations
                    .push(format!("invalid label {}: {err}", path.display()));
            }
        }
    }

    Ok(report)
}

fn check_data_config(path: &Path, report: &mut CheckReport) -> Result<Option<usize>> {
    if !path.exists() {
        report
            .violations
            .push(format!("data config missing: {}", path.display()));
        return Ok(None);
    }

    let contents =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let keys = read_config_keys(&contents)?;

    for key in REQUIRED_CONFIG_KEYS {
        if !keys.contains_key(key) {
            report
                .violations
                .push(format!("data config {} lacks '{key}'", path.display()));
        }
    }

    let class_count = match keys.get("nc") {
        None => None,
        Some(raw) => match raw.parse::<usize>() {
            Ok(0) | Err(_) => {
                report
                    .violations
                    .push(format!("data config nc '{raw}' is not a positive integer"));
                None
            }
            Ok(count) => Some(count),
        },
    };

    match read_config_names(&contents) {
        Ok(Some(names)) => {
            if names.is_empty() {
                report
                    .violations
                    .push(format!("data config {} lists no class names", path.display()));
            } else if let Some(count) = class_count.filter(|count| *count != names.len()) {
                report.violations.push(format!(
                    "data config nc is {count} but {} class names are listed",
                    names.len()
                ));
            }
        }
        Ok(None) => {}
        Err(err) => report
            .violations
            .push(format!("data config {}: {err}", path.display())),
    }

    Ok(class_count)
}

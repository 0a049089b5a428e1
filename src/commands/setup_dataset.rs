use std::collections::{BTreeMap, BTreeSet};
use std::fs;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{info, warn};

use crate::catalog::ClassList;
use crate::cli::SetupDatasetArgs;
use crate::dataset::{DatasetLayout, discover_source_images};
use crate::labels::{ClassMatcher, ensure_label};
use crate::model::{LabelOrigin, SetupCounts, SetupImageEntry, SetupRunManifest};
use crate::partition::{Split, SplitRatios, partition};
use crate::training::write_data_config;
use crate::util::{now_utc_string, utc_compact_string, write_json_pretty};

pub fn run(args: SetupDatasetArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("setup-{}", utc_compact_string(started_ts));

    let ratios = SplitRatios::new(
        args.ratios.train_ratio,
        args.ratios.val_ratio,
        args.ratios.test_ratio,
    )?;
    let classes = ClassList::load(args.classes.classes_path.as_deref())?;
    let default_class = args.placeholder.default_class;
    if default_class as usize >= classes.len() {
        bail!(
            "default class {default_class} is out of range for {} classes",
            classes.len()
        );
    }
    let matcher = if args.infer_class {
        Some(ClassMatcher::new(&classes).context("failed to build class matcher")?)
    } else {
        None
    };

    let layout = DatasetLayout::new(&args.dataset_root);
    info!(
        source = %args.source_dir.display(),
        dataset_root = %layout.root().display(),
        run_id = %run_id,
        "starting dataset setup"
    );

    let sources = discover_source_images(&args.source_dir)?;
    if sources.is_empty() {
        warn!(source = %args.source_dir.display(), "no source images found");
    }

    let stems: BTreeSet<String> = sources.keys().cloned().collect();
    let assignment = partition(&stems, ratios, args.seed);
    let (train, val, test) = assignment.sizes();
    info!(images = stems.len(), train, val, test, "partitioned images");

    let labeled_in = existing_label_splits(&layout)?;

    if args.dry_run {
        for (split, stem) in assignment.iter() {
            let label = if labeled_in.contains_key(stem) {
                "existing"
            } else {
                "placeholder"
            };
            info!(stem = %stem, split = %split, label, "planned image");
        }
        info!("dataset setup dry-run complete");
        return Ok(());
    }

    layout.create_structure()?;

    let mut existing: BTreeSet<String> = labeled_in.keys().cloned().collect();
    let mut images = Vec::with_capacity(stems.len());
    let mut placeholders_written = 0;
    let mut inferred_classes = 0;

    let placed = layout.image_index()?;

    for (split, stem) in assignment.iter() {
        let source = &sources[stem];
        let target = layout.image_target(split, &source.file_name);
        for stale in placed
            .get(stem)
            .into_iter()
            .flatten()
            .filter(|path| **path != target)
        {
            fs::remove_file(stale)
                .with_context(|| format!("failed to remove {}", stale.display()))?;
            info!(stem = %stem, path = %stale.display(), "removed image copy from earlier run");
        }
        layout.copy_image(&source.path, split, &source.file_name)?;

        let inferred = matcher.as_ref().and_then(|matcher| matcher.infer(stem));
        if inferred.is_some() {
            inferred_classes += 1;
        } else if matcher.is_some() {
            warn!(stem = %stem, default_class, "could not infer class; using default");
        }
        let class_id = inferred.unwrap_or(default_class);

        let label = match ensure_label(stem, &mut existing, class_id, args.placeholder.policy) {
            Some(record) => {
                let path = layout.write_label(split, stem, &[record])?;
                info!(path = %path.display(), "wrote placeholder label");
                placeholders_written += 1;
                LabelOrigin::Placeholder
            }
            None => {
                if let Some(current) = labeled_in.get(stem).copied() {
                    relocate_label(&layout, stem, current, split)?;
                }
                LabelOrigin::Existing
            }
        };

        images.push(SetupImageEntry {
            stem: stem.to_string(),
            split,
            source_path: source.path.display().to_string(),
            file_name: source.file_name.clone(),
            class_id,
            label,
        });
    }

    write_data_config(&args.data_config_path, &layout, &classes)?;
    info!(path = %args.data_config_path.display(), "wrote training data config");

    let manifest = SetupRunManifest {
        manifest_version: 1,
        run_id,
        started_at,
        completed_at: now_utc_string(),
        source_directory: args.source_dir.display().to_string(),
        dataset_root: layout.root().display().to_string(),
        data_config_path: args.data_config_path.display().to_string(),
        seed: args.seed,
        ratios: [ratios.train(), ratios.val(), ratios.test()],
        placeholder_policy: args.placeholder.policy.as_str().to_string(),
        default_class,
        infer_class: args.infer_class,
        counts: SetupCounts {
            image_count: assignment.len(),
            train,
            val,
            test,
            placeholders_written,
            existing_labels: images.len() - placeholders_written,
            inferred_classes,
        },
        images,
    };

    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        layout
            .manifest_dir()
            .join(format!("setup_run_{}.json", utc_compact_string(started_ts)))
    });
    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote setup manifest");
    info!(
        placeholders = placeholders_written,
        existing = manifest.counts.existing_labels,
        "dataset setup completed"
    );

    Ok(())
}

fn existing_label_splits(layout: &DatasetLayout) -> Result<BTreeMap<String, Split>> {
    let mut labeled = BTreeMap::new();
    for split in Split::ALL {
        for stem in layout.label_stems(split)? {
            if let Some(previous) = labeled.insert(stem.clone(), split) {
                bail!("label '{stem}' exists in both {previous} and {split}");
            }
        }
    }
    Ok(labeled)
}

fn relocate_label(layout: &DatasetLayout, stem: &str, from: Split, to: Split) -> Result<()> {
    if from == to {
        return Ok(());
    }

    let source = layout.label_path(from, stem);
    let target = layout.label_path(to, stem);
    fs::rename(&source, &target).with_context(|| {
        format!(
            "failed to move {} to {}",
            source.display(),
            target.display()
        )
    })?;
    info!(stem = %stem, from = %from, to = %to, "moved existing label");
    Ok(())
}

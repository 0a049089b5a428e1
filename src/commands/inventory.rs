use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cli::InventoryArgs;
use crate::dataset::DatasetLayout;
use crate::model::{DatasetInventoryManifest, ImageEntry, SplitInventory};
use crate::partition::Split;
use crate::util::{file_stem_string, now_utc_string, sha256_file, write_json_pretty};

pub fn run(args: InventoryArgs) -> Result<()> {
    let layout = DatasetLayout::new(&args.dataset_root);
    let manifest = build_manifest(&layout)?;

    if args.dry_run {
        info!(
            image_count = manifest.image_count,
            dataset_root = %manifest.dataset_root,
            "inventory dry-run complete"
        );
        return Ok(());
    }

    let manifest_path = args
        .manifest_path
        .unwrap_or_else(|| layout.manifest_dir().join("dataset_inventory.json"));

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote inventory manifest");
    info!(image_count = manifest.image_count, "inventory completed");

    Ok(())
}

pub fn build_manifest(layout: &DatasetLayout) -> Result<DatasetInventoryManifest> {
    if !layout.root().is_dir() {
        bail!("dataset root not found: {}", layout.root().display());
    }

    let mut splits = Vec::with_capacity(Split::ALL.len());
    for split in Split::ALL {
        let labels = layout.label_stems(split)?;
        let mut images = Vec::new();

        for path in layout.image_paths(split)? {
            let file_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(ToOwned::to_owned)
                .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))?;
            let stem = file_stem_string(&path)?;
            let sha256 = sha256_file(&path)?;

            images.push(ImageEntry {
                file_name,
                label_present: labels.contains(&stem),
                stem,
                sha256,
            });
        }

        splits.push(SplitInventory {
            split,
            image_count: images.len(),
            labeled_count: images.iter().filter(|image| image.label_present).count(),
            images,
        });
    }

    Ok(DatasetInventoryManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        dataset_root: layout.root().display().to_string(),
        image_count: splits.iter().map(|split| split.image_count).sum(),
        splits,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn manifest_hashes_images_and_tracks_labels() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = DatasetLayout::new(dir.path());
        layout.create_structure().expect("structure");
        fs::write(layout.images_dir(Split::Train).join("a.jpg"), b"abc").expect("write");
        fs::write(layout.images_dir(Split::Val).join("b.png"), b"def").expect("write");
        fs::write(layout.label_path(Split::Train, "a"), "0 0.5 0.5 0.1 0.1\n").expect("write");

        let manifest = build_manifest(&layout).expect("manifest");
        assert_eq!(manifest.image_count, 2);

        let train = &manifest.splits[0];
        assert_eq!(train.split, Split::Train);
        assert_eq!(train.labeled_count, 1);
        assert_eq!(
            train.images[0].sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );

        let val = &manifest.splits[1];
        assert_eq!(val.image_count, 1);
        assert!(!val.images[0].label_present);
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = DatasetLayout::new(dir.path().join("absent"));
        assert!(build_manifest(&layout).is_err());
    }
}

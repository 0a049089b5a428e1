use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::catalog::ClassList;
use crate::cli::GenerateLabelsArgs;
use crate::dataset::DatasetLayout;
use crate::labels::{ensure_label, missing_labels};
use crate::partition::Split;

pub fn run(args: GenerateLabelsArgs) -> Result<()> {
    let classes = ClassList::load(args.classes.classes_path.as_deref())?;
    let default_class = args.placeholder.default_class;
    if default_class as usize >= classes.len() {
        bail!(
            "default class {default_class} is out of range for {} classes",
            classes.len()
        );
    }

    let layout = DatasetLayout::new(&args.dataset_root);
    let mut total_written = 0;

    for split in Split::ALL {
        let images_dir = layout.images_dir(split);
        if !images_dir.is_dir() {
            warn!(path = %images_dir.display(), "image directory missing; skipping split");
            continue;
        }

        let images = layout.image_stems(split)?;
        let mut existing = layout.label_stems(split)?;
        let missing = missing_labels(&images, &existing);
        info!(split = %split, images = images.len(), missing = missing.len(), "scanned split");

        for stem in &missing {
            let Some(record) =
                ensure_label(stem, &mut existing, default_class, args.placeholder.policy)
            else {
                continue;
            };

            if args.dry_run {
                info!(split = %split, stem = %stem, label = %record, "would write placeholder label");
                continue;
            }

            let path = layout.write_label(split, stem, &[record])?;
            info!(path = %path.display(), "wrote placeholder label");
            total_written += 1;
        }
    }

    info!(
        written = total_written,
        policy = args.placeholder.policy.as_str(),
        dry_run = args.dry_run,
        "placeholder label generation completed"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::cli::{ClassArgs, PlaceholderArgs};
    use crate::labels::PlaceholderPolicy;

    fn args(root: &std::path::Path, dry_run: bool) -> GenerateLabelsArgs {
        GenerateLabelsArgs {
            dataset_root: root.to_path_buf(),
            placeholder: PlaceholderArgs {
                policy: PlaceholderPolicy::Centered,
                default_class: 0,
            },
            classes: ClassArgs { classes_path: None },
            dry_run,
        }
    }

    #[test]
    fn writes_only_missing_labels() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = DatasetLayout::new(dir.path());
        layout.create_structure().expect("structure");

        fs::write(layout.images_dir(Split::Train).join("img1.jpg"), b"x").expect("write");
        fs::write(layout.images_dir(Split::Train).join("img2.png"), b"x").expect("write");
        fs::write(layout.images_dir(Split::Val).join("img3.jpeg"), b"x").expect("write");
        fs::write(layout.label_path(Split::Train, "img1"), "4 0.3 0.3 0.2 0.2\n").expect("write");

        run(args(dir.path(), false)).expect("generate");

        assert_eq!(
            fs::read_to_string(layout.label_path(Split::Train, "img1")).expect("read"),
            "4 0.3 0.3 0.2 0.2\n"
        );
        assert_eq!(
            fs::read_to_string(layout.label_path(Split::Train, "img2")).expect("read"),
            "0 0.5 0.5 0.1 0.1\n"
        );
        assert!(layout.label_path(Split::Val, "img3").exists());
    }

    #[test]
    fn second_run_changes_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = DatasetLayout::new(dir.path());
        layout.create_structure().expect("structure");
        fs::write(layout.images_dir(Split::Test).join("img1.jpg"), b"x").expect("write");

        run(args(dir.path(), false)).expect("first");
        let label_path = layout.label_path(Split::Test, "img1");
        fs::write(&label_path, "2 0.4 0.4 0.3 0.3\n").expect("annotate");

        run(args(dir.path(), false)).expect("second");
        assert_eq!(
            fs::read_to_string(&label_path).expect("read"),
            "2 0.4 0.4 0.3 0.3\n"
        );
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = DatasetLayout::new(dir.path());
        layout.create_structure().expect("structure");
        fs::write(layout.images_dir(Split::Train).join("img1.jpg"), b"x").expect("write");

        run(args(dir.path(), true)).expect("dry run");
        assert!(!layout.label_path(Split::Train, "img1").exists());
    }
}

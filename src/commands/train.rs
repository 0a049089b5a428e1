use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::catalog::ClassList;
use crate::cli::{TrainArgs, WriteConfigArgs};
use crate::dataset::DatasetLayout;
use crate::partition::Split;
use crate::training::{TrainingInvocation, write_data_config};

pub fn write_config(args: WriteConfigArgs) -> Result<()> {
    let classes = ClassList::load(args.classes.classes_path.as_deref())?;
    let layout = DatasetLayout::new(&args.dataset_root);

    write_data_config(&args.data_config_path, &layout, &classes)?;
    info!(
        path = %args.data_config_path.display(),
        classes = classes.len(),
        "wrote training data config"
    );
    Ok(())
}

pub fn run(args: TrainArgs) -> Result<()> {
    let classes = ClassList::load(args.classes.classes_path.as_deref())?;
    let layout = DatasetLayout::new(&args.dataset_root);

    let train_images = layout.image_paths(Split::Train)?.len();
    let val_images = layout.image_paths(Split::Val)?.len();
    if train_images == 0 && !args.dry_run {
        bail!(
            "no training images in {}",
            layout.images_dir(Split::Train).display()
        );
    }
    if val_images == 0 {
        warn!(path = %layout.images_dir(Split::Val).display(), "validation split is empty");
    }

    let invocation = TrainingInvocation {
        python: args.python,
        script: args.script,
        data_config: args.data_config_path,
        image_size: args.img,
        batch_size: args.batch,
        epochs: args.epochs,
        weights: args.weights,
        run_name: args.name,
    };

    if args.dry_run {
        info!(command = %invocation.command_line(), "training dry-run complete");
        return Ok(());
    }

    write_data_config(&invocation.data_config, &layout, &classes)?;
    info!(path = %invocation.data_config.display(), "wrote training data config");

    info!(
        command = %invocation.command_line(),
        train_images,
        val_images,
        "starting external training"
    );
    invocation.run()?;
    info!(run_name = %invocation.run_name, "training completed");

    Ok(())
}

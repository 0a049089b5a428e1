use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::labels::LabelRecord;
use crate::partition::Split;
use crate::util::{ensure_directory, file_stem_string, is_image_path, list_files, write_text};

#[derive(Debug, Clone)]
pub struct DatasetLayout {
    root: PathBuf,
}

impl DatasetLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn images_dir(&self, split: Split) -> PathBuf {
        self.root.join("images").join(split.as_str())
    }

    pub fn labels_dir(&self, split: Split) -> PathBuf {
        self.root.join("labels").join(split.as_str())
    }

    pub fn label_path(&self, split: Split, stem: &str) -> PathBuf {
        self.labels_dir(split).join(format!("{stem}.txt"))
    }

    pub fn manifest_dir(&self) -> PathBuf {
        self.root.join("manifests")
    }

    pub fn directories(&self) -> Vec<PathBuf> {
        Split::ALL
            .into_iter()
            .flat_map(|split| [self.images_dir(split), self.labels_dir(split)])
            .collect()
    }

    pub fn create_structure(&self) -> Result<()> {
        for dir in self.directories() {
            ensure_directory(&dir)?;
        }
        Ok(())
    }

    pub fn image_paths(&self, split: Split) -> Result<Vec<PathBuf>> {
        list_files(&self.images_dir(split), is_image_path)
    }

    pub fn label_paths(&self, split: Split) -> Result<Vec<PathBuf>> {
        list_files(&self.labels_dir(split), is_label_path)
    }

    pub fn image_stems(&self, split: Split) -> Result<BTreeSet<String>> {
        self.image_paths(split)?
            .iter()
            .map(|path| file_stem_string(path))
            .collect()
    }

    pub fn label_stems(&self, split: Split) -> Result<BTreeSet<String>> {
        self.label_paths(split)?
            .iter()
            .map(|path| file_stem_string(path))
            .collect()
    }

    pub fn image_index(&self) -> Result<BTreeMap<String, Vec<PathBuf>>> {
        let mut index: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        for split in Split::ALL {
            for path in self.image_paths(split)? {
                index.entry(file_stem_string(&path)?).or_default().push(path);
            }
        }
        Ok(index)
    }

    pub fn write_label(&self, split: Split, stem: &str, records: &[LabelRecord]) -> Result<PathBuf> {
        let path = self.label_path(split, stem);
        let body = records
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");
        write_text(&path, body.as_bytes())?;
        Ok(path)
    }

    pub fn image_target(&self, split: Split, file_name: &str) -> PathBuf {
        self.images_dir(split).join(file_name)
    }

    pub fn copy_image(&self, source: &Path, split: Split, file_name: &str) -> Result<PathBuf> {
        let target = self.image_target(split, file_name);
        fs::copy(source, &target).with_context(|| {
            format!(
                "failed to copy {} to {}",
                source.display(),
                target.display()
            )
        })?;
        Ok(target)
    }
}

pub fn is_label_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("txt"))
        .unwrap_or(false)
}

pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch == ' ' || ch == '-' { '_' } else { ch })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub path: PathBuf,
    pub file_name: String,
}

pub fn discover_source_images(dir: &Path) -> Result<BTreeMap<String, SourceImage>> {
    if !dir.is_dir() {
        bail!("source image directory not found: {}", dir.display());
    }

    let mut images: BTreeMap<String, SourceImage> = BTreeMap::new();
    for path in list_files(dir, is_image_path)? {
        let raw_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))?;
        let file_name = sanitize_file_name(raw_name);
        let stem = file_stem_string(Path::new(&file_name))?;

        if let Some(previous) = images.get(&stem) {
            bail!(
                "images {} and {} share the stem '{stem}'",
                previous.path.display(),
                path.display()
            );
        }

        images.insert(stem, SourceImage { path, file_name });
    }

    Ok(images)
}

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use regex::Regex;

use crate::catalog::ClassList;
use crate::dataset::DatasetLayout;
use crate::partition::Split;
use crate::util::write_text;

pub const REQUIRED_CONFIG_KEYS: [&str; 4] = ["train", "val", "nc", "names"];

pub fn render_data_config(layout: &DatasetLayout, classes: &ClassList) -> Result<String> {
    let names = classes
        .names()
        .iter()
        .map(|name| serde_json::to_string(name).context("failed to quote class name"))
        .collect::<Result<Vec<_>>>()?;

    let mut out = String::from("# Road defects dataset configuration\n");
    for split in Split::ALL {
        let dir = layout.images_dir(split);
        out.push_str(&format!(
            "{}: {}\n",
            split.as_str(),
            serde_json::to_string(&dir.display().to_string())
                .context("failed to quote dataset path")?
        ));
    }
    out.push_str(&format!("\n# Number of classes\nnc: {}\n", classes.len()));
    out.push_str(&format!("\n# Class names\nnames: [{}]\n", names.join(", ")));

    Ok(out)
}

pub fn write_data_config(path: &Path, layout: &DatasetLayout, classes: &ClassList) -> Result<()> {
    let rendered = render_data_config(layout, classes)?;
    write_text(path, rendered.as_bytes())
}

pub fn read_config_keys(contents: &str) -> Result<BTreeMap<String, String>> {
    let pattern = Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*:\s*(.*)$")
        .context("failed to compile config key regex")?;

    let mut keys = BTreeMap::new();
    for line in contents.lines() {
        if line.trim_start().starts_with('#') {
            continue;
        }
        if let Some(captures) = pattern.captures(line) {
            let key = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
            let value = captures.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
            keys.insert(key.to_string(), value.to_string());
        }
    }

    Ok(keys)
}

/// Class names declared under the top-level `names` key, in flow (`[a, b]`,
/// possibly spanning lines), block (`- a`) or index-mapping (`0: a`) form.
pub fn read_config_names(contents: &str) -> Result<Option<Vec<String>>> {
    let key_pattern =
        Regex::new(r"^names\s*:\s*(.*)$").context("failed to compile names key regex")?;
    let item_pattern = Regex::new(r"^\s+(?:-|\d+\s*:)\s*(.+?)\s*$")
        .context("failed to compile names item regex")?;

    let mut lines = contents.lines();
    let first = loop {
        let Some(line) = lines.next() else {
            return Ok(None);
        };
        if let Some(captures) = key_pattern.captures(line) {
            break captures
                .get(1)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
        }
    };

    if first.starts_with('[') {
        let mut flow = first;
        while !flow.contains(']') {
            let Some(line) = lines.next() else {
                bail!("unterminated names list in data config");
            };
            flow.push_str(line.trim());
        }
        let flow = flow
            .split_once(']')
            .map(|(list, _)| format!("{list}]"))
            .unwrap_or(flow);

        if let Ok(names) = serde_json::from_str::<Vec<String>>(&flow) {
            return Ok(Some(names));
        }
        let names = flow
            .trim_start_matches('[')
            .trim_end_matches(']')
            .split(',')
            .map(unquote)
            .filter(|name| !name.is_empty())
            .collect();
        return Ok(Some(names));
    }

    if !first.is_empty() && !first.starts_with('#') {
        bail!("names in data config must be a list, got '{first}'");
    }

    let mut names = Vec::new();
    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match item_pattern.captures(line) {
            Some(captures) => {
                names.push(unquote(captures.get(1).map(|m| m.as_str()).unwrap_or_default()));
            }
            None => break,
        }
    }
    Ok(Some(names))
}

fn unquote(raw: &str) -> String {
    let raw = raw.trim();
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        return serde_json::from_str(raw).unwrap_or_else(|_| raw[1..raw.len() - 1].to_string());
    }
    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        return raw[1..raw.len() - 1].replace("''", "'");
    }
    raw.to_string()
}

#[derive(Debug, Clone)]
pub struct TrainingInvocation {
    pub python: String,
    pub script: PathBuf,
    pub data_config: PathBuf,
    pub image_size: u32,
    pub batch_size: u32,
    pub epochs: u32,
    pub weights: String,
    pub run_name: String,
}

impl TrainingInvocation {
    pub fn args(&self) -> Vec<String> {
        vec![
            self.script.display().to_string(),
            "--img".to_string(),
            self.image_size.to_string(),
            "--batch".to_string(),
            self.batch_size.to_string(),
            "--epochs".to_string(),
            self.epochs.to_string(),
            "--data".to_string(),
            self.data_config.display().to_string(),
            "--weights".to_string(),
            self.weights.clone(),
            "--name".to_string(),
            self.run_name.clone(),
        ]
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.python.clone())
            .chain(self.args())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn run(&self) -> Result<()> {
        if !self.script.exists() {
            bail!("training script not found: {}", self.script.display());
        }

        let status = Command::new(&self.python)
            .args(self.args())
            .status()
            .with_context(|| format!("failed to launch {}", self.command_line()))?;

        if !status.success() {
            bail!("training command failed with {status}: {}", self.command_line());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation() -> TrainingInvocation {
        TrainingInvocation {
            python: "python".to_string(),
            script: PathBuf::from("yolov5/train.py"),
            data_config: PathBuf::from("data/road_defects.yaml"),
            image_size: 640,
            batch_size: 16,
            epochs: 50,
            weights: "yolov5s.pt".to_string(),
            run_name: "road_defects_model".to_string(),
        }
    }

    #[test]
    fn data_config_lists_paths_count_and_names() {
        let layout = DatasetLayout::new("road_defects_dataset");
        let classes =
            ClassList::from_names(vec!["Potholes".to_string(), "تشققات الحواف".to_string()])
                .unwrap();

        let rendered = render_data_config(&layout, &classes).expect("render");
        assert!(rendered.contains("train: \"road_defects_dataset/images/train\"\n"));
        assert!(rendered.contains("val: \"road_defects_dataset/images/val\"\n"));
        assert!(rendered.contains("test: \"road_defects_dataset/images/test\"\n"));
        assert!(rendered.contains("nc: 2\n"));
        assert!(rendered.contains("names: [\"Potholes\", \"تشققات الحواف\"]\n"));
    }

    #[test]
    fn rendered_config_has_required_keys() {
        let layout = DatasetLayout::new("ds");
        let classes = ClassList::builtin().unwrap();
        let keys = read_config_keys(&render_data_config(&layout, &classes).unwrap()).unwrap();

        for key in REQUIRED_CONFIG_KEYS {
            assert!(keys.contains_key(key), "missing {key}");
        }
        assert_eq!(keys["nc"], "14");
    }

    #[test]
    fn config_keys_skip_comments_and_nested_lines() {
        let raw = "# nc: 3\ntrain: a\nnames: [\n    'pothole',\n]\nnc: 14\n";
        let keys = read_config_keys(raw).unwrap();
        assert_eq!(keys.len(), 3);
        assert_eq!(keys["nc"], "14");
        assert_eq!(keys["names"], "[");
    }

    #[test]
    fn rendered_names_read_back_in_class_order() {
        let layout = DatasetLayout::new("ds");
        let classes = ClassList::builtin().unwrap();
        let names = read_config_names(&render_data_config(&layout, &classes).unwrap())
            .unwrap()
            .expect("names");
        assert_eq!(names, classes.names());
    }

    #[test]
    fn names_accept_multiline_block_and_mapping_forms() {
        let multiline = "nc: 2\nnames: [\n    'pothole',\n    \"rutting\",\n]\n";
        assert_eq!(
            read_config_names(multiline).unwrap(),
            Some(vec!["pothole".to_string(), "rutting".to_string()])
        );

        let block = "names:\n  - pothole\n  # skipped\n  - 'edge crack'\nnc: 2\n";
        assert_eq!(
            read_config_names(block).unwrap(),
            Some(vec!["pothole".to_string(), "edge crack".to_string()])
        );

        let mapping = "names:\n  0: pothole\n  1: rutting\n  2: raveling\n";
        assert_eq!(read_config_names(mapping).unwrap().map(|n| n.len()), Some(3));

        assert_eq!(read_config_names("nc: 2\n").unwrap(), None);
        assert!(read_config_names("names: pothole\n").is_err());
    }

    #[test]
    fn invocation_matches_trainer_flags() {
        assert_eq!(
            invocation().command_line(),
            "python yolov5/train.py --img 640 --batch 16 --epochs 50 \
             --data data/road_defects.yaml --weights yolov5s.pt --name road_defects_model"
        );
    }

    #[test]
    fn missing_script_fails_before_launch() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut invocation = invocation();
        invocation.script = dir.path().join("train.py");

        let err = invocation.run().unwrap_err();
        assert!(err.to_string().contains("training script not found"));
    }
}

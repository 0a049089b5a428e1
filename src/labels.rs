use std::collections::BTreeSet;
use std::fmt;

use clap::ValueEnum;
use regex::Regex;
use thiserror::Error;

use crate::catalog::ClassList;

#[derive(Debug, Error, PartialEq)]
pub enum LabelError {
    #[error("label line must have 5 fields, found {0}")]
    FieldCount(usize),
    #[error("invalid class id '{0}'")]
    ClassId(String),
    #[error("class id {class_id} is out of range for {class_count} classes")]
    ClassOutOfRange { class_id: u32, class_count: usize },
    #[error("invalid box coordinate '{0}'")]
    Coordinate(String),
    #[error("box coordinate {value} is outside [0, 1]")]
    CoordinateOutOfRange { value: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedBox {
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedBox {
    pub fn new(x_center: f64, y_center: f64, width: f64, height: f64) -> Result<Self, LabelError> {
        for value in [x_center, y_center, width, height] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(LabelError::CoordinateOutOfRange { value });
            }
        }
        Ok(Self {
            x_center,
            y_center,
            width,
            height,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlaceholderPolicy {
    Centered,
    FullFrame,
}

impl PlaceholderPolicy {
    pub fn placeholder_box(self) -> NormalizedBox {
        let size = match self {
            Self::Centered => 0.1,
            Self::FullFrame => 0.8,
        };
        NormalizedBox {
            x_center: 0.5,
            y_center: 0.5,
            width: size,
            height: size,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Centered => "centered",
            Self::FullFrame => "full-frame",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelRecord {
    pub class_id: u32,
    pub bbox: NormalizedBox,
}

impl LabelRecord {
    pub fn placeholder(class_id: u32, policy: PlaceholderPolicy) -> Self {
        Self {
            class_id,
            bbox: policy.placeholder_box(),
        }
    }

    pub fn parse_line(line: &str, class_count: usize) -> Result<Self, LabelError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(LabelError::FieldCount(fields.len()));
        }

        let class_id = fields[0]
            .parse::<u32>()
            .map_err(|_| LabelError::ClassId(fields[0].to_string()))?;
        if class_id as usize >= class_count {
            return Err(LabelError::ClassOutOfRange {
                class_id,
                class_count,
            });
        }

        let mut coords = [0.0_f64; 4];
        for (slot, raw) in coords.iter_mut().zip(&fields[1..]) {
            *slot = raw
                .parse::<f64>()
                .map_err(|_| LabelError::Coordinate(raw.to_string()))?;
        }
        let [x_center, y_center, width, height] = coords;

        Ok(Self {
            class_id,
            bbox: NormalizedBox::new(x_center, y_center, width, height)?,
        })
    }

    pub fn parse_file(contents: &str, class_count: usize) -> Result<Vec<Self>, LabelError> {
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| Self::parse_line(line, class_count))
            .collect()
    }
}

impl fmt::Display for LabelRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.class_id, self.bbox.x_center, self.bbox.y_center, self.bbox.width, self.bbox.height
        )
    }
}

pub fn missing_labels(images: &BTreeSet<String>, existing: &BTreeSet<String>) -> BTreeSet<String> {
    images.difference(existing).cloned().collect()
}

/// Returns a placeholder for `image` unless it is already labeled. The image
/// is recorded in `existing`, so repeated calls never replace a label.
pub fn ensure_label(
    image: &str,
    existing: &mut BTreeSet<String>,
    default_class: u32,
    policy: PlaceholderPolicy,
) -> Option<LabelRecord> {
    if existing.contains(image) {
        return None;
    }
    existing.insert(image.to_string());
    Some(LabelRecord::placeholder(default_class, policy))
}

pub struct ClassMatcher {
    separators: Regex,
    normalized_names: Vec<(u32, String)>,
}

impl ClassMatcher {
    pub fn new(classes: &ClassList) -> Result<Self, regex::Error> {
        let separators = Regex::new(r"[\s_\-]+")?;
        let normalized_names = classes
            .names()
            .iter()
            .enumerate()
            .map(|(idx, name)| (idx as u32, normalize_with(&separators, name)))
            .collect();

        Ok(Self {
            separators,
            normalized_names,
        })
    }

    pub fn infer(&self, stem: &str) -> Option<u32> {
        let stem = normalize_with(&self.separators, stem);
        self.normalized_names
            .iter()
            .filter(|(_, name)| !name.is_empty() && stem.contains(name.as_str()))
            .max_by_key(|(class_id, name)| (name.len(), std::cmp::Reverse(*class_id)))
            .map(|(class_id, _)| *class_id)
    }
}

fn normalize_with(separators: &Regex, value: &str) -> String {
    separators
        .replace_all(&value.to_lowercase(), " ")
        .trim()
        .to_string()
}

use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalog::{ClassList, DefectCatalog, FallbackCatalog};
use crate::cli::RecommendArgs;
use crate::resolver::{Detection, PixelBox, ResolutionSource, ResolvedRecommendation, resolve};
use crate::util::read_json;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DetectionInput {
    Labeled {
        label: String,
        confidence: f64,
        #[serde(rename = "box")]
        bbox: [f64; 4],
    },
    Raw([f64; 6]),
}

impl DetectionInput {
    pub fn into_detection(self, classes: &ClassList) -> Result<Detection> {
        let (label, confidence, bbox) = match self {
            Self::Labeled {
                label,
                confidence,
                bbox,
            } => (label, confidence, bbox),
            Self::Raw([x1, y1, x2, y2, confidence, class_index]) => {
                if !class_index.is_finite() || class_index < 0.0 || class_index.fract() != 0.0 {
                    bail!("invalid class index {class_index} in detector row");
                }
                let label = classes
                    .name(class_index as u32)
                    .with_context(|| {
                        format!(
                            "class index {class_index} is out of range for {} classes",
                            classes.len()
                        )
                    })?
                    .to_string();
                (label, confidence, [x1, y1, x2, y2])
            }
        };

        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            bail!("detection '{label}' has confidence {confidence} outside [0, 1]");
        }
        if bbox.iter().any(|value| !value.is_finite()) {
            bail!("detection '{label}' has a non-finite box coordinate");
        }

        Ok(Detection {
            label,
            confidence,
            bbox: PixelBox::from(bbox),
        })
    }
}

pub fn parse_detections(inputs: Vec<DetectionInput>, classes: &ClassList) -> Result<Vec<Detection>> {
    inputs
        .into_iter()
        .enumerate()
        .map(|(idx, input)| {
            input
                .into_detection(classes)
                .with_context(|| format!("invalid detection at index {idx}"))
        })
        .collect()
}

pub fn apply_confidence_floor(detections: Vec<Detection>, min_confidence: f64) -> Vec<Detection> {
    detections
        .into_iter()
        .filter(|detection| detection.confidence >= min_confidence)
        .collect()
}

#[derive(Debug, Serialize)]
struct RecommendResponse<'a> {
    detections_read: usize,
    detections_kept: usize,
    min_confidence: f64,
    seed: Option<u64>,
    results: &'a [ResolvedRecommendation],
}

pub fn run(args: RecommendArgs) -> Result<()> {
    let catalog = DefectCatalog::load_or_empty(&args.catalog_path)?;
    if catalog.is_empty() {
        warn!(path = %args.catalog_path.display(), "recommendation catalog missing; every detection resolves without a recommendation");
    } else {
        info!(path = %args.catalog_path.display(), entries = catalog.len(), "loaded recommendation catalog");
    }

    let fallback = FallbackCatalog::load(args.fallback_path.as_deref())?;
    let classes = ClassList::load(args.classes.classes_path.as_deref())?;

    let inputs: Vec<DetectionInput> = read_json(&args.detections)?;
    let read_count = inputs.len();
    let detections = parse_detections(inputs, &classes)?;
    let detections = apply_confidence_floor(detections, args.min_confidence);

    info!(
        path = %args.detections.display(),
        read = read_count,
        kept = detections.len(),
        min_confidence = args.min_confidence,
        "loaded detections"
    );

    let results = resolve(&detections, &catalog, &fallback, args.seed);

    if args.json {
        write_json_response(&RecommendResponse {
            detections_read: read_count,
            detections_kept: detections.len(),
            min_confidence: args.min_confidence,
            seed: args.seed,
            results: &results,
        })
    } else {
        write_text_response(&results)
    }
}

fn write_json_response(response: &RecommendResponse<'_>) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, response)
        .context("failed to serialize recommendation json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

fn write_text_response(results: &[ResolvedRecommendation]) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    for result in results {
        match result.source {
            ResolutionSource::Detection => {
                writeln!(output, "Defect: {}", result.defect)?;
                if let Some(confidence) = result.confidence {
                    writeln!(output, "Confidence: {:.1}%", confidence * 100.0)?;
                }
            }
            ResolutionSource::Fallback => {
                writeln!(output, "No defect detected. Possible defect: {}", result.defect)?;
            }
        }
        writeln!(output, "Recommendation: {}", result.recommendation_text())?;
        writeln!(output, "---")?;
    }

    output.flush()?;
    Ok(())
}

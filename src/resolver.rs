use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::catalog::{DefectCatalog, FallbackCatalog};

pub const NO_RECOMMENDATION: &str = "no recommendation available";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl From<[f64; 4]> for PixelBox {
    fn from([x1, y1, x2, y2]: [f64; 4]) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: String,
    pub confidence: f64,
    pub bbox: PixelBox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    Detection,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedRecommendation {
    pub defect: String,
    pub confidence: Option<f64>,
    pub recommendation: Option<String>,
    pub source: ResolutionSource,
}

impl ResolvedRecommendation {
    pub fn recommendation_text(&self) -> &str {
        self.recommendation.as_deref().unwrap_or(NO_RECOMMENDATION)
    }
}

pub fn resolve(
    detections: &[Detection],
    catalog: &DefectCatalog,
    fallback: &FallbackCatalog,
    rng_seed: Option<u64>,
) -> Vec<ResolvedRecommendation> {
    let mut rng = match rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    resolve_with_rng(detections, catalog, fallback, &mut rng)
}

pub fn resolve_with_rng<R: Rng + ?Sized>(
    detections: &[Detection],
    catalog: &DefectCatalog,
    fallback: &FallbackCatalog,
    rng: &mut R,
) -> Vec<ResolvedRecommendation> {
    if detections.is_empty() {
        return pick_fallback(fallback, rng).into_iter().collect();
    }

    detections
        .iter()
        .map(|detection| ResolvedRecommendation {
            defect: detection.label.clone(),
            confidence: Some(detection.confidence),
            recommendation: catalog.get(&detection.label).map(ToOwned::to_owned),
            source: ResolutionSource::Detection,
        })
        .collect()
}

// FallbackCatalog is non-empty by construction, so this only yields None if
// that invariant is broken.
fn pick_fallback<R: Rng + ?Sized>(
    fallback: &FallbackCatalog,
    rng: &mut R,
) -> Option<ResolvedRecommendation> {
    fallback
        .entries()
        .choose(rng)
        .map(|entry| ResolvedRecommendation {
            defect: entry.defect.clone(),
            confidence: None,
            recommendation: Some(entry.recommendation.clone()),
            source: ResolutionSource::Fallback,
        })
}

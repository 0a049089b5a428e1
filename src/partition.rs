use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const RATIO_SUM_TOLERANCE: f64 = 1e-6;
// Keeps float error in the cumulative ratio (0.7 + 0.2 < 0.9) from
// dropping an image at the boundary.
const FLOOR_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Val, Split::Test];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Val => "val",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum PartitionError {
    #[error("split ratio {name}={value} must be a finite value in [0, 1]")]
    RatioOutOfRange { name: &'static str, value: f64 },
    #[error("split ratios must sum to 1.0, got {0}")]
    RatioSum(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitRatios {
    train: f64,
    val: f64,
    test: f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            train: 0.7,
            val: 0.2,
            test: 0.1,
        }
    }
}

impl SplitRatios {
    pub fn new(train: f64, val: f64, test: f64) -> Result<Self, PartitionError> {
        for (name, value) in [("train", train), ("val", val), ("test", test)] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(PartitionError::RatioOutOfRange { name, value });
            }
        }

        let sum = train + val + test;
        if (sum - 1.0).abs() > RATIO_SUM_TOLERANCE {
            return Err(PartitionError::RatioSum(sum));
        }

        Ok(Self { train, val, test })
    }

    pub fn train(&self) -> f64 {
        self.train
    }

    pub fn val(&self) -> f64 {
        self.val
    }

    pub fn test(&self) -> f64 {
        self.test
    }

    /// Split sizes for `n` items; the test split absorbs the rounding
    /// remainder so the three counts always sum to `n`.
    pub fn counts(&self, n: usize) -> (usize, usize, usize) {
        let total = n as f64;
        let train_count = floor_count(self.train * total).min(n);
        let through_val = floor_count((self.train + self.val) * total).clamp(train_count, n);
        let val_count = through_val - train_count;
        (train_count, val_count, n - through_val)
    }
}

fn floor_count(value: f64) -> usize {
    (value + FLOOR_EPSILON).floor().max(0.0) as usize
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitAssignment {
    splits: BTreeMap<Split, BTreeSet<String>>,
}

impl SplitAssignment {
    pub fn members(&self, split: Split) -> &BTreeSet<String> {
        static EMPTY: BTreeSet<String> = BTreeSet::new();
        self.splits.get(&split).unwrap_or(&EMPTY)
    }

    pub fn sizes(&self) -> (usize, usize, usize) {
        (
            self.members(Split::Train).len(),
            self.members(Split::Val).len(),
            self.members(Split::Test).len(),
        )
    }

    pub fn len(&self) -> usize {
        self.splits.values().map(BTreeSet::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Split, &str)> {
        Split::ALL.into_iter().flat_map(move |split| {
            self.members(split)
                .iter()
                .map(move |image| (split, image.as_str()))
        })
    }
}

pub fn partition(
    images: &BTreeSet<String>,
    ratios: SplitRatios,
    rng_seed: Option<u64>,
) -> SplitAssignment {
    let mut rng = match rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    // BTreeSet iteration is sorted, so the shuffle alone decides the order.
    let mut ordered: Vec<&String> = images.iter().collect();
    ordered.shuffle(&mut rng);

    let (train_count, val_count, _) = ratios.counts(ordered.len());
    let mut splits = BTreeMap::new();

    for (idx, image) in ordered.into_iter().enumerate() {
        let split = if idx < train_count {
            Split::Train
        } else if idx < train_count + val_count {
            Split::Val
        } else {
            Split::Test
        };
        splits
            .entry(split)
            .or_insert_with(BTreeSet::new)
            .insert(image.clone());
    }

    SplitAssignment { splits }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn images(n: usize) -> BTreeSet<String> {
        (1..=n).map(|idx| format!("img{idx}")).collect()
    }

    fn assert_is_partition(input: &BTreeSet<String>, assignment: &SplitAssignment) {
        let mut union = BTreeSet::new();
        for split in Split::ALL {
            for image in assignment.members(split) {
                assert!(union.insert(image.clone()), "{image} assigned twice");
            }
        }
        assert_eq!(&union, input);
        assert_eq!(assignment.len(), input.len());
    }

    #[test]
    fn ten_images_split_seven_two_one() {
        let input = images(10);
        let assignment = partition(&input, SplitRatios::default(), Some(42));

        assert_eq!(assignment.sizes(), (7, 2, 1));
        assert_is_partition(&input, &assignment);
    }

    #[test]
    fn fixed_seed_gives_same_membership() {
        let input = images(10);
        let first = partition(&input, SplitRatios::default(), Some(42));
        let second = partition(&input, SplitRatios::default(), Some(42));
        assert_eq!(first, second);
    }

    #[test]
    fn counts_always_sum_to_n() {
        let ratio_sets = [
            SplitRatios::default(),
            SplitRatios::new(0.8, 0.1, 0.1).unwrap(),
            SplitRatios::new(1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0).unwrap(),
            SplitRatios::new(0.0, 0.0, 1.0).unwrap(),
            SplitRatios::new(1.0, 0.0, 0.0).unwrap(),
        ];

        for ratios in ratio_sets {
            for n in 0..60 {
                let (train, val, test) = ratios.counts(n);
                assert_eq!(train + val + test, n, "ratios {ratios:?} n={n}");

                let input = images(n);
                let assignment = partition(&input, ratios, Some(n as u64));
                assert_is_partition(&input, &assignment);
                assert_eq!(assignment.sizes(), (train, val, test));
            }
        }
    }

    #[test]
    fn remainder_goes_to_test() {
        assert_eq!(SplitRatios::default().counts(14), (9, 3, 2));
        assert_eq!(SplitRatios::default().counts(1), (0, 0, 1));
        assert_eq!(SplitRatios::default().counts(2), (1, 0, 1));
    }

    #[test]
    fn empty_input_gives_empty_splits() {
        let assignment = partition(&BTreeSet::new(), SplitRatios::default(), None);
        assert_eq!(assignment.sizes(), (0, 0, 0));
        assert_eq!(assignment.iter().count(), 0);
    }

    #[test]
    fn iter_visits_each_image_once_in_split_order() {
        let input = images(10);
        let assignment = partition(&input, SplitRatios::default(), Some(3));
        let visited: Vec<(Split, &str)> = assignment.iter().collect();

        assert_eq!(visited.len(), 10);
        assert!(visited.windows(2).all(|pair| pair[0].0 <= pair[1].0));
    }

    #[test]
    fn invalid_ratios_are_rejected() {
        assert_eq!(
            SplitRatios::new(0.7, 0.2, 0.2),
            Err(PartitionError::RatioSum(0.7 + 0.2 + 0.2))
        );
        assert!(matches!(
            SplitRatios::new(1.2, -0.1, -0.1),
            Err(PartitionError::RatioOutOfRange { name: "train", .. })
        ));
        assert!(matches!(
            SplitRatios::new(f64::NAN, 0.5, 0.5),
            Err(PartitionError::RatioOutOfRange { .. })
        ));
    }
}

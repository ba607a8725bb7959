//! Weighted philosophy table and the per-request perspective draw.
//!
//! Each advice prompt is framed by a few perspectives drawn from a fixed,
//! weighted table of traditions. The draw is with replacement, so the same
//! tradition can appear more than once in one prompt.

use rand::distributions::{Distribution, WeightedError, WeightedIndex};
use rand::Rng;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Number of perspectives drawn for one advice prompt.
pub const PERSPECTIVES_PER_PROMPT: usize = 3;

/// Closed set of advisory traditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tradition {
    /// Christian ethics.
    Christian,
    /// Buddhist practice.
    Buddhist,
    /// Taoist philosophy.
    Taoist,
    /// Secular humanism.
    SecularHumanist,
    /// Stoicism.
    Stoic,
}

impl Tradition {
    /// Every tradition, in table order.
    pub const ALL: [Tradition; 5] = [
        Tradition::Christian,
        Tradition::Buddhist,
        Tradition::Taoist,
        Tradition::SecularHumanist,
        Tradition::Stoic,
    ];

    /// Stable machine identifier.
    pub fn id(self) -> &'static str {
        match self {
            Self::Christian => "christian",
            Self::Buddhist => "buddhist",
            Self::Taoist => "taoist",
            Self::SecularHumanist => "secular_humanist",
            Self::Stoic => "stoic",
        }
    }

    /// Human-readable name.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Christian => "Christian",
            Self::Buddhist => "Buddhist",
            Self::Taoist => "Taoist",
            Self::SecularHumanist => "Secular Humanist",
            Self::Stoic => "Stoic",
        }
    }

    /// Guidance sentence injected into the prompt when this tradition is drawn.
    pub fn guidance(self) -> &'static str {
        match self {
            Self::Christian => {
                "Focus on love, forgiveness, patience, and treating others with dignity and respect."
            }
            Self::Buddhist => {
                "Emphasize compassion, wisdom, truth, emancipation from earthly desires and delusion."
            }
            Self::Taoist => {
                "Emphasize natural flow, balance, not forcing situations, and finding harmony."
            }
            Self::SecularHumanist => {
                "Focus on reason, empathy, human dignity, and evidence-based problem solving."
            }
            Self::Stoic => {
                "Emphasize acceptance of what you cannot control and focusing on your own actions and responses."
            }
        }
    }
}

impl std::fmt::Display for Tradition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// One row of the table: a tradition and its relative selection weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhilosophyEntry {
    /// The tradition.
    pub tradition: Tradition,
    /// Relative weight; need not sum to 1 across the table.
    pub weight: f64,
}

/// Reasons a weight table is rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PhilosophyError {
    /// A weight was negative, NaN or infinite.
    #[error("invalid weight {weight} for {tradition}")]
    InvalidWeight {
        /// Offending tradition.
        tradition: Tradition,
        /// Offending weight.
        weight: f64,
    },
    /// No entry has a positive weight.
    #[error("philosophy table has no entry with positive weight")]
    EmptyPool,
    /// The weights are individually finite but their sum is not.
    #[error("philosophy table weights overflow when summed")]
    WeightOverflow,
    /// The sampler rejected the weights for another reason.
    #[error("philosophy table rejected by sampler: {0}")]
    Sampler(WeightedError),
}

/// Display row for `/philosophy-mix`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MixRow {
    /// Human-readable name.
    pub name: &'static str,
    /// Weight as a percentage, rounded to one decimal place.
    pub percentage: f64,
    /// Raw weight.
    pub weight: f64,
}

/// `/philosophy-mix` rows keyed by tradition id, in table order.
#[derive(Debug, Clone, PartialEq)]
pub struct PhilosophyMix(Vec<(&'static str, MixRow)>);

impl PhilosophyMix {
    /// Row for a tradition id.
    pub fn get(&self, id: &str) -> Option<&MixRow> {
        self.0.iter().find(|(key, _)| *key == id).map(|(_, row)| row)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the mix has no rows.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Tradition ids in table order.
    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(|(key, _)| *key)
    }
}

impl Serialize for PhilosophyMix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, row) in &self.0 {
            map.serialize_entry(key, row)?;
        }
        map.end()
    }
}

/// Immutable weighted table of traditions.
#[derive(Debug, Clone)]
pub struct PhilosophyTable {
    entries: Vec<PhilosophyEntry>,
    pool: Vec<Tradition>,
    sampler: WeightedIndex<f64>,
}

impl PhilosophyTable {
    /// Build a table, enforcing non-negative finite weights and a non-empty pool.
    ///
    /// # Errors
    ///
    /// Returns [`PhilosophyError`] when a weight is invalid, all weights are
    /// zero, or the weights overflow when summed.
    pub fn new(entries: Vec<PhilosophyEntry>) -> Result<Self, PhilosophyError> {
        if let Some(bad) = entries
            .iter()
            .find(|e| !e.weight.is_finite() || e.weight < 0.0)
        {
            return Err(PhilosophyError::InvalidWeight {
                tradition: bad.tradition,
                weight: bad.weight,
            });
        }

        let (pool, weights): (Vec<Tradition>, Vec<f64>) = entries
            .iter()
            .filter(|e| e.weight > 0.0)
            .map(|e| (e.tradition, e.weight))
            .unzip();
        if !weights.iter().sum::<f64>().is_finite() {
            return Err(PhilosophyError::WeightOverflow);
        }
        let sampler = WeightedIndex::new(&weights).map_err(|e| match e {
            WeightedError::NoItem | WeightedError::AllWeightsZero => PhilosophyError::EmptyPool,
            other => PhilosophyError::Sampler(other),
        })?;

        Ok(Self {
            entries,
            pool,
            sampler,
        })
    }

    /// The production table: 30% Christian, 30% Buddhist, 10% Taoist,
    /// 10% Secular Humanist, 20% Stoic.
    pub fn standard() -> Self {
        let weights = [0.30, 0.30, 0.10, 0.10, 0.20];
        let entries = Tradition::ALL
            .iter()
            .zip(weights)
            .map(|(&tradition, weight)| PhilosophyEntry { tradition, weight })
            .collect();
        match Self::new(entries) {
            Ok(table) => table,
            Err(e) => unreachable!("standard philosophy table is valid: {e}"),
        }
    }

    /// All entries, including zero-weight ones, in table order.
    pub fn entries(&self) -> &[PhilosophyEntry] {
        &self.entries
    }

    /// Number of entries eligible for selection (weight > 0).
    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    /// Draw `min(k, pool_size)` traditions, weighted, with replacement.
    pub fn select<R: Rng + ?Sized>(&self, k: usize, rng: &mut R) -> Vec<Tradition> {
        let count = k.min(self.pool.len());
        (0..count)
            .map(|_| self.pool[self.sampler.sample(rng)])
            .collect()
    }

    /// Display data keyed by tradition id, in table order.
    pub fn mix(&self) -> PhilosophyMix {
        let rows = self
            .entries
            .iter()
            .map(|e| {
                (
                    e.tradition.id(),
                    MixRow {
                        name: e.tradition.display_name(),
                        percentage: percentage(e.weight),
                        weight: e.weight,
                    },
                )
            })
            .collect();
        PhilosophyMix(rows)
    }
}

/// Weight as a percentage rounded to one decimal place.
fn percentage(weight: f64) -> f64 {
    #[allow(clippy::arithmetic_side_effects)]
    {
        (weight * 1000.0).round() / 10.0
    }
}

/// Render the guidance sentence of each pick, preserving order and repeats.
pub fn guidance_lines(picks: &[Tradition]) -> Vec<String> {
    picks.iter().map(|t| t.guidance().to_owned()).collect()
}

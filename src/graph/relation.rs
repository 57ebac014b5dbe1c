//! Relation labels: (source speaker, target speaker, temporal direction).
//!
//! Labels are dense in `[0, 2·S²)` and enumerated speaker-major:
//! `label = (src · S + dst) · 2 + direction`. The ordering is part of the
//! model's persisted state, so it is fingerprinted and checked on load.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Temporal direction of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Source precedes target (`i < j`).
    Forward = 0,
    /// Source is the target or follows it.
    Backward = 1,
}

impl Direction {
    /// Direction of the edge `source -> target`.
    pub fn of(source: usize, target: usize) -> Self {
        if source < target {
            Direction::Forward
        } else {
            Direction::Backward
        }
    }
}

/// One row of the relation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationEntry {
    pub source_speaker: usize,
    pub target_speaker: usize,
    pub direction: Direction,
    pub label: usize,
}

impl fmt::Display for RelationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>3}  {} -> {} ({})",
            self.label,
            self.source_speaker,
            self.target_speaker,
            match self.direction {
                Direction::Forward => "forward",
                Direction::Backward => "backward",
            }
        )
    }
}

/// On-disk form: speaker count plus the explicit entry list.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RelationMapFile {
    num_speakers: usize,
    entries: Vec<RelationEntry>,
}

/// Bijection between speaker-pair/direction triples and relation labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RelationMapFile", into = "RelationMapFile")]
pub struct RelationTypeMap {
    num_speakers: usize,
}

impl RelationTypeMap {
    pub fn new(num_speakers: usize) -> Self {
        Self { num_speakers }
    }

    pub fn num_speakers(&self) -> usize {
        self.num_speakers
    }

    /// Number of relation labels, `2·S²`.
    pub fn len(&self) -> usize {
        2 * self.num_speakers * self.num_speakers
    }

    pub fn is_empty(&self) -> bool {
        self.num_speakers == 0
    }

    /// Label for an edge from `source_speaker` to `target_speaker`.
    pub fn label(
        &self,
        source_speaker: usize,
        target_speaker: usize,
        direction: Direction,
    ) -> Result<usize> {
        for speaker in [source_speaker, target_speaker] {
            if speaker >= self.num_speakers {
                return Err(Error::UnknownSpeaker {
                    speaker,
                    num_speakers: self.num_speakers,
                });
            }
        }
        Ok((source_speaker * self.num_speakers + target_speaker) * 2 + direction as usize)
    }

    /// Inverse of [`label`](Self::label).
    pub fn triple(&self, label: usize) -> Option<(usize, usize, Direction)> {
        if label >= self.len() {
            return None;
        }
        let direction = if label % 2 == 0 {
            Direction::Forward
        } else {
            Direction::Backward
        };
        let pair = label / 2;
        Some((pair / self.num_speakers, pair % self.num_speakers, direction))
    }

    /// Entries in label order.
    pub fn entries(&self) -> impl Iterator<Item = RelationEntry> + '_ {
        (0..self.len()).filter_map(move |label| {
            self.triple(label)
                .map(|(source_speaker, target_speaker, direction)| RelationEntry {
                    source_speaker,
                    target_speaker,
                    direction,
                    label,
                })
        })
    }

    /// BLAKE3 digest of the label ordering, hex encoded.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(self.num_speakers as u64).to_le_bytes());
        for entry in self.entries() {
            hasher.update(&(entry.source_speaker as u64).to_le_bytes());
            hasher.update(&(entry.target_speaker as u64).to_le_bytes());
            hasher.update(&[entry.direction as u8]);
            hasher.update(&(entry.label as u64).to_le_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl From<RelationTypeMap> for RelationMapFile {
    fn from(map: RelationTypeMap) -> Self {
        RelationMapFile {
            num_speakers: map.num_speakers,
            entries: map.entries().collect(),
        }
    }
}

impl TryFrom<RelationMapFile> for RelationTypeMap {
    type Error = Error;

    fn try_from(file: RelationMapFile) -> Result<Self> {
        let map = RelationTypeMap::new(file.num_speakers);
        if file.entries.len() != map.len() {
            return Err(Error::RelationMapMismatch(format!(
                "{} entries for {} speakers, expected {}",
                file.entries.len(),
                file.num_speakers,
                map.len()
            )));
        }
        for (stored, canonical) in file.entries.iter().zip(map.entries()) {
            if *stored != canonical {
                return Err(Error::RelationMapMismatch(format!(
                    "label {} is {:?}, expected {:?}",
                    stored.label, stored, canonical
                )));
            }
        }
        Ok(map)
    }
}

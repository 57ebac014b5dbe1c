//! Model configuration and device selection.

use std::fmt;
use std::path::Path;

use burn::config::Config;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::graph::relation::RelationTypeMap;
use crate::graph::window::WindowSpec;

/// Where tensors live. The CLI maps this to a burn backend.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Host memory, `NdArray` backend.
    #[default]
    Cpu,
    /// GPU through the `Wgpu` backend.
    Accelerator,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Cpu => write!(f, "cpu"),
            DeviceKind::Accelerator => write!(f, "accelerator"),
        }
    }
}

/// DialogueGCN hyperparameters.
#[derive(Config, Debug)]
pub struct DialogueGcnConfig {
    /// Encoder output width per utterance (twice the encoder hidden size).
    pub feature_dim: usize,
    /// Distinct speaker identities in the dataset.
    pub num_speakers: usize,
    /// Emotion classes.
    #[config(default = 7)]
    pub num_classes: usize,
    /// Longest padded dialogue the edge scorer accepts.
    #[config(default = 110)]
    pub max_seq_len: usize,
    /// Past window, -1 for unbounded.
    #[config(default = 10)]
    pub window_past: i64,
    /// Future window, -1 for unbounded.
    #[config(default = 10)]
    pub window_future: i64,
    /// Graph convolution and classifier hidden width.
    #[config(default = 64)]
    pub hidden_size: usize,
    /// Basis matrices shared by the relation weights.
    #[config(default = 8)]
    pub num_bases: usize,
    #[config(default = 0.5)]
    pub dropout: f64,
    #[config(default = "DeviceKind::Cpu")]
    pub device: DeviceKind,
}

impl DialogueGcnConfig {
    /// Defaults for `num_speakers`, with the basis count capped at the
    /// number of relations.
    pub fn for_speakers(feature_dim: usize, num_speakers: usize) -> Self {
        let config = Self::new(feature_dim, num_speakers);
        let num_bases = config.num_bases.min(config.num_relations()).max(1);
        config.with_num_bases(num_bases)
    }

    /// Relation labels for this speaker count, `2·S²`.
    pub fn num_relations(&self) -> usize {
        2 * self.num_speakers * self.num_speakers
    }

    pub fn relation_map(&self) -> RelationTypeMap {
        RelationTypeMap::new(self.num_speakers)
    }

    pub fn window(&self) -> crate::error::Result<WindowSpec> {
        WindowSpec::try_new(self.window_past, self.window_future)
    }

    /// Reject out-of-range hyperparameters.
    pub fn validate(&self) -> crate::error::Result<()> {
        self.window()?;
        let positive = [
            ("feature_dim", self.feature_dim),
            ("num_speakers", self.num_speakers),
            ("num_classes", self.num_classes),
            ("max_seq_len", self.max_seq_len),
            ("hidden_size", self.hidden_size),
            ("num_bases", self.num_bases),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("{} must be positive", name)));
            }
        }
        if self.num_bases > self.num_relations() {
            return Err(Error::InvalidConfig(format!(
                "num_bases {} exceeds {} relations",
                self.num_bases,
                self.num_relations()
            )));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(Error::InvalidConfig(format!(
                "dropout {} outside [0, 1)",
                self.dropout
            )));
        }
        Ok(())
    }

    /// Load a JSON config and validate it.
    pub fn load_validated(path: &Path) -> crate::error::Result<Self> {
        let config = Self::load(path)
            .map_err(|e| Error::InvalidConfig(format!("{}: {:?}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }
}

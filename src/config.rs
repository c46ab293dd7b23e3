use crate::error::{Error, Result};
use crate::model::{ActivationFunction, InitMethod, RmsPropConfig};
use rand::{rngs::StdRng, SeedableRng};
use serde::Deserialize;
use std::fs::File;
use std::path::Path;

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_EPOCHS: usize = 20;

/// How much the harness logs while it trains and evaluates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "u8")]
pub enum Verbosity {
    /// 0: nothing
    Silent,
    /// 1: every batch step plus a line per epoch
    Progress,
    /// 2: one line per epoch
    #[default]
    Epoch,
}

impl TryFrom<u8> for Verbosity {
    type Error = Error;

    fn try_from(level: u8) -> Result<Self> {
        match level {
            0 => Ok(Verbosity::Silent),
            1 => Ok(Verbosity::Progress),
            2 => Ok(Verbosity::Epoch),
            _ => Err(Error::InvalidConfig(format!(
                "verbosity must be 0, 1 or 2, got {}",
                level
            ))),
        }
    }
}

/// Topology and initialization of the classifier. The output width is not
/// configured: it follows the label cardinality of the data
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelConfig {
    pub hidden_units: usize,
    pub hidden_activation: ActivationFunction,
    pub init_method: InitMethod,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            hidden_units: 4,
            hidden_activation: ActivationFunction::ReLU,
            init_method: InitMethod::Xavier,
        }
    }
}

/// Everything the harness entry points need
#[derive(Debug, Clone, PartialEq)]
pub struct HarnessConfig {
    pub batch_size: usize,
    pub epochs: usize,
    pub verbose: Verbosity,
    /// Seed for weight initialization; drawn from the OS when unset
    pub seed: Option<u64>,
    pub model: ModelConfig,
    pub optimizer: RmsPropConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            batch_size: DEFAULT_BATCH_SIZE,
            epochs: DEFAULT_EPOCHS,
            verbose: Verbosity::default(),
            seed: None,
            model: ModelConfig::default(),
            optimizer: RmsPropConfig::default(),
        }
    }
}

impl HarnessConfig {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(Error::InvalidConfig(msg.to_string()));

        if self.batch_size == 0 {
            return invalid("batch size must be positive");
        }
        if self.model.hidden_units == 0 {
            return invalid("the hidden layer needs at least one unit");
        }
        if !(self.optimizer.learning_rate > 0f64) {
            return invalid("learning rate must be positive");
        }
        if !(0f64..1f64).contains(&self.optimizer.rho) {
            return invalid("rho must be in [0, 1)");
        }
        if !(self.optimizer.epsilon >= 0f64) {
            return invalid("epsilon must not be negative");
        }

        Ok(())
    }

    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// Settings read from a YAML file or collected from the command line.
/// Every field is optional; unset fields fall through to the next source
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub batch_size: Option<usize>,
    pub epochs: Option<usize>,
    pub verbose: Option<Verbosity>,
    pub seed: Option<u64>,
    pub hidden_units: Option<usize>,
    pub hidden_activation: Option<ActivationFunction>,
    pub init_method: Option<InitMethod>,
    pub learning_rate: Option<f64>,
    pub rho: Option<f64>,
    pub epsilon: Option<f64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        Ok(serde_yaml::from_reader(File::open(path)?)?)
    }

    // merge configs where the second overwrites the first
    pub fn merge(self, other: Self) -> Self {
        Self {
            batch_size: other.batch_size.or(self.batch_size),
            epochs: other.epochs.or(self.epochs),
            verbose: other.verbose.or(self.verbose),
            seed: other.seed.or(self.seed),
            hidden_units: other.hidden_units.or(self.hidden_units),
            hidden_activation: other.hidden_activation.or(self.hidden_activation),
            init_method: other.init_method.or(self.init_method),
            learning_rate: other.learning_rate.or(self.learning_rate),
            rho: other.rho.or(self.rho),
            epsilon: other.epsilon.or(self.epsilon),
        }
    }

    /// Fill a harness config, keeping its values where this one is unset
    pub fn apply(self, base: HarnessConfig) -> HarnessConfig {
        HarnessConfig {
            batch_size: self.batch_size.unwrap_or(base.batch_size),
            epochs: self.epochs.unwrap_or(base.epochs),
            verbose: self.verbose.unwrap_or(base.verbose),
            seed: self.seed.or(base.seed),
            model: ModelConfig {
                hidden_units: self.hidden_units.unwrap_or(base.model.hidden_units),
                hidden_activation: self
                    .hidden_activation
                    .unwrap_or(base.model.hidden_activation),
                init_method: self.init_method.unwrap_or(base.model.init_method),
            },
            optimizer: RmsPropConfig {
                learning_rate: self.learning_rate.unwrap_or(base.optimizer.learning_rate),
                rho: self.rho.unwrap_or(base.optimizer.rho),
                epsilon: self.epsilon.unwrap_or(base.optimizer.epsilon),
            },
        }
    }
}

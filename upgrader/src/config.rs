//! Upgrade parameters, read from a TOML file.
//!
//! Secrets never live here: the node endpoint and the signing key come from
//! the environment.
use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use alloy::primitives::{Address, Bytes, U256};
use serde::{Deserialize, Deserializer};

use crate::{
    artifact::{Artifact, ArtifactError},
    stage::{Stage, StageLimits, StageState},
};

/// Config file read when none is given.
pub const DEFAULT_CONFIG_PATH: &str = "upgrade.toml";

/// Upper bound of `slippage_bps`, i.e. 100%.
pub const MAX_SLIPPAGE_BPS: u16 = 10_000;

/// Errors raised while loading an [`UpgradeConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read {}", .path.display())]
    Read {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying io error.
        source: io::Error,
    },
    /// The config file is not valid TOML or has unexpected fields.
    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),
    /// `slippage_bps` is above [`MAX_SLIPPAGE_BPS`].
    #[error("slippage_bps is {0}, at most {MAX_SLIPPAGE_BPS} is allowed")]
    Slippage(u16),
    /// A required address is the zero address.
    #[error("{0} must not be the zero address")]
    ZeroAddress(&'static str),
    /// Deploying needs an artifact but none is configured.
    #[error("no artifact configured to deploy the implementation from")]
    MissingArtifact,
    /// The artifact could not be loaded.
    #[error("failed to load artifact {}", .path.display())]
    Artifact {
        /// Path of the artifact.
        path: PathBuf,
        /// Underlying artifact error.
        source: ArtifactError,
    },
}

/// How long to wait for a receipt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Confirmation {
    /// Blocks a receipt must be buried under.
    pub confirmations: u64,
    /// Give up after this many seconds; wait forever when unset.
    pub timeout_secs: Option<u64>,
}

impl Default for Confirmation {
    fn default() -> Self {
        Self { confirmations: 1, timeout_secs: None }
    }
}

impl Confirmation {
    /// Receipt timeout, if any.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Parameters of an upgrade.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpgradeConfig {
    /// Proxy being upgraded.
    pub proxy: Address,
    /// Already deployed implementation. When unset, a run deploys one from
    /// `artifact` first.
    #[serde(default)]
    pub implementation: Option<Address>,
    /// Swap router passed to `initializeV2`.
    pub router: Address,
    /// Swap threshold passed to `initializeV2`, a decimal or `0x` string.
    #[serde(deserialize_with = "deserialize_u256")]
    pub swap_threshold: U256,
    /// Slippage bound passed to `initializeV2`.
    pub slippage_bps: u16,
    /// Liquidity pair to allow-list.
    pub pair: Address,
    /// Compiler artifact of the implementation.
    #[serde(default)]
    pub artifact: Option<PathBuf>,
    /// ABI-encoded constructor arguments appended to the bytecode.
    #[serde(default)]
    pub constructor_args: Bytes,
    /// Call forwarded by `upgradeToAndCall`, empty for none.
    #[serde(default)]
    pub upgrade_call_data: Bytes,
    /// Per-stage gas limits and transaction schemes.
    #[serde(default, rename = "gas")]
    pub limits: StageLimits,
    /// Receipt wait settings.
    #[serde(default)]
    pub confirmation: Confirmation,
}

fn deserialize_u256<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<U256, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(value) => Ok(U256::from(value)),
        Raw::Str(value) => {
            value.trim().parse().map_err(serde::de::Error::custom)
        }
    }
}

impl UpgradeConfig {
    /// Read and validate the config file at `path`.
    ///
    /// # Errors
    ///
    /// If the file cannot be read, does not parse or fails validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| {
            ConfigError::Read { path: path.to_path_buf(), source }
        })?;
        Self::from_toml(&contents)
    }

    /// Parse and validate TOML `contents`.
    ///
    /// # Errors
    ///
    /// If `contents` does not parse or fails validation.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.slippage_bps > MAX_SLIPPAGE_BPS {
            return Err(ConfigError::Slippage(self.slippage_bps));
        }
        let addresses = [
            ("proxy", Some(self.proxy)),
            ("implementation", self.implementation),
            ("router", Some(self.router)),
            ("pair", Some(self.pair)),
        ];
        for (field, address) in addresses {
            if address == Some(Address::ZERO) {
                return Err(ConfigError::ZeroAddress(field));
            }
        }
        Ok(())
    }

    /// Load the configured artifact.
    ///
    /// # Errors
    ///
    /// If no artifact is configured or it cannot be loaded.
    pub fn artifact(&self) -> Result<Artifact, ConfigError> {
        let path =
            self.artifact.as_ref().ok_or(ConfigError::MissingArtifact)?;
        let artifact = Artifact::load(path).map_err(|source| {
            ConfigError::Artifact { path: path.clone(), source }
        })?;
        Ok(artifact.with_constructor_args(self.constructor_args.clone()))
    }

    /// Stage deploying the configured artifact.
    ///
    /// # Errors
    ///
    /// If the artifact cannot be loaded.
    pub fn deploy_stage(&self) -> Result<Stage, ConfigError> {
        Ok(Stage::DeployImplementation { artifact: self.artifact()? })
    }

    /// Stage calling `initializeV2` with the configured values.
    #[must_use]
    pub fn initialize_stage(&self) -> Stage {
        Stage::InitializeConfiguration {
            proxy: self.proxy,
            router: self.router,
            swap_threshold: self.swap_threshold,
            slippage_bps: self.slippage_bps,
        }
    }

    /// Stage allow-listing the configured pair.
    #[must_use]
    pub fn register_pair_stage(&self) -> Stage {
        Stage::RegisterPair { proxy: self.proxy, pair: self.pair }
    }

    /// Stage switching the proxy to `implementation`, or to the configured
    /// one when `None`.
    #[must_use]
    pub fn switch_stage(&self, implementation: Option<Address>) -> Stage {
        Stage::SwitchProxyTarget {
            proxy: self.proxy,
            implementation: implementation.or(self.implementation),
            call_data: self.upgrade_call_data.clone(),
        }
    }

    /// State a run starts from: a configured implementation counts as
    /// deployed.
    #[must_use]
    pub fn starting_state(&self) -> StageState {
        if self.implementation.is_some() {
            StageState::Deployed
        } else {
            StageState::NotDeployed
        }
    }

    /// Every stage of the upgrade, in order.
    ///
    /// Deployment is included only when no implementation is configured.
    ///
    /// # Errors
    ///
    /// If deployment is needed and the artifact cannot be loaded.
    pub fn plan(&self) -> Result<Vec<Stage>, ConfigError> {
        let mut stages = Vec::with_capacity(4);
        if self.implementation.is_none() {
            stages.push(self.deploy_stage()?);
        }
        stages.push(self.initialize_stage());
        stages.push(self.register_pair_stage());
        stages.push(self.switch_stage(None));
        Ok(stages)
    }
}

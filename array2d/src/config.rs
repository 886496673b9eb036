/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Array configuration.
//!
//! Configuration can be loaded from the environment ([`Config::from_env`])
//! or from YAML ([`Config::from_yaml`]), and is applied to an array with
//! [`Array::with_config`](crate::Array::with_config).

use std::env;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

/// Environment variable consulted by [`Config::from_env`] for the
/// growth policy.
pub const GROWTH_POLICY_ENV: &str = "ARRAY2D_GROWTH_POLICY";

/// The type of error for configuration loading.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid growth policy: {0:?} (expected \"exact\" or \"double\")")]
    InvalidGrowthPolicy(String),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

/// How per-axis capacity grows when a request exceeds it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthPolicy {
    /// Grow to exactly the requested extent.
    #[default]
    Exact,
    /// Grow to at least twice the current capacity.
    Double,
}

impl GrowthPolicy {
    /// The capacity to allocate on one axis for a request of
    /// `requested` when `current` is allocated.
    pub fn grow(self, current: usize, requested: usize) -> usize {
        if requested <= current {
            return current;
        }
        match self {
            GrowthPolicy::Exact => requested,
            GrowthPolicy::Double => requested.max(current.saturating_mul(2)),
        }
    }
}

impl fmt::Display for GrowthPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrowthPolicy::Exact => write!(f, "exact"),
            GrowthPolicy::Double => write!(f, "double"),
        }
    }
}

impl FromStr for GrowthPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(GrowthPolicy::Exact),
            "double" => Ok(GrowthPolicy::Double),
            _ => Err(ConfigError::InvalidGrowthPolicy(s.to_string())),
        }
    }
}

/// Array configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub growth: GrowthPolicy,
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for unset or unparseable values.
    pub fn from_env() -> Self {
        let mut config = Config::default();
        if let Ok(val) = env::var(GROWTH_POLICY_ENV) {
            match val.parse() {
                Ok(growth) => config.growth = growth,
                Err(e) => {
                    tracing::error!(
                        "failed to override growth policy from value \"{}\" in ${}: {}",
                        val,
                        GROWTH_POLICY_ENV,
                        e
                    );
                }
            }
        }
        config
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

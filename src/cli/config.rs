//! Agora configuration file handling
//!
//! Provides default configuration generation and loading for the operator
//! binary. Configuration files are TOML format and live under the user's
//! config directory unless a path is given explicitly.
//!
//! ## Deployment vs Runtime
//!
//! Everything here is fixed when a world is deployed: governor parameters,
//! timelock delays and the initial token supply. None of it can be changed
//! afterwards by the simulator; a new deployment is required.
//!
//! Amounts are decimal strings in base units, since TOML integers stop at
//! `i64::MAX`.

use agora::governor::settings::GovernorSettings;
use agora::ledger::TokenInfo;
use agora::types::{amount_str, Amount, Sequence, UNIT};
use agora::world::DeployParams;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Default log level
const DEFAULT_LOG_LEVEL: &str = "info";

/// Agora deployment configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgoraConfig {
    /// Voting parameters
    #[serde(default)]
    pub governor: GovernorSettings,

    /// Timelock delays
    #[serde(default)]
    pub timelock: TimelockConfig,

    /// Voting token metadata and initial supply
    #[serde(default)]
    pub token: TokenConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Timelock configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelockConfig {
    /// Minimum sequences between queue and execution
    #[serde(default = "default_min_delay")]
    pub min_delay: Sequence,

    /// Sequences after the eta during which execution is still allowed
    #[serde(default = "default_grace_period")]
    pub grace_period: Sequence,
}

/// Token configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    #[serde(default = "default_token_name")]
    pub name: String,

    #[serde(default = "default_token_symbol")]
    pub symbol: String,

    #[serde(default = "default_decimals")]
    pub decimals: u8,

    /// Minted to the deployer at sequence 0
    #[serde(default = "default_initial_supply", with = "amount_str")]
    pub initial_supply: Amount,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter: a level (trace, debug, info, warn, error) or directives
    /// such as `agora=debug,warn`
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_min_delay() -> Sequence {
    2
}

fn default_grace_period() -> Sequence {
    100_800
}

fn default_token_name() -> String {
    TokenInfo::default().name
}

fn default_token_symbol() -> String {
    TokenInfo::default().symbol
}

fn default_decimals() -> u8 {
    18
}

fn default_initial_supply() -> Amount {
    1_000_000 * UNIT
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for TimelockConfig {
    fn default() -> Self {
        Self {
            min_delay: default_min_delay(),
            grace_period: default_grace_period(),
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            name: default_token_name(),
            symbol: default_token_symbol(),
            decimals: default_decimals(),
            initial_supply: default_initial_supply(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl AgoraConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

        let config: AgoraConfig = toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(path, contents)
            .map_err(|e| format!("Failed to write config file '{}': {}", path.display(), e))?;

        Ok(())
    }

    /// Reject configurations no deployment could run with
    pub fn validate(&self) -> Result<(), String> {
        self.governor.validate()?;
        if self.token.symbol.is_empty() {
            return Err("token symbol must not be empty".to_string());
        }
        if let Err(e) = EnvFilter::try_new(&self.logging.level) {
            return Err(format!("invalid log filter '{}': {}", self.logging.level, e));
        }
        Ok(())
    }

    /// Deployment parameters described by this configuration
    pub fn deploy_params(&self) -> DeployParams {
        DeployParams {
            token: TokenInfo {
                name: self.token.name.clone(),
                symbol: self.token.symbol.clone(),
                decimals: self.token.decimals,
            },
            initial_supply: self.token.initial_supply,
            governor: self.governor.clone(),
            min_delay: self.timelock.min_delay,
            grace_period: self.timelock.grace_period,
        }
    }

    /// Generate default configuration content as a string with comments
    pub fn generate_default_toml() -> String {
        r#"# Agora Governance Configuration
#
# These parameters are fixed at deployment. Changing them requires a new
# deployment; running worlds keep the values they were created with.
#
# Amounts are decimal strings in base units (1 token = 10^18 units).

[governor]
# Sequences between propose and the vote snapshot
voting_delay = 1

# Sequences the vote stays open after the snapshot
voting_period = 50400

# Votes a proposer needs (10,000 tokens)
proposal_threshold = "10000000000000000000000"

# Quorum: a fraction of total supply at the snapshot, or a fixed amount
# quorum = { fixed = "40000000000000000000000" }
quorum = { fraction = { numerator = 4, denominator = 100 } }

[timelock]
# Minimum sequences between queue and execution
min_delay = 2

# Sequences after the eta during which execution is still allowed
grace_period = 100800

[token]
name = "Agora Token"
symbol = "AGR"
decimals = 18

# Minted to the deployer at sequence 0 (1,000,000 tokens)
initial_supply = "1000000000000000000000000"

[logging]
# Log filter: trace, debug, info, warn, error, or directives like "agora=debug"
level = "info"
"#
        .to_string()
    }

    /// Create and save a default configuration file
    pub fn create_default(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(config_path, Self::generate_default_toml()).map_err(|e| {
            format!(
                "Failed to write config file '{}': {}",
                config_path.display(),
                e
            )
        })?;

        Ok(())
    }

    /// Load `path` if given, else the default path if it exists, else defaults
    pub fn resolve(path: Option<&Path>) -> Result<Self, Box<dyn std::error::Error>> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default = default_config_path();
                if default.exists() {
                    Self::load(&default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}

/// Get the default config file path
///
/// - Linux: ~/.config/agora/config.toml
/// - macOS: ~/Library/Application Support/agora/config.toml
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("agora")
        .join("config.toml")
}

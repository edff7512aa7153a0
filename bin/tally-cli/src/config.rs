use std::{fs, path::PathBuf, time::Duration};

use alloy_primitives::Address;
use eyre::{eyre, Context};
use serde::Deserialize;
use tally_common::logging::{FileLoggingConfig, LoggerConfig};
use tally_ledger_evm::{ContractVariant, EvmLedgerConfig};
use tally_primitives::Denomination;

use crate::args::{Args, EnvArgs};

const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
const DEFAULT_SYMBOL: &str = "ETH";
const DEFAULT_DECIMALS: u8 = 18;
const DEFAULT_LOG_FILE_PREFIX: &str = "tally";

/// Logging configuration for the client.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub(crate) struct LoggingConfig {
    /// Use JSON format for logs instead of compact format.
    #[serde(default)]
    pub json_format: bool,

    /// Directory path for file-based logging.
    pub log_dir: Option<PathBuf>,

    /// Prefix for log file names (defaults to "tally" if not set).
    pub log_file_prefix: Option<String>,
}

/// Contents of the config file. Every field may also come from flags.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub(crate) struct FileConfig {
    pub rpc_url: Option<String>,
    pub contract_address: Option<Address>,
    pub contract_variant: Option<ContractVariant>,
    pub private_key: Option<String>,
    pub decimals: Option<u8>,
    pub symbol: Option<String>,
    pub event_start_block: Option<u64>,
    pub poll_interval_ms: Option<u64>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl FileConfig {
    pub(crate) fn parse(contents: &str) -> eyre::Result<Self> {
        toml::from_str(contents).wrap_err("invalid config file")
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub rpc_url: String,
    pub contract_address: Address,
    pub contract_variant: ContractVariant,
    pub private_key: String,
    pub denomination: Denomination,
    pub event_start_block: Option<u64>,
    pub poll_interval: Duration,
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads the config file named by the args or environment, if any, and
    /// applies flag overrides on top.
    pub(crate) fn load(args: &Args, env: &EnvArgs) -> eyre::Result<Self> {
        let path = args.config.as_ref().or(env.config.as_ref());
        let file = match path {
            Some(path) => {
                let contents = fs::read_to_string(path)
                    .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
                FileConfig::parse(&contents)?
            }
            None => FileConfig::default(),
        };

        Self::resolve(file, args, env)
    }

    /// Merges file values with flag and environment overrides.
    pub(crate) fn resolve(file: FileConfig, args: &Args, env: &EnvArgs) -> eyre::Result<Self> {
        let rpc_url = args
            .rpc_url
            .clone()
            .or(file.rpc_url)
            .ok_or_else(|| eyre!("config: no rpc_url provided"))?;

        let contract_address = match &args.contract_address {
            Some(addr) => addr
                .parse()
                .wrap_err_with(|| format!("args: invalid contract address {addr:?}"))?,
            None => file
                .contract_address
                .ok_or_else(|| eyre!("config: no contract_address provided"))?,
        };

        let private_key = env
            .private_key
            .clone()
            .or(file.private_key)
            .ok_or_else(|| eyre!("config: no private_key provided (or TALLY_PRIVATE_KEY)"))?;

        let denomination = Denomination::new(
            file.decimals.unwrap_or(DEFAULT_DECIMALS),
            file.symbol.unwrap_or_else(|| DEFAULT_SYMBOL.to_owned()),
        )
        .wrap_err("config: invalid denomination")?;

        let mut logging = file.logging;
        logging.json_format |= args.json_logs;

        Ok(Self {
            rpc_url,
            contract_address,
            contract_variant: args
                .contract_variant
                .or(file.contract_variant)
                .unwrap_or(ContractVariant::Indexed),
            private_key,
            denomination,
            event_start_block: args.event_start_block.or(file.event_start_block),
            poll_interval: Duration::from_millis(
                args.poll_interval_ms
                    .or(file.poll_interval_ms)
                    .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            ),
            logging,
        })
    }

    pub(crate) fn ledger_config(&self) -> EvmLedgerConfig {
        let config = EvmLedgerConfig::new(
            self.rpc_url.clone(),
            self.contract_address,
            self.contract_variant,
        )
        .with_poll_interval(self.poll_interval);

        match self.event_start_block {
            Some(block) => config.with_event_start_block(block),
            None => config,
        }
    }

    pub(crate) fn logger_config(&self) -> LoggerConfig {
        let mut lconfig = LoggerConfig::new("tally".to_owned())
            .with_json_logging(self.logging.json_format)
            .with_directive("hyper=warn")
            .with_directive("alloy_transport_http=warn");

        if let Some(dir) = &self.logging.log_dir {
            let prefix = self
                .logging
                .log_file_prefix
                .clone()
                .unwrap_or_else(|| DEFAULT_LOG_FILE_PREFIX.to_owned());
            lconfig = lconfig.with_file_logging(
                FileLoggingConfig::new(dir.clone(), prefix)
                    .with_json_format(self.logging.json_format),
            );
        }

        lconfig
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::{Command, WatchArgs};

    const CONFIG: &str = r#"
        rpc_url = "http://127.0.0.1:8545"
        contract_address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
        contract_variant = "events"
        private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
        decimals = 6
        symbol = "USDC"
        event_start_block = 10

        [logging]
        log_dir = "/var/log/tally"
    "#;

    fn args() -> Args {
        Args {
            config: None,
            rpc_url: None,
            contract_address: None,
            contract_variant: None,
            event_start_block: None,
            poll_interval_ms: None,
            json_logs: false,
            cmd: Command::Watch(WatchArgs {}),
        }
    }

    #[test]
    fn test_file_values() {
        let file = FileConfig::parse(CONFIG).unwrap();
        let config = Config::resolve(file, &args(), &EnvArgs::default()).unwrap();

        assert_eq!(config.rpc_url, "http://127.0.0.1:8545");
        assert_eq!(config.contract_variant, ContractVariant::Events);
        assert_eq!(config.denomination.decimals(), 6);
        assert_eq!(config.denomination.symbol(), "USDC");
        assert_eq!(config.event_start_block, Some(10));
        assert_eq!(
            config.poll_interval,
            Duration::from_millis(DEFAULT_POLL_INTERVAL_MS)
        );

        let lconfig = config.logger_config();
        let file_logging = lconfig.file_logging_config.unwrap();
        assert_eq!(file_logging.directory, PathBuf::from("/var/log/tally"));
        assert_eq!(file_logging.file_name_prefix, DEFAULT_LOG_FILE_PREFIX);
    }

    #[test]
    fn test_overrides_take_precedence() {
        let file = FileConfig::parse(CONFIG).unwrap();
        let mut args = args();
        args.rpc_url = Some("http://node:8545".to_owned());
        args.contract_variant = Some(ContractVariant::Indexed);
        args.poll_interval_ms = Some(250);
        args.json_logs = true;
        let env = EnvArgs {
            config: None,
            private_key: Some("0x01".to_owned()),
        };

        let config = Config::resolve(file, &args, &env).unwrap();
        assert_eq!(config.rpc_url, "http://node:8545");
        assert_eq!(config.contract_variant, ContractVariant::Indexed);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.private_key, "0x01");
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_defaults_with_minimal_config() {
        let file = FileConfig::parse(
            r#"
            rpc_url = "http://127.0.0.1:8545"
            contract_address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
            private_key = "0x01"
            "#,
        )
        .unwrap();
        let config = Config::resolve(file, &args(), &EnvArgs::default()).unwrap();

        assert_eq!(config.contract_variant, ContractVariant::Indexed);
        assert_eq!(config.denomination, Denomination::ether());
        assert!(config.event_start_block.is_none());
        assert!(config.logger_config().file_logging_config.is_none());
    }

    #[test]
    fn test_missing_required_values() {
        let err = Config::resolve(FileConfig::default(), &args(), &EnvArgs::default())
            .unwrap_err();
        assert!(err.to_string().contains("rpc_url"));

        let mut args = args();
        args.rpc_url = Some("http://127.0.0.1:8545".to_owned());
        args.contract_address = Some("not-an-address".to_owned());
        assert!(Config::resolve(FileConfig::default(), &args, &EnvArgs::default()).is_err());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(FileConfig::parse("rpc_uri = \"http://x\"").is_err());
    }
}

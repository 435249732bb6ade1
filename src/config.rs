//! Configuration loading — §6 "Environment configuration".
//!
//! Same shape as the teacher's `load_config`: read `.env`, then pull each
//! setting from the process environment with `?`, parsing as needed.
//! Anything required-but-missing is a fatal `Config` error at startup.

use std::collections::HashMap;
use std::str::FromStr;

use alloy::primitives::Address;
use rust_decimal::Decimal;

use crate::error::{EngineError, EngineResult};
use crate::registry::Registries;
use crate::types::{ChainDescriptor, ChainId, DexDescriptor, GasPricingMode, ProtocolFamily, TokenDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Paper,
    Live,
}

impl FromStr for ExecutionMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PAPER" => Ok(ExecutionMode::Paper),
            "LIVE" => Ok(ExecutionMode::Live),
            other => Err(EngineError::Config(format!("invalid EXECUTION_MODE: {other}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub auth_token: Option<String>,
    pub hmac_secret: Option<String>,
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub execution_mode: ExecutionMode,
    pub execution_host: String,
    pub execution_port: u16,
    pub chains: Vec<ChainDescriptor>,
    pub single_enabled_chain: ChainId,
    pub executor_addresses: HashMap<ChainId, Address>,
    pub private_key: Option<String>,

    pub min_profit_usd: Decimal,
    pub max_slippage_bps: u32,
    pub max_base_fee_gwei: Decimal,
    pub max_concurrent_txs: usize,
    pub gas_limit_multiplier: Decimal,
    pub breaker_threshold: u64,
    pub breaker_cooldown_secs: u64,

    pub relay: RelayConfig,

    pub scan_worker_width: usize,
    pub scan_interval_ms: u64,
    pub trade_size_sweep_usd: Vec<Decimal>,
    pub tier2_symbols: Vec<String>,

    /// Optional model paths; missing or stub files degrade to heuristics
    /// without error (§6). The engine never opens these itself — a future
    /// advisor implementation may.
    pub catboost_model_path: Option<String>,
    pub hf_model_path: Option<String>,
    pub ml_model_path: Option<String>,
    pub self_learning_data_path: Option<String>,
    pub model_cache_dir: Option<String>,
    pub enable_realtime_training: bool,
}

fn env_var(key: &str) -> EngineResult<String> {
    std::env::var(key).map_err(|_| EngineError::Config(format!("{key} not set")))
}

fn env_var_opt(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn env_parse_or<T: FromStr>(key: &str, default: T) -> EngineResult<T> {
    match std::env::var(key) {
        Ok(v) => v.parse().map_err(|_| EngineError::Config(format!("invalid {key}: {v}"))),
        Err(_) => Ok(default),
    }
}

pub fn load_config() -> EngineResult<EngineConfig> {
    dotenv::dotenv().ok();

    let execution_mode: ExecutionMode = env_parse_or("EXECUTION_MODE", ExecutionMode::Paper)?;
    let single_enabled_chain: ChainId = env_parse_or("SINGLE_ENABLED_CHAIN", 137)?;

    let chain_names = env_var_opt("CHAINS").unwrap_or_else(|| "POLYGON".to_string());
    let mut chains = Vec::new();
    for name in chain_names.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        chains.push(load_chain_descriptor(name, single_enabled_chain)?);
    }

    let mut executor_addresses = HashMap::new();
    for chain in &chains {
        let per_chain_key = format!("EXECUTOR_ADDRESS_{}", chain.name.to_ascii_uppercase());
        let addr_str = env_var_opt(&per_chain_key).or_else(|| env_var_opt("EXECUTOR_ADDRESS"));
        if let Some(addr_str) = addr_str {
            let addr = Address::from_str(&addr_str)
                .map_err(|e| EngineError::Config(format!("invalid executor address: {e}")))?;
            executor_addresses.insert(chain.chain_id, addr);
        }
    }

    let trade_size_sweep_usd = env_var_opt("TRADE_SIZE_SWEEP_USD")
        .map(|s| {
            s.split(',')
                .map(|v| v.trim().parse::<Decimal>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| EngineError::Config(format!("invalid TRADE_SIZE_SWEEP_USD: {e}")))
        })
        .transpose()?
        .unwrap_or_else(|| crate::graph::default_size_sweep());

    let tier2_symbols = env_var_opt("TIER2_SYMBOLS")
        .map(|s| s.split(',').map(|v| v.trim().to_string()).collect())
        .unwrap_or_default();

    Ok(EngineConfig {
        execution_mode,
        execution_host: env_var_opt("EXECUTION_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
        execution_port: env_parse_or("EXECUTION_PORT", 8545u16)?,
        chains,
        single_enabled_chain,
        executor_addresses,
        private_key: env_var_opt("PRIVATE_KEY"),

        min_profit_usd: env_parse_or("MIN_PROFIT_USD", Decimal::from(5))?,
        max_slippage_bps: env_parse_or("MAX_SLIPPAGE_BPS", 50u32)?,
        max_base_fee_gwei: env_parse_or("MAX_BASE_FEE_GWEI", Decimal::from(500))?,
        max_concurrent_txs: env_parse_or("MAX_CONCURRENT_TXS", 3usize)?,
        gas_limit_multiplier: env_parse_or("GAS_LIMIT_MULTIPLIER", Decimal::new(12, 1))?,
        breaker_threshold: env_parse_or("BREAKER_THRESHOLD", crate::execution::breaker::DEFAULT_THRESHOLD)?,
        breaker_cooldown_secs: env_parse_or("BREAKER_COOLDOWN_SECS", crate::execution::breaker::DEFAULT_COOLDOWN.as_secs())?,

        relay: RelayConfig {
            auth_token: env_var_opt("BLOXROUTE_AUTH"),
            hmac_secret: env_var_opt("BLOX_HASH_SECRET"),
            tls_cert_path: env_var_opt("BLOX_TLS_CERT"),
            tls_key_path: env_var_opt("BLOX_TLS_KEY"),
        },

        scan_worker_width: env_parse_or("SCAN_WORKER_WIDTH", 20usize)?,
        scan_interval_ms: env_parse_or("SCAN_INTERVAL_MS", 2_000u64)?,
        trade_size_sweep_usd,
        tier2_symbols,

        catboost_model_path: env_var_opt("CATBOOST_MODEL_PATH"),
        hf_model_path: env_var_opt("HF_MODEL_PATH"),
        ml_model_path: env_var_opt("ML_MODEL_PATH"),
        self_learning_data_path: env_var_opt("SELF_LEARNING_DATA_PATH"),
        model_cache_dir: env_var_opt("MODEL_CACHE_DIR"),
        enable_realtime_training: env_parse_or("ENABLE_REALTIME_TRAINING", false)?,
    })
}

/// Build the token/DEX registry from the same colon/semicolon env-var
/// convention the teacher uses for `TRADING_PAIRS` (`spec.md` §4.2, §6).
///
/// `TOKENS`     = `chainId:SYMBOL:address:decimals:bridgeable;...`
/// `DEXES`      = `chainId:dexId:router:family[:quoter];...`, family one of
///                `univ2`, `univ3`, `curve`
/// `DEX_PAIRS`  = `chainId:dexA:dexB;...`
pub fn load_registries() -> EngineResult<Registries> {
    let mut builder = Registries::builder();

    for record in env_var_opt("TOKENS").unwrap_or_default().split(';').map(str::trim).filter(|s| !s.is_empty()) {
        let fields: Vec<&str> = record.split(':').collect();
        if fields.len() != 5 {
            return Err(EngineError::Config(format!("malformed TOKENS record: {record}")));
        }
        let chain_id: ChainId =
            fields[0].parse().map_err(|_| EngineError::Config(format!("bad chain id in TOKENS: {record}")))?;
        let symbol = fields[1].to_string();
        let address = Address::from_str(fields[2])
            .map_err(|e| EngineError::Config(format!("bad token address in TOKENS: {e}")))?;
        let decimals: u8 =
            fields[3].parse().map_err(|_| EngineError::Config(format!("bad decimals in TOKENS: {record}")))?;
        let is_bridgeable: bool =
            fields[4].parse().map_err(|_| EngineError::Config(format!("bad bridgeable flag in TOKENS: {record}")))?;
        builder = builder.token(symbol, TokenDescriptor { chain_id, address, decimals, is_bridgeable });
    }

    for record in env_var_opt("DEXES").unwrap_or_default().split(';').map(str::trim).filter(|s| !s.is_empty()) {
        let fields: Vec<&str> = record.split(':').collect();
        if fields.len() < 4 {
            return Err(EngineError::Config(format!("malformed DEXES record: {record}")));
        }
        let chain_id: ChainId =
            fields[0].parse().map_err(|_| EngineError::Config(format!("bad chain id in DEXES: {record}")))?;
        let dex_id = fields[1].to_string();
        let router_address = Address::from_str(fields[2])
            .map_err(|e| EngineError::Config(format!("bad router address in DEXES: {e}")))?;
        let protocol_family = match fields[3] {
            "univ2" => ProtocolFamily::UniV2Style,
            "univ3" => ProtocolFamily::UniV3,
            "curve" => ProtocolFamily::Curve,
            other => return Err(EngineError::Config(format!("unknown DEX family '{other}' in DEXES"))),
        };
        let quoter_address = fields
            .get(4)
            .map(|s| Address::from_str(s))
            .transpose()
            .map_err(|e| EngineError::Config(format!("bad quoter address in DEXES: {e}")))?;
        builder = builder.dex(dex_id, DexDescriptor { dex_id: fields[1].to_string(), chain_id, router_address, protocol_family, quoter_address });
    }

    for record in env_var_opt("DEX_PAIRS").unwrap_or_default().split(';').map(str::trim).filter(|s| !s.is_empty()) {
        let fields: Vec<&str> = record.split(':').collect();
        if fields.len() != 3 {
            return Err(EngineError::Config(format!("malformed DEX_PAIRS record: {record}")));
        }
        let chain_id: ChainId =
            fields[0].parse().map_err(|_| EngineError::Config(format!("bad chain id in DEX_PAIRS: {record}")))?;
        builder = builder.dex_pair(chain_id, fields[1], fields[2]);
    }

    Ok(builder.build())
}

fn load_chain_descriptor(name: &str, single_enabled_chain: ChainId) -> EngineResult<ChainDescriptor> {
    let upper = name.to_ascii_uppercase();
    let rpc_url = env_var(&format!("RPC_{upper}"))?;
    let rpc_url_backup = env_var_opt(&format!("RPC_{upper}_BACKUP"));
    let ws_url = env_var_opt(&format!("WS_{upper}"));
    let chain_id: ChainId = env_var(&format!("CHAIN_ID_{upper}"))?
        .parse()
        .map_err(|_| EngineError::Config(format!("invalid CHAIN_ID_{upper}")))?;
    let native_symbol = env_var_opt(&format!("NATIVE_SYMBOL_{upper}")).unwrap_or_else(|| "ETH".into());
    let gas_pricing_mode = match env_var_opt(&format!("GAS_MODE_{upper}")).as_deref() {
        Some("legacy") | Some("LEGACY") => GasPricingMode::Legacy,
        _ => GasPricingMode::Eip1559,
    };
    let block_time_hint_ms = env_parse_or(&format!("BLOCK_TIME_MS_{upper}"), 2_000u64)?;

    Ok(ChainDescriptor {
        chain_id,
        name: name.to_string(),
        rpc_url,
        rpc_url_backup,
        ws_url,
        native_symbol,
        gas_pricing_mode,
        block_time_hint_ms,
        execution_enabled: chain_id == single_enabled_chain,
    })
}

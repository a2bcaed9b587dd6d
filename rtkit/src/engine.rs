//! Reading the engine descriptor (`config.json`) that a model build writes into its engine
//! directory, and using it to size the tokenizer.
//!
//! The tokenizer trusts the sizes found here without re-deriving them from the model.
use crate::Result;
use anyhow::Context;
use ranktok::{TokenInt, Tokenizer, TokenizerConfig};
use serde::Deserialize;
use std::path::Path;
use tracing::*;

/// Name of the descriptor file inside an engine directory
pub const ENGINE_CONFIG_FILE: &str = "config.json";

/// The parts of an engine descriptor relevant to tokenizing and generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Model architecture, e.g. `LlamaForCausalLM`.  Engines built by older tool versions only
    /// record a short model name here, e.g. `gpt`.
    pub architecture: String,

    /// Model family variant, for the architectures that have one (`chatglm_version` for ChatGLM,
    /// `qwen_type` for QWen)
    pub model_version: Option<String>,

    pub vocab_size: Option<usize>,

    /// For encoder/decoder models, the token generation starts from
    pub decoder_start_token_id: Option<TokenInt>,

    /// In-flight batching needs the attention plugin, padding removal and a paged KV cache
    pub supports_inflight_batching: bool,
}

#[derive(Deserialize)]
struct RawEngineConfig {
    /// Only present in descriptors written by current tool versions
    version: Option<String>,
    pretrained_config: Option<PretrainedConfig>,
    builder_config: Option<BuilderConfig>,
    build_config: Option<BuildConfig>,
    plugin_config: Option<PluginConfig>,
}

#[derive(Deserialize)]
struct PretrainedConfig {
    architecture: String,
    vocab_size: Option<usize>,
    decoder_start_token_id: Option<TokenInt>,
    chatglm_version: Option<String>,
    qwen_type: Option<String>,
}

#[derive(Deserialize)]
struct BuilderConfig {
    name: String,
    vocab_size: Option<usize>,
}

#[derive(Deserialize)]
struct BuildConfig {
    plugin_config: Option<PluginConfig>,
}

#[derive(Deserialize)]
struct PluginConfig {
    /// Either a dtype name such as `"float16"`, `"disable"`, a bool, or null
    #[serde(default)]
    gpt_attention_plugin: serde_json::Value,
    #[serde(default)]
    remove_input_padding: bool,
    #[serde(default)]
    paged_kv_cache: bool,
}

impl PluginConfig {
    fn supports_inflight_batching(&self) -> bool {
        let attention_plugin = match &self.gpt_attention_plugin {
            serde_json::Value::String(dtype) => dtype != "disable",
            serde_json::Value::Bool(enabled) => *enabled,
            _ => false,
        };

        attention_plugin && self.remove_input_padding && self.paged_kv_cache
    }
}

impl EngineConfig {
    /// Read the descriptor from an engine directory
    pub fn read(engine_dir: impl AsRef<Path>) -> Result<Self> {
        let path = engine_dir.as_ref().join(ENGINE_CONFIG_FILE);
        debug!(path = %path.display(), "Reading engine config");

        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("Error reading engine config '{}'", path.display()))?;

        Self::from_json(&json)
            .with_context(|| format!("Invalid engine config '{}'", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawEngineConfig = serde_json::from_str(json)?;

        let plugin_config = raw
            .build_config
            .and_then(|build| build.plugin_config)
            .or(raw.plugin_config);
        let supports_inflight_batching = plugin_config
            .as_ref()
            .map(PluginConfig::supports_inflight_batching)
            .unwrap_or(false);

        match (raw.version, raw.pretrained_config, raw.builder_config) {
            (Some(_), Some(pretrained), _) => {
                let model_version = match pretrained.architecture.as_str() {
                    "ChatGLMForCausalLM" => pretrained.chatglm_version,
                    "QWenForCausalLM" => pretrained.qwen_type,
                    _ => None,
                };

                Ok(Self {
                    architecture: pretrained.architecture,
                    model_version,
                    vocab_size: pretrained.vocab_size,
                    decoder_start_token_id: pretrained.decoder_start_token_id,
                    supports_inflight_batching,
                })
            }
            (None, _, Some(builder)) => Ok(Self {
                architecture: builder.name,
                model_version: None,
                vocab_size: builder.vocab_size,
                decoder_start_token_id: None,
                supports_inflight_batching,
            }),
            (Some(version), None, _) => {
                anyhow::bail!("Engine config version {version} has no pretrained_config")
            }
            (None, _, None) => {
                anyhow::bail!("Engine config has neither a version nor a builder_config")
            }
        }
    }

    /// Size `config` to match this engine, if the engine records its vocabulary size
    pub fn apply_to(&self, config: TokenizerConfig) -> TokenizerConfig {
        match self.vocab_size {
            Some(vocab_size) => {
                if vocab_size != config.vocab_size {
                    debug!(
                        configured = config.vocab_size,
                        engine = vocab_size,
                        "Using vocab size from engine config"
                    );
                }
                TokenizerConfig {
                    vocab_size,
                    ..config
                }
            }
            None => config,
        }
    }
}

/// A tokenizer plus the ids the generation loop needs from it.
#[derive(Clone, Debug)]
pub struct LoadedTokenizer {
    pub tokenizer: Tokenizer,

    /// Padding uses the EOS id; there's no dedicated padding token
    pub pad_id: TokenInt,

    /// Generation stops at this id
    pub end_id: TokenInt,
}

/// Build a tokenizer for `config`, sized by the engine descriptor if one is given.
pub fn load_tokenizer(
    config: TokenizerConfig,
    engine: Option<&EngineConfig>,
) -> Result<LoadedTokenizer> {
    let config = match engine {
        Some(engine) => engine.apply_to(config),
        None => config,
    };
    let vocab_path = config.vocab_path.clone();

    let tokenizer = Tokenizer::new(config)
        .with_context(|| format!("Error loading tokenizer from '{}'", vocab_path.display()))?;

    Ok(LoadedTokenizer {
        pad_id: tokenizer.pad(),
        end_id: tokenizer.eod(),
        tokenizer,
    })
}

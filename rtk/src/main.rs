use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use ranktok::{SpecialTokenDecoding, TokenInt, TokenPiece, TokenizerConfig};
use rtkit::stream::IncrementalDecoder;
use rtkit::throttle::ThrottleExt;
use rtkit::{defaults, EngineConfig, LoadedTokenizer};
use std::io::{Read, Write};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::exit;
use tracing::*;
use tracing_subscriber::{filter::LevelFilter, EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    globals: Globals,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Globals {
    /// Read tokenizer settings from a JSON file.
    ///
    /// Any setting given on the command line overrides the one in the file.
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Turn debugging information on
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    debug: u8,
}

/// Options that say which tokenizer to construct
#[derive(Args, Debug)]
struct TokenizerArgs {
    /// JSON vocabulary file of `{rank, token_bytes, token_str}` records
    #[arg(long, value_name = "FILE", env = "RTK_VOCAB")]
    vocab: Option<PathBuf>,

    /// Total number of token ids, special tokens included
    #[arg(long)]
    vocab_size: Option<usize>,

    /// Number of ids reserved for special tokens at the bottom of the id space
    #[arg(long)]
    num_special_tokens: Option<usize>,

    /// Special token label; repeat for each label, in id order
    #[arg(long = "special-token", value_name = "LABEL")]
    special_tokens: Vec<String>,

    /// What decoding does with special ids other than BOS and EOS (reject, skip, label)
    #[arg(long)]
    special_token_decoding: Option<SpecialTokenDecoding>,

    /// Engine directory whose `config.json` determines the vocabulary size
    #[arg(long, value_name = "DIR")]
    engine_dir: Option<PathBuf>,
}

impl TokenizerArgs {
    /// Combine the config file (if any) with the command line into a tokenizer
    fn load(&self, globals: &Globals) -> anyhow::Result<LoadedTokenizer> {
        let mut config = match &globals.config {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("Error reading config '{}'", path.display()))?;
                serde_json::from_str::<TokenizerConfig>(&json)
                    .with_context(|| format!("Error parsing config '{}'", path.display()))?
            }
            None => TokenizerConfig::default(),
        };

        if let Some(vocab) = &self.vocab {
            config.vocab_path = vocab.clone();
        }
        if let Some(vocab_size) = self.vocab_size {
            config.vocab_size = vocab_size;
        }
        if let Some(num_special_tokens) = self.num_special_tokens {
            config.num_special_tokens = num_special_tokens;
        }
        if !self.special_tokens.is_empty() {
            config.special_tokens = Some(self.special_tokens.clone());
        }
        if let Some(policy) = self.special_token_decoding {
            config.special_token_decoding = policy;
        }

        if config.vocab_path.as_os_str().is_empty() {
            anyhow::bail!("No vocabulary file; pass --vocab or set `vocab_path` in the config file");
        }

        let engine = self
            .engine_dir
            .as_ref()
            .map(EngineConfig::read)
            .transpose()?;

        debug!(?config, "Loading tokenizer");
        rtkit::load_tokenizer(config, engine.as_ref())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Encode text into token ids, printed one line per input
    Encode {
        #[command(flatten)]
        tokenizer: TokenizerArgs,

        /// Prepend the BOS token
        #[arg(long)]
        bos: bool,

        /// Append the EOS token
        #[arg(long)]
        eos: bool,

        /// Text to encode.  If not specified, the text is read from stdin.
        text: Option<String>,
    },

    /// Decode token ids back into text
    Decode {
        #[command(flatten)]
        tokenizer: TokenizerArgs,

        /// Token ids to decode
        #[arg(required = true)]
        ids: Vec<TokenInt>,
    },

    /// Print the id space layout of a tokenizer
    Inspect {
        #[command(flatten)]
        tokenizer: TokenizerArgs,

        /// Also print every ordinary token
        #[arg(long)]
        all: bool,
    },

    /// Tokenize files in parallel and print the token count of each
    Files {
        #[command(flatten)]
        tokenizer: TokenizerArgs,

        /// How many files to tokenize at once
        #[arg(long, short = 'j')]
        parallelism: Option<usize>,

        /// Print every token of every file
        #[arg(long)]
        verbose: bool,

        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Summarize the `config.json` descriptor of a built engine
    Engine {
        /// Engine directory
        engine_dir: PathBuf,
    },

    /// Apply a model's default prompt template to some text
    Prompt {
        /// Model architecture name, e.g. `QWenForCausalLM`
        #[arg(long)]
        model: String,

        text: String,
    },

    /// Decode growing prefixes of a token sequence the way a generation loop would, printing
    /// only every Nth step
    Replay {
        #[command(flatten)]
        tokenizer: TokenizerArgs,

        /// Print the decoded text after every this many tokens
        #[arg(long, default_value = "1")]
        interval: NonZeroUsize,

        #[arg(required = true)]
        ids: Vec<TokenInt>,
    },
}

impl Commands {
    async fn execute(self, globals: &Globals) -> anyhow::Result<()> {
        use Commands::*;
        match self {
            Encode {
                tokenizer,
                bos,
                eos,
                text,
            } => {
                let loaded = tokenizer.load(globals)?;
                let text = match text {
                    Some(text) => text,
                    None => {
                        let mut text = String::new();
                        std::io::stdin()
                            .read_to_string(&mut text)
                            .context("Error reading stdin")?;
                        text
                    }
                };

                let ids = loaded.tokenizer.encode(&text, bos, eos);
                let ids = ids.iter().map(|id| id.to_string()).collect::<Vec<_>>();
                println!("{}", ids.join(" "));
            }
            Decode { tokenizer, ids } => {
                let loaded = tokenizer.load(globals)?;
                let text = loaded.tokenizer.decode(&ids)?;
                print!("{text}");
                std::io::stdout().flush()?;
            }
            Inspect { tokenizer, all } => {
                let loaded = tokenizer.load(globals)?;
                let tokenizer = &loaded.tokenizer;

                println!("vocab size:         {}", tokenizer.vocab_size());
                println!("special tokens:     {}", tokenizer.num_special_tokens());
                println!("ordinary tokens:    {}", tokenizer.rank_table().len());
                println!(
                    "unk/bos/eos:        {}/{}/{}",
                    tokenizer.unk(),
                    tokenizer.bos(),
                    tokenizer.eos()
                );
                println!("pad id:             {}", loaded.pad_id);
                println!("decode policy:      {}", tokenizer.special_token_decoding());
                for (id, label) in tokenizer.special_tokens().labels().iter().enumerate() {
                    println!("  {id:>6} {label}");
                }

                if all {
                    for (id, piece) in tokenizer
                        .decoder()
                        .iter()
                        .enumerate()
                        .skip(tokenizer.num_special_tokens())
                    {
                        if let TokenPiece::Ordinary(bytes) = piece {
                            println!("  {id:>6} {:?}", String::from_utf8_lossy(bytes));
                        }
                    }
                }
            }
            Files {
                tokenizer,
                parallelism,
                verbose,
                paths,
            } => {
                let loaded = tokenizer.load(globals)?;
                let parallelism = parallelism.unwrap_or_else(rtkit::default_parallelism);

                let mut results =
                    rtkit::tokenize_files_streaming(loaded.tokenizer, paths, parallelism);
                let mut total = 0;
                while let Some(result) = results.next().await {
                    let (path, tokens) = result?;
                    println!("{}: {} tokens", path.display(), tokens.len());
                    if verbose {
                        for token in &tokens {
                            println!(
                                "  {}..{} {}",
                                token.range.start, token.range.end, token.token
                            );
                        }
                    }
                    total += tokens.len();
                }
                println!("total: {total} tokens");
            }
            Engine { engine_dir } => {
                let engine = EngineConfig::read(&engine_dir)?;

                println!("architecture:       {}", engine.architecture);
                println!(
                    "model version:      {}",
                    engine.model_version.as_deref().unwrap_or("-")
                );
                match engine.vocab_size {
                    Some(vocab_size) => println!("vocab size:         {vocab_size}"),
                    None => println!("vocab size:         -"),
                }
                match engine.decoder_start_token_id {
                    Some(id) => println!("decoder start id:   {id}"),
                    None => println!("decoder start id:   -"),
                }
                println!(
                    "inflight batching:  {}",
                    engine.supports_inflight_batching
                );
                if let Some(dir) = defaults::default_model_dir(&engine.architecture) {
                    println!("default model dir:  {dir}");
                }
            }
            Prompt { model, text } => {
                println!("{}", defaults::apply_prompt_template(&model, &text));
            }
            Replay {
                tokenizer,
                interval,
                ids,
            } => {
                let loaded = tokenizer.load(globals)?;
                let mut decoder = IncrementalDecoder::new(&loaded.tokenizer);

                // Only the steps the throttle lets through are decoded and reported
                let mut text = String::new();
                let mut fed = 0;
                for (step, _) in ids.iter().enumerate().throttle(interval) {
                    text.push_str(&decoder.push(&ids[fed..=step])?);
                    fed = step + 1;
                    println!("{:>6} {text:?}", step + 1);
                }

                let rest = decoder.finish()?;
                if !rest.is_empty() {
                    text.push_str(&rest);
                    println!("{:>6} {text:?}", ids.len());
                }
            }
        }

        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let default_log_directive = match cli.globals.debug {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    // Initialize tracing with JSON formatting and full detail
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default_log_directive.into())
                .from_env_lossy(),
        )
        .json()
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");

    if let Some(config_path) = cli.globals.config.as_deref() {
        debug!("Value for config: {}", config_path.display());
    }

    if let Err(e) = cli.command.execute(&cli.globals).await {
        error!("{:#}", e);
        eprintln!("Error: {e:#}");
        exit(1);
    } else {
        debug!("command executed successfully");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Verify that there aren't any invalid attributes in the CLI specification that can only be
    /// detected at runtime
    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert()
    }

    #[test]
    fn parses_repeated_special_tokens() {
        let cli = Cli::try_parse_from([
            "rtk",
            "encode",
            "--vocab",
            "vocab.json",
            "--special-token",
            "<unk>",
            "--special-token",
            "<s>",
            "--special-token",
            "</s>",
            "--special-token-decoding",
            "label",
            "--bos",
            "hello",
        ])
        .unwrap();

        match cli.command {
            Commands::Encode {
                tokenizer,
                bos,
                eos,
                text,
            } => {
                assert_eq!(vec!["<unk>", "<s>", "</s>"], tokenizer.special_tokens);
                assert_eq!(
                    Some(SpecialTokenDecoding::Label),
                    tokenizer.special_token_decoding
                );
                assert!(bos);
                assert!(!eos);
                assert_eq!(Some("hello".to_string()), text);
            }
            _ => panic!("parsed the wrong command"),
        }
    }

    #[test]
    fn replay_interval_must_be_nonzero() {
        assert!(Cli::try_parse_from(["rtk", "replay", "--interval", "0", "5"]).is_err());
    }
}

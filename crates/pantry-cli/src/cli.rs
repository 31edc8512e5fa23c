//! CLI argument definitions for pantry.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `synthesize` | Produce a recipe from ingredients and/or a dish name |
//! | `breaker` | Inspect, trip or reset provider quota breakers |
//! | `quota` | Show the primary provider's daily quota |
//! | `cache` | Check cache liveness or evict a cached recipe |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--config` | none | JSON configuration document |
//! | `--redis-url` | none | Shared cache location |
//! | `--daily-quota` | `50` | Daily primary provider ceiling |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--strict` | `false` | Treat warnings as failures |
//! | `--log-json` | `false` | Emit logs on stderr as JSON lines |
//!
//! # Examples
//!
//! ```bash
//! pantry synthesize -i egg -i flour --pretty
//! pantry synthesize --dish "Shakshuka" --report
//! pantry breaker trip gemini --ttl-secs 3600
//! pantry cache evict -i egg -i flour
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use pantry_core::{ProviderId, MAX_ENTRY_TTL};

const MAX_TRIP_TTL_SECS: u64 = MAX_ENTRY_TTL.as_secs();

/// Resilient recipe synthesis from the command line.
#[derive(Debug, Parser)]
#[command(
    name = "pantry",
    author,
    version,
    about = "Resilient recipe synthesis CLI",
    long_about = "pantry turns a list of ingredients or a dish name into a complete recipe. \
It tries a generative provider, then a structured recipe API, and finally builds a \
basic recipe locally, so a request always produces a result.\n\
\n\
Provider keys are read from PANTRY_GEMINI_API_KEY, PANTRY_SPOONACULAR_API_KEY and \
PANTRY_UNSPLASH_ACCESS_KEY (or the same names without the PANTRY_ prefix)."
)]
pub struct Cli {
    /// JSON configuration document; environment variables and flags override it.
    #[arg(long, global = true, env = "PANTRY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Redis URL for the shared cache. Without it an in-process cache is used.
    #[arg(long, global = true, env = "PANTRY_REDIS_URL")]
    pub redis_url: Option<String>,

    /// Daily ceiling on primary provider calls.
    #[arg(long, global = true)]
    pub daily_quota: Option<u32>,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Exit with code 5 when the command produced warnings.
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    /// Write logs to stderr as JSON lines instead of text.
    #[arg(long, global = true, default_value_t = false)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Provider selector for breaker commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderArg {
    Gemini,
    Spoonacular,
    Unsplash,
}

impl From<ProviderArg> for ProviderId {
    fn from(value: ProviderArg) -> Self {
        match value {
            ProviderArg::Gemini => ProviderId::Gemini,
            ProviderArg::Spoonacular => ProviderId::Spoonacular,
            ProviderArg::Unsplash => ProviderId::Unsplash,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Synthesize a recipe.
    ///
    /// # Examples
    ///
    ///   pantry synthesize -i egg -i flour
    ///   pantry synthesize --dish "Mushroom Risotto" --report
    Synthesize(SynthesizeArgs),

    /// Provider quota breaker commands.
    Breaker(BreakerArgs),

    /// Show the primary provider quota for this process and breaker states.
    Quota,

    /// Cache commands.
    Cache(CacheArgs),
}

/// Request inputs shared by `synthesize` and `cache evict`.
#[derive(Debug, Args)]
pub struct RequestArgs {
    /// Ingredient to use; repeat for several.
    #[arg(short = 'i', long = "ingredient")]
    pub ingredients: Vec<String>,

    /// Dish name to aim for.
    #[arg(long)]
    pub dish: Option<String>,
}

#[derive(Debug, Args)]
pub struct SynthesizeArgs {
    #[command(flatten)]
    pub request: RequestArgs,

    /// Print the full report (attempt trail, warnings, latency) instead of
    /// just the recipe.
    #[arg(long, default_value_t = false)]
    pub report: bool,
}

#[derive(Debug, Args)]
pub struct BreakerArgs {
    #[command(subcommand)]
    pub command: BreakerCommand,
}

#[derive(Debug, Subcommand)]
pub enum BreakerCommand {
    /// Show every provider's breaker state.
    Status,

    /// Open a provider's breaker so it is skipped until the TTL expires.
    Trip(TripArgs),

    /// Close a provider's breaker before it expires.
    Reset(ResetArgs),
}

#[derive(Debug, Args)]
pub struct TripArgs {
    #[arg(value_enum)]
    pub provider: ProviderArg,

    /// Breaker lifetime in seconds (at most one year); defaults to the
    /// provider's policy.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=MAX_TRIP_TTL_SECS))]
    pub ttl_secs: Option<u64>,
}

#[derive(Debug, Args)]
pub struct ResetArgs {
    #[arg(value_enum)]
    pub provider: ProviderArg,
}

#[derive(Debug, Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Check that the cache backend answers within the liveness timeout.
    Ping,

    /// Remove the cached recipe for a request.
    Evict(RequestArgs),
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn repeated_ingredient_flags_collect_in_order() {
        let cli = Cli::try_parse_from([
            "pantry",
            "synthesize",
            "-i",
            "egg",
            "--ingredient",
            "flour",
            "--report",
        ])
        .expect("parses");

        let Command::Synthesize(args) = cli.command else {
            panic!("expected synthesize");
        };
        assert_eq!(args.request.ingredients, vec!["egg", "flour"]);
        assert!(args.report);
    }

    #[test]
    fn breaker_trip_takes_provider_and_ttl() {
        let cli = Cli::try_parse_from(["pantry", "breaker", "trip", "gemini", "--ttl-secs", "60"])
            .expect("parses");

        let Command::Breaker(BreakerArgs {
            command: BreakerCommand::Trip(args),
        }) = cli.command
        else {
            panic!("expected breaker trip");
        };
        assert_eq!(ProviderId::from(args.provider), ProviderId::Gemini);
        assert_eq!(args.ttl_secs, Some(60));
    }

    #[test]
    fn breaker_trip_rejects_zero_and_oversized_ttl() {
        let zero = Cli::try_parse_from(["pantry", "breaker", "trip", "gemini", "--ttl-secs", "0"]);
        let huge = u64::MAX.to_string();
        let oversized = Cli::try_parse_from([
            "pantry",
            "breaker",
            "trip",
            "gemini",
            "--ttl-secs",
            huge.as_str(),
        ]);
        let year = MAX_TRIP_TTL_SECS.to_string();
        let at_limit = Cli::try_parse_from([
            "pantry",
            "breaker",
            "trip",
            "unsplash",
            "--ttl-secs",
            year.as_str(),
        ]);

        assert!(zero.is_err());
        assert!(oversized.is_err());
        assert!(at_limit.is_ok());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let result = Cli::try_parse_from(["pantry", "breaker", "reset", "openai"]);
        assert!(result.is_err());
    }
}

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "evalforge",
    version,
    about = "LLM evaluation batches and synthetic monitoring"
)]
pub struct Cli {
    /// SQLite database path
    #[arg(long, global = true, default_value = ".evalforge/forge.db")]
    pub db: PathBuf,

    /// OpenAI-compatible API key enabling the semantic-similarity scorer
    #[arg(long, global = true, env = "EVALFORGE_EMBEDDINGS_KEY", hide_env_values = true)]
    pub embeddings_key: Option<String>,

    /// Embedding model used when --embeddings-key is set
    #[arg(long, global = true, default_value = "text-embedding-3-small")]
    pub embedding_model: String,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Manage inference models
    Model {
        #[command(subcommand)]
        cmd: ModelCmd,
    },
    /// Manage and run evaluations
    Eval {
        #[command(subcommand)]
        cmd: EvalCmd,
    },
    /// Manage external applications
    App {
        #[command(subcommand)]
        cmd: AppCmd,
    },
    /// Manage endpoints of an external application
    Endpoint {
        #[command(subcommand)]
        cmd: EndpointCmd,
    },
    /// Manage and execute synthetic tests
    Synthetic {
        #[command(subcommand)]
        cmd: SyntheticCmd,
    },
    /// List recorded executions
    Executions {
        #[arg(long)]
        test_id: Option<i64>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Metric rollups
    Metrics {
        #[command(subcommand)]
        cmd: MetricsCmd,
    },
    /// Run the interval scheduler for active synthetic tests
    Watch {
        /// Seconds between reconciliation passes against the store
        #[arg(long, default_value_t = 300)]
        sync_interval: u64,
    },
    Version,
}

#[derive(Subcommand)]
pub enum ModelCmd {
    Add {
        #[arg(long)]
        name: String,
        /// Local inference endpoint, e.g. http://localhost:11434
        #[arg(long)]
        endpoint: String,
        /// Target model identifier on the backend
        #[arg(long)]
        target: String,
    },
    List,
    Delete {
        id: i64,
    },
    /// Connectivity check; updates the stored status
    Test {
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum EvalCmd {
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        model_id: i64,
        /// Use the bundled 10-question sample dataset
        #[arg(long, conflicts_with = "dataset")]
        sample: bool,
        /// CSV file with a question,answer header
        #[arg(long)]
        dataset: Option<PathBuf>,
        #[arg(long, default_value_t = 0.7)]
        temperature: f64,
        #[arg(long, default_value_t = 512)]
        max_tokens: u32,
        #[arg(long, default_value_t = 0.9)]
        top_p: f64,
    },
    List,
    Run {
        id: i64,
    },
    Results {
        id: i64,
    },
    Delete {
        id: i64,
    },
}

#[derive(Parser, Clone)]
pub struct AppArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub service: String,
    #[arg(long)]
    pub base_url: String,
    #[arg(long)]
    pub description: Option<String>,
    /// none | api_key | bearer_token
    #[arg(long, default_value = "none")]
    pub auth_method: String,
    #[arg(long)]
    pub secret: Option<String>,
    #[arg(long, default_value = "/health")]
    pub health_endpoint: String,
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,
    #[arg(long)]
    pub no_ssl_verify: bool,
    #[arg(long)]
    pub inactive: bool,
}

#[derive(Subcommand)]
pub enum AppCmd {
    Add(AppArgs),
    List,
    Update {
        id: i64,
        #[command(flatten)]
        args: AppArgs,
    },
    Delete {
        id: i64,
    },
}

#[derive(Parser, Clone)]
pub struct EndpointArgs {
    #[arg(long, default_value = "GET")]
    pub method: String,
    #[arg(long)]
    pub path: String,
    #[arg(long, default_value_t = 200)]
    pub expected_status: u16,
    /// Substring the response body must contain
    #[arg(long)]
    pub contains: Option<String>,
    #[arg(long)]
    pub timeout: Option<u64>,
    #[arg(long)]
    pub inactive: bool,
}

#[derive(Subcommand)]
pub enum EndpointCmd {
    Add {
        #[arg(long)]
        app_id: i64,
        #[command(flatten)]
        args: EndpointArgs,
    },
    List {
        #[arg(long)]
        app_id: i64,
    },
    Update {
        id: i64,
        #[command(flatten)]
        args: EndpointArgs,
    },
    Delete {
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum SyntheticCmd {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        service: String,
        /// uptime | api | browser
        #[arg(long, default_value = "uptime")]
        kind: String,
        #[arg(long)]
        url: String,
        #[arg(long, default_value = "GET")]
        method: String,
        #[arg(long)]
        expected_status: Option<u16>,
        #[arg(long)]
        contains: Option<String>,
        #[arg(long, default_value_t = 30)]
        timeout: u64,
        #[arg(long, default_value_t = 300)]
        interval: u64,
        #[arg(long, default_value = "none")]
        auth_method: String,
        #[arg(long)]
        secret: Option<String>,
        #[arg(long)]
        no_ssl_verify: bool,
    },
    /// Derive a health probe from an external application
    FromApp {
        #[arg(long)]
        app_id: i64,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "uptime")]
        kind: String,
    },
    List,
    Delete {
        id: i64,
    },
    /// Run the probe once and record an execution
    Execute {
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum MetricsCmd {
    /// Rollup over completed evaluations
    Dashboard,
    /// Per-category synthetic rollups over the trailing 24 hours
    Synthetic,
}

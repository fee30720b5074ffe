use clap::Parser;

#[derive(clap::Parser, Debug)]
#[command(author, version, about = "Phishing-risk feature extraction for URLs", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable detailed debug logging (global)
    #[arg(long, global = true, default_value_t = false)]
    pub debug: bool,

    /// Enable verbose logging (global)
    #[arg(long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// JSON engine config file; flags below override it
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<String>,

    /// Skip the reputation probes (their slots stay -1)
    #[arg(long, global = true, default_value_t = false)]
    pub no_reputation: bool,

    /// Accept invalid TLS certificates in the TLS and page probes
    #[arg(long, global = true, default_value_t = false)]
    pub insecure: bool,

    /// WHOIS cache TTL in seconds
    #[arg(long, global = true)]
    pub cache_ttl: Option<u64>,

    /// Blocking worker pool size
    #[arg(long, global = true)]
    pub workers: Option<usize>,

    /// Domain blocklist (one per line) for the reputation probes
    #[arg(long, global = true, value_name = "FILE")]
    pub blocklist: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Extract the feature vector for one URL
    Extract {
        /// URL to analyze; http:// is assumed when no scheme is given
        url: String,

        /// Print the full JSON report instead of name = value lines
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Extract features for every URL in a newline-delimited file
    Batch {
        /// Input file (blank lines and # comments are skipped)
        input: String,

        /// Output directory
        #[arg(short = 'o', long, default_value = "./results")]
        out: String,

        /// URLs analyzed at the same time
        #[arg(short = 'c', long, default_value_t = 8_usize)]
        concurrency: usize,
    },
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}

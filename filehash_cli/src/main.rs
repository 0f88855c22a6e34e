use crate::init_config::CmdConfig;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::InfoLevel;
use std::path::PathBuf;

mod cmd;
mod config;
mod init_config;
mod sources;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// task config file; relative paths inside it resolve against its directory
    #[arg(
        short,
        long,
        value_name = "PATH",
        default_value = "filehash.toml",
        global = true
    )]
    config: PathBuf,

    #[command(flatten)]
    verbosity: clap_verbosity_flag::Verbosity<InfoLevel>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Modify the task config file
    Config {
        #[command(subcommand)]
        cmd: CmdConfig,
    },
    /// Fingerprint, rename and map every configured target
    Run {
        /// Only run these targets, in the given order
        #[arg(value_name = "TARGET")]
        targets: Vec<String>,
    },
    /// Print fingerprints of individual files
    Hash {
        /// digest algorithm (md5, sha1, sha224, sha256, sha384, sha512, blake3)
        #[arg(short, long, default_value = filehash_core::options::DEFAULT_ALGORITHM)]
        algorithm: String,
        /// number of hex characters to keep
        #[arg(long, value_name = "N", default_value_t = filehash_core::options::DEFAULT_HASHLEN)]
        hashlen: usize,
        /// decode contents with this text encoding before hashing
        #[arg(short, long)]
        encoding: Option<String>,
        /// appended to the content before hashing
        #[arg(short, long)]
        salt: Option<String>,
        /// use file metadata instead of contents, optionally with a custom template
        #[arg(
            long,
            value_name = "TEMPLATE",
            num_args = 0..=1,
            default_missing_value = filehash_core::options::DEFAULT_ETAG
        )]
        etag: Option<String>,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .with_writer(std::io::stderr)
        .init();

    cmd::run_command(cli.config, cli.cmd).await
}

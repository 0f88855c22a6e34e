use std::path::PathBuf;

use anyhow::Result;

mod hash;
mod run;

pub use hash::{HashArgs, run_hash};
pub use run::run_targets;

pub async fn run_command(config_file: PathBuf, cmd: crate::Commands) -> Result<()> {
    match cmd {
        crate::Commands::Config { cmd } => cmd.run(config_file),
        crate::Commands::Run { targets } => run_targets(&config_file, &targets).await,
        crate::Commands::Hash {
            algorithm,
            hashlen,
            encoding,
            salt,
            etag,
            files,
        } => {
            let args = HashArgs {
                algorithm,
                hashlen,
                encoding,
                salt,
                etag,
            };
            run_hash(args, &files).await
        }
    }
}

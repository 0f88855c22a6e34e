use std::path::PathBuf;

use anyhow::{Result, bail};
use filehash_core::{Fingerprinter, Options, Renderer, TemplateSetting};
use filehash_store_local::LocalStore;

pub struct HashArgs {
    pub algorithm: String,
    pub hashlen: usize,
    pub encoding: Option<String>,
    pub salt: Option<String>,
    pub etag: Option<String>,
}

impl HashArgs {
    fn options(self) -> Options {
        Options {
            algorithm: self.algorithm,
            hashlen: self.hashlen,
            encoding: self.encoding,
            salt: self.salt,
            etag: match self.etag {
                Some(template) => TemplateSetting::Template(template),
                None => TemplateSetting::Switch(false),
            },
            ..Options::default()
        }
    }
}

/// Prints `<fingerprint>  <path>` for every file, like `md5sum`.
pub async fn run_hash(args: HashArgs, files: &[PathBuf]) -> Result<()> {
    let settings = args.options().compile(&Renderer::default())?;
    let fingerprinter = Fingerprinter::new(settings.mode);
    let store = LocalStore::new(".");

    let mut failed = 0;
    for file in files {
        let path = file.to_string_lossy();
        match fingerprinter.fingerprint(&store, &path).await {
            Ok(fingerprint) => println!("{fingerprint}  {path}"),
            Err(err) => {
                tracing::error!("{err:#}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} files could not be fingerprinted", files.len());
    }
    Ok(())
}

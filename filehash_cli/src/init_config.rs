use std::{fs, io::Write, path::PathBuf};

use anyhow::Context;
use clap::Subcommand;
use filehash_core::options::{DEFAULT_ALGORITHM, DEFAULT_HASHLEN, DEFAULT_MAPPING};
use toml_edit::{Array, DocumentMut, Item, Table, value};
use tracing::info;

#[derive(Subcommand)]
pub enum CmdConfig {
    /// Creates the config file if it doesn't exist and fills in missing defaults
    Init,
}

impl CmdConfig {
    pub fn run(self, config_file: PathBuf) -> anyhow::Result<()> {
        let mut doc = if config_file.exists() {
            fs::read_to_string(&config_file)?
        } else {
            if let Some(parent) = config_file.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent)?;
            }
            "".to_owned()
        }
        .parse::<DocumentMut>()
        .context("could not parse config file")?;

        match self {
            Self::Init => {
                let options = doc
                    .entry("options")
                    .or_insert(Item::Table(Table::new()))
                    .as_table_mut()
                    .context("`options` must be a table")?;
                if !options.contains_key("algorithm") {
                    options.insert("algorithm", value(DEFAULT_ALGORITHM));
                }
                if !options.contains_key("hashlen") {
                    options.insert("hashlen", value(DEFAULT_HASHLEN as i64));
                }
                if !options.contains_key("mapping") && !options.contains_key("output") {
                    options.insert("mapping", value(DEFAULT_MAPPING));
                }

                let targets = doc
                    .entry("target")
                    .or_insert(Item::Table(Table::new()))
                    .as_table_mut()
                    .context("`target` must be a table")?;
                targets.set_implicit(true);
                if targets.is_empty() {
                    info!("adding example target `assets`");
                    let mut src = Array::new();
                    src.push("**/*.css");
                    src.push("**/*.js");
                    let mut assets = Table::new();
                    assets.insert("cwd", value("static"));
                    assets.insert("dest", value("dist"));
                    assets.insert("src", value(src));
                    targets.insert("assets", Item::Table(assets));
                }
            }
        }

        info!("writing to config file {config_file:?}");

        let tmp_path = config_file.with_extension("tmp");
        let mut tmp = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        tmp.write_all(doc.to_string().as_bytes())?;
        tmp.sync_all()?;
        fs::rename(&tmp_path, config_file)?;
        Ok(())
    }
}

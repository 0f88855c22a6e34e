use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::encoding::{TextEncoding, UnknownEncoding};
use crate::template::{Renderer, Template, TemplateError};

pub const DEFAULT_ALGORITHM: &str = "md5";
pub const DEFAULT_HASHLEN: usize = 10;
pub const DEFAULT_CONCURRENCY: usize = 16;
pub const DEFAULT_ETAG: &str = "{{= size}}-{{= +mtime}}";
pub const DEFAULT_RENAME: &str = "{{= dirname}}/{{= basename}}.{{= hash}}{{= extname}}";
pub const DEFAULT_MAPPING: &str = "{{= dest}}/hash.json";
pub const DEFAULT_MAPPING_KEY: &str = "{{= cwd}}/{{= dirname}}/{{= basename}}{{= extname}}";
pub const DEFAULT_MAPPING_VALUE: &str =
    "{{= dest}}/{{= dirname}}/{{= basename}}.{{= hash}}{{= extname}}";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OptionsError {
    #[error("unsupported hash algorithm {0:?}")]
    UnknownAlgorithm(String),

    #[error(transparent)]
    UnknownEncoding(#[from] UnknownEncoding),

    #[error("invalid `{option}` template: {source}")]
    Template {
        option: &'static str,
        #[source]
        source: TemplateError,
    },
}

/// Digest algorithms usable for content fingerprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    Blake3,
}

impl Algorithm {
    /// Length of the full hex digest.
    pub fn hex_len(self) -> usize {
        match self {
            Algorithm::Md5 => 32,
            Algorithm::Sha1 => 40,
            Algorithm::Sha224 => 56,
            Algorithm::Sha256 | Algorithm::Blake3 => 64,
            Algorithm::Sha384 => 96,
            Algorithm::Sha512 => 128,
        }
    }
}

impl FromStr for Algorithm {
    type Err = OptionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "md5" => Ok(Algorithm::Md5),
            "sha1" => Ok(Algorithm::Sha1),
            "sha224" => Ok(Algorithm::Sha224),
            "sha256" => Ok(Algorithm::Sha256),
            "sha384" => Ok(Algorithm::Sha384),
            "sha512" => Ok(Algorithm::Sha512),
            "blake3" => Ok(Algorithm::Blake3),
            _ => Err(OptionsError::UnknownAlgorithm(s.to_owned())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Algorithm::Md5 => "md5",
            Algorithm::Sha1 => "sha1",
            Algorithm::Sha224 => "sha224",
            Algorithm::Sha256 => "sha256",
            Algorithm::Sha384 => "sha384",
            Algorithm::Sha512 => "sha512",
            Algorithm::Blake3 => "blake3",
        })
    }
}

/// An option that is either a boolean switch or a template string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemplateSetting {
    Switch(bool),
    Template(String),
}

impl TemplateSetting {
    pub fn template(s: impl Into<String>) -> Self {
        TemplateSetting::Template(s.into())
    }

    /// The template to use: `true` selects `default`, `false` and the empty
    /// string select nothing.
    pub fn resolve<'a>(&'a self, default: &'a str) -> Option<&'a str> {
        match self {
            TemplateSetting::Switch(true) => Some(default),
            TemplateSetting::Switch(false) => None,
            TemplateSetting::Template(s) if s.is_empty() => None,
            TemplateSetting::Template(s) => Some(s),
        }
    }
}

/// Per-task configuration. Keys accept both `snake_case` and the
/// camelCase spellings used by existing task files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub algorithm: String,
    pub hashlen: usize,
    pub encoding: Option<String>,
    pub salt: Option<String>,
    pub etag: TemplateSetting,
    pub rename: TemplateSetting,
    pub keep: bool,
    #[serde(alias = "output")]
    pub mapping: TemplateSetting,
    #[serde(alias = "mappingKey")]
    pub mapping_key: TemplateSetting,
    #[serde(alias = "mappingValue")]
    pub mapping_value: TemplateSetting,
    pub merge: bool,
    pub concurrency: usize,
    #[serde(alias = "failFast")]
    pub fail_fast: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            algorithm: DEFAULT_ALGORITHM.to_owned(),
            hashlen: DEFAULT_HASHLEN,
            encoding: None,
            salt: None,
            etag: TemplateSetting::Switch(false),
            rename: TemplateSetting::template(DEFAULT_RENAME),
            keep: true,
            mapping: TemplateSetting::template(DEFAULT_MAPPING),
            mapping_key: TemplateSetting::template(DEFAULT_MAPPING_KEY),
            mapping_value: TemplateSetting::template(DEFAULT_MAPPING_VALUE),
            merge: false,
            concurrency: DEFAULT_CONCURRENCY,
            fail_fast: false,
        }
    }
}

/// How a fingerprint is computed.
#[derive(Debug, Clone)]
pub enum FingerprintMode {
    Hash {
        algorithm: Algorithm,
        hashlen: usize,
        encoding: Option<TextEncoding>,
        salt: Option<Vec<u8>>,
    },
    Etag(Template),
}

/// [`Options`] validated and with every template compiled.
#[derive(Debug, Clone)]
pub struct Settings {
    pub mode: FingerprintMode,
    pub rename: Option<Template>,
    pub keep: bool,
    pub mapping: Option<Template>,
    pub mapping_key: Option<Template>,
    pub mapping_value: Option<Template>,
    pub merge: bool,
    pub concurrency: usize,
    pub fail_fast: bool,
}

impl Options {
    /// Validates the options and compiles their templates with `renderer`.
    pub fn compile(&self, renderer: &Renderer) -> Result<Settings, OptionsError> {
        let compile = |option: &'static str, setting: &TemplateSetting, default: &str| {
            setting
                .resolve(default)
                .map(|source| renderer.compile(source))
                .transpose()
                .map_err(|source| OptionsError::Template { option, source })
        };

        let mode = match compile("etag", &self.etag, DEFAULT_ETAG)? {
            Some(template) => FingerprintMode::Etag(template),
            None => FingerprintMode::Hash {
                algorithm: self.algorithm.parse::<Algorithm>()?,
                hashlen: self.hashlen,
                encoding: self
                    .encoding
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .map(str::parse::<TextEncoding>)
                    .transpose()?,
                salt: self
                    .salt
                    .as_ref()
                    .filter(|s| !s.is_empty())
                    .map(|s| s.as_bytes().to_vec()),
            },
        };

        Ok(Settings {
            mode,
            rename: compile("rename", &self.rename, DEFAULT_RENAME)?,
            keep: self.keep,
            mapping: compile("mapping", &self.mapping, DEFAULT_MAPPING)?,
            mapping_key: compile("mapping_key", &self.mapping_key, DEFAULT_MAPPING_KEY)?,
            mapping_value: compile("mapping_value", &self.mapping_value, DEFAULT_MAPPING_VALUE)?,
            merge: self.merge,
            concurrency: self.concurrency.max(1),
            fail_fast: self.fail_fast,
        })
    }
}

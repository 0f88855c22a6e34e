//! Derivation of rename targets and mapping entries from templates.

use crate::template::{Template, Vars};

/// The paths derived for one fingerprinted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPlan {
    /// Source path as listed in the group, relative to `cwd`.
    pub source: String,
    /// Source path resolved against `cwd`.
    pub resolved: String,
    /// Where the fingerprinted copy goes; `None` when the group has no `dest`.
    pub target: Option<String>,
    pub key: String,
    pub value: String,
}

/// Builds template variables from a source path and its group context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathDeriver {
    cwd: Option<String>,
    dest: Option<String>,
}

impl PathDeriver {
    pub fn new(cwd: Option<String>, dest: Option<String>) -> Self {
        Self { cwd, dest }
    }

    pub fn dest(&self) -> Option<&str> {
        self.dest.as_deref()
    }

    /// `source` joined onto `cwd`, normalized like every derived target.
    pub fn resolve(&self, source: &str) -> String {
        match &self.cwd {
            Some(cwd) => join(cwd, source),
            None => normalize(source),
        }
    }

    /// `{cwd, dest}`; absent directories render as `.`.
    pub fn group_vars(&self) -> Vars {
        Vars::new()
            .with("cwd", self.cwd.as_deref().unwrap_or("."))
            .with("dest", self.dest.as_deref().unwrap_or("."))
    }

    /// `{cwd, dest, hash, extname, dirname, basename}` for one file.
    pub fn file_vars(&self, source: &str, fingerprint: &str) -> Vars {
        let (dirname, basename, extname) = split_path(source);
        let mut vars = self.group_vars();
        vars.insert("hash", fingerprint);
        vars.insert("dirname", dirname);
        vars.insert("basename", basename);
        vars.insert("extname", extname);
        vars
    }

    /// Renders `template` for one file; without a template the source path
    /// is returned unchanged.
    pub fn derive(&self, template: Option<&Template>, source: &str, fingerprint: &str) -> String {
        match template {
            Some(template) => normalize(&template.render(&self.file_vars(source, fingerprint))),
            None => source.to_owned(),
        }
    }

    pub fn plan(
        &self,
        templates: &PlanTemplates<'_>,
        source: &str,
        fingerprint: &str,
    ) -> PathPlan {
        let target = self.dest.as_deref().map(|dest| {
            join(dest, &self.derive(templates.rename, source, fingerprint))
        });
        PathPlan {
            source: source.to_owned(),
            resolved: self.resolve(source),
            target,
            key: self.derive(templates.key, source, fingerprint),
            value: self.derive(templates.value, source, fingerprint),
        }
    }
}

/// The three independently configurable templates of a [`PathPlan`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanTemplates<'a> {
    pub rename: Option<&'a Template>,
    pub key: Option<&'a Template>,
    pub value: Option<&'a Template>,
}

/// Splits a `/`-separated path into `(dirname, basename, extname)`.
///
/// `dirname` is `.` for a bare file name, `basename` has no extension and
/// `extname` keeps its leading dot. A leading dot alone (`.htaccess`) is not
/// an extension.
pub fn split_path(path: &str) -> (String, String, String) {
    let trimmed = path.trim_end_matches('/');
    let (dirname, file) = match trimmed.rfind('/') {
        Some(0) => ("/".to_owned(), &trimmed[1..]),
        Some(i) => (trimmed[..i].to_owned(), &trimmed[i + 1..]),
        None => (".".to_owned(), trimmed),
    };
    match file.rfind('.') {
        Some(i) if i > 0 => (dirname, file[..i].to_owned(), file[i..].to_owned()),
        _ => (dirname, file.to_owned(), String::new()),
    }
}

/// The extension of `path`, as in [`split_path`].
pub fn extname(path: &str) -> String {
    split_path(path).2
}

pub fn join(base: &str, path: &str) -> String {
    normalize(&format!("{base}/{path}"))
}

/// Normalizes a `/`-separated path: repeated separators collapse, `.`
/// segments vanish and `..` pops a preceding segment when there is one. A
/// leading URL scheme (`https://`) is kept as is.
pub fn normalize(path: &str) -> String {
    let (scheme, rest) = split_scheme(path);
    let absolute = rest.starts_with('/');

    let mut segments: Vec<&str> = Vec::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if absolute => {}
                _ => segments.push(".."),
            },
            s => segments.push(s),
        }
    }

    let body = segments.join("/");
    match (scheme, absolute) {
        (Some(scheme), _) => format!("{scheme}{body}"),
        (None, true) => format!("/{body}"),
        (None, false) if body.is_empty() => ".".to_owned(),
        (None, false) => body,
    }
}

fn split_scheme(path: &str) -> (Option<&str>, &str) {
    if let Some(i) = path.find("://") {
        let scheme = &path[..i];
        let mut chars = scheme.chars();
        let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if valid {
            return (Some(&path[..i + 3]), &path[i + 3..]);
        }
    }
    (None, path)
}

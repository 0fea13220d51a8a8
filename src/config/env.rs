use std::collections::BTreeMap;
use std::path::Path;

/// Where configuration values come from: the process environment, optionally
/// backed by a dotenv-style file. Process variables win over the file.
///
/// Names are looked up in upper case first, then lower case.
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    file_vars: BTreeMap<String, String>,
    use_process_env: bool,
}

impl EnvSource {
    /// Read from the process environment only.
    pub const fn process() -> Self {
        Self {
            file_vars: BTreeMap::new(),
            use_process_env: true,
        }
    }

    /// Read from the process environment, falling back to the given file.
    pub fn with_file(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("reading env file {}: {e}", path.display()))?;
        Ok(Self {
            file_vars: parse_env_file(&contents),
            use_process_env: true,
        })
    }

    /// Read only from the given pairs; the process environment is ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            file_vars: pairs
                .into_iter()
                .map(|(k, v)| (k.as_ref().to_uppercase(), v.into()))
                .collect(),
            use_process_env: false,
        }
    }

    /// Value for `name`, or `None` if unset or empty.
    pub fn get(&self, name: &str) -> Option<String> {
        let from_process = || {
            std::env::var(name)
                .ok()
                .or_else(|| std::env::var(name.to_lowercase()).ok())
        };
        self.use_process_env
            .then(from_process)
            .flatten()
            .or_else(|| self.file_vars.get(&name.to_uppercase()).cloned())
            .filter(|v| !v.is_empty())
    }

    pub fn require(&self, name: &str) -> Result<String, String> {
        self.get(name)
            .ok_or_else(|| format!("missing required setting {name}"))
    }

    /// Positive port number. `0` is rejected.
    pub fn require_port(&self, name: &str) -> Result<u16, String> {
        let raw = self.require(name)?;
        let port = raw
            .parse::<u16>()
            .map_err(|e| format!("invalid {name}: {e}"))?;
        if port == 0 {
            return Err(format!("invalid {name}: must be a positive port number"));
        }
        Ok(port)
    }

    pub fn parse_or<T>(&self, name: &str, default: T) -> Result<T, String>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(name).map_or(Ok(default), |v| {
            v.parse::<T>().map_err(|e| format!("invalid {name}: {e}"))
        })
    }
}

/// Parse `KEY=VALUE` lines. Blank lines and `#` comments are skipped, an
/// optional `export ` prefix is dropped, and matching surrounding quotes are
/// stripped from values. Keys are upper-cased.
pub fn parse_env_file(contents: &str) -> BTreeMap<String, String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            Some((key.trim().to_uppercase(), unquote(value.trim()).to_string()))
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_env_file_basic() {
        let vars = parse_env_file(
            "# settings\nVERSION=4.0.4\n\nexport environment = test\nmodels_repository__directory=\"resources\"\nQUOTED='single'\nnot a pair\n",
        );
        assert_eq!(vars.get("VERSION").map(String::as_str), Some("4.0.4"));
        assert_eq!(vars.get("ENVIRONMENT").map(String::as_str), Some("test"));
        assert_eq!(
            vars.get("MODELS_REPOSITORY__DIRECTORY").map(String::as_str),
            Some("resources")
        );
        assert_eq!(vars.get("QUOTED").map(String::as_str), Some("single"));
        assert_eq!(vars.len(), 4);
    }

    #[test]
    fn from_pairs_is_case_insensitive() {
        let src = EnvSource::from_pairs([("models_repository__source", "fs")]);
        assert_eq!(src.get("MODELS_REPOSITORY__SOURCE").as_deref(), Some("fs"));
        assert_eq!(src.get("models_repository__source").as_deref(), Some("fs"));
    }

    #[test]
    fn empty_values_count_as_missing() {
        let src = EnvSource::from_pairs([("VERSION", "")]);
        assert!(src.get("VERSION").is_none());
        assert!(src.require("VERSION").is_err());
    }

    #[test]
    fn require_port_rejects_zero_and_garbage() {
        let src = EnvSource::from_pairs([("A", "0"), ("B", "http"), ("C", "70000"), ("D", "12345")]);
        assert!(src.require_port("A").is_err());
        assert!(src.require_port("B").is_err());
        assert!(src.require_port("C").is_err());
        assert_eq!(src.require_port("D"), Ok(12345));
    }

    #[test]
    fn parse_or_uses_default_when_missing() -> anyhow::Result<()> {
        let src = EnvSource::from_pairs([("PRESENT", "7")]);
        assert_eq!(src.parse_or("PRESENT", 1u32).map_err(|e| anyhow::anyhow!("{e}"))?, 7);
        assert_eq!(src.parse_or("ABSENT", 1u32).map_err(|e| anyhow::anyhow!("{e}"))?, 1);
        Ok(())
    }
}

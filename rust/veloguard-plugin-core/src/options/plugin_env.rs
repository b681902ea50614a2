//! Host-injected overrides.
//!
//! A SIP003 host (shadowsocks) hands the plugin its endpoints through the
//! `SS_REMOTE_HOST`, `SS_REMOTE_PORT`, `SS_LOCAL_HOST` and `SS_LOCAL_PORT`
//! environment variables, and extra options through `SS_PLUGIN_OPTIONS`
//! in the form `key=value;flag;key2=value2` with `\` as escape character.

use crate::error::{Error, Result};
use std::collections::HashMap;

pub const ENV_REMOTE_HOST: &str = "SS_REMOTE_HOST";
pub const ENV_REMOTE_PORT: &str = "SS_REMOTE_PORT";
pub const ENV_LOCAL_HOST: &str = "SS_LOCAL_HOST";
pub const ENV_LOCAL_PORT: &str = "SS_LOCAL_PORT";
pub const ENV_PLUGIN_OPTIONS: &str = "SS_PLUGIN_OPTIONS";

/// Value recorded for an option given without `=value`.
const BARE_KEY_VALUE: &str = "1";

/// Override options keyed by name. A key may be given more than once; the
/// first value is the one that counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginOptions {
    values: HashMap<String, Vec<String>>,
}

impl PluginOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.values.entry(key.into()).or_default().push(value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Read overrides from the process environment.
    ///
    /// Returns `Ok(None)` when the plugin was not launched by a SIP003 host.
    pub fn from_env() -> Result<Option<Self>> {
        let var = |name: &str| std::env::var(name).unwrap_or_default();
        Self::from_vars(
            &var(ENV_REMOTE_HOST),
            &var(ENV_REMOTE_PORT),
            &var(ENV_LOCAL_HOST),
            &var(ENV_LOCAL_PORT),
            &var(ENV_PLUGIN_OPTIONS),
        )
    }

    /// Build overrides from already-read SIP003 variables. All four endpoint
    /// variables must be non-empty, otherwise there are no overrides.
    pub fn from_vars(
        remote_host: &str,
        remote_port: &str,
        local_host: &str,
        local_port: &str,
        plugin_options: &str,
    ) -> Result<Option<Self>> {
        if [remote_host, remote_port, local_host, local_port]
            .iter()
            .any(|v| v.is_empty())
        {
            return Ok(None);
        }

        let mut opts = Self::new();
        opts.add("remoteAddr", remote_host);
        opts.add("remotePort", remote_port);
        opts.add("localAddr", local_host);
        opts.add("localPort", local_port);

        if !plugin_options.is_empty() {
            let extra = Self::parse(plugin_options)?;
            for (key, values) in extra.values {
                opts.values.insert(key, values);
            }
        }

        Ok(Some(opts))
    }

    /// Parse a `SS_PLUGIN_OPTIONS` string.
    pub fn parse(s: &str) -> Result<Self> {
        let mut opts = Self::new();
        let mut rest = s;

        while !rest.is_empty() {
            let (key, stop) = read_unescaped(rest, &['=', ';'])?;
            if key.is_empty() {
                return Err(Error::parse_with_input("empty key in plugin options", rest));
            }

            match stop {
                Some(('=', after)) => {
                    let (value, stop) = read_unescaped(after, &[';'])?;
                    opts.add(key, value);
                    rest = stop.map(|(_, after)| after).unwrap_or("");
                }
                Some((_, after)) => {
                    opts.add(key, BARE_KEY_VALUE);
                    rest = after;
                }
                None => {
                    opts.add(key, BARE_KEY_VALUE);
                    rest = "";
                }
            }
        }

        Ok(opts)
    }
}

/// Read up to the first unescaped delimiter. Returns the unescaped text and,
/// if a delimiter was hit, the delimiter plus the remainder after it.
fn read_unescaped<'a>(s: &'a str, delims: &[char]) -> Result<(String, Option<(char, &'a str)>)> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.char_indices();

    while let Some((idx, c)) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some((_, escaped)) => out.push(escaped),
                None => {
                    return Err(Error::parse_with_input(
                        "nothing following final escape in plugin options",
                        s,
                    ))
                }
            }
        } else if delims.contains(&c) {
            return Ok((out, Some((c, &s[idx + c.len_utf8()..]))));
        } else {
            out.push(c);
        }
    }

    Ok((out, None))
}

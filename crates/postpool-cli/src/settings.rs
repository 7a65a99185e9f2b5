//! Reader for PHP-style settings files.
//!
//! Only lines of the form `define('NAME', 'value');` are understood; every
//! other line is skipped. This is enough to pull tunables out of an existing
//! `config.php` without evaluating it.

use anyhow::{Context, bail};
use regex::Regex;
use std::{collections::HashMap, fs, path::Path};

const DEFINE_PATTERN: &str = r"(?i)^define\('([A-Z_]+)', '?(.*?)'?\);$";

/// A single `define()` value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SettingValue {
    Bool(bool),
    Text(String),
}

impl SettingValue {
    fn parse(raw: &str) -> Self {
        match raw {
            "true" => Self::Bool(true),
            "false" => Self::Bool(false),
            other => Self::Text(other.to_string()),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Settings {
    values: HashMap<String, SettingValue>,
}

impl Settings {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("invalid settings file {}", path.display()))
    }

    /// Later definitions of the same name win.
    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        let define = Regex::new(DEFINE_PATTERN).context("invalid define pattern")?;
        let values = contents
            .lines()
            .filter_map(|line| define.captures(line.trim_end()))
            .map(|caps| (caps[1].to_string(), SettingValue::parse(&caps[2])))
            .collect();
        Ok(Self { values })
    }

    pub fn get(&self, name: &str) -> Option<&SettingValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Reads `name` as a signed integer.
    ///
    /// Returns `Ok(None)` when the name is not defined and an error when it is
    /// defined but not an integer.
    pub fn get_i64(&self, name: &str) -> anyhow::Result<Option<i64>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(SettingValue::Text(text)) => text
                .trim()
                .parse()
                .map(Some)
                .with_context(|| format!("setting {name} is not an integer: {text:?}")),
            Some(SettingValue::Bool(value)) => {
                bail!("setting {name} is a boolean ({value}), expected an integer")
            }
        }
    }
}

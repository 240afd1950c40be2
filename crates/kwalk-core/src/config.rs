//! Profile configuration.
//!
//! Profiles use the block syntax printed by the Linux offset-finder kernel
//! module:
//!
//! ```text
//! ubuntu22 {
//!     ostype = "Linux";
//!     sysmap = "System.map-5.4.0";
//!     linux_name = 0x550;
//!     linux_tasks = 0x3a0;
//!     linux_pid = 0x4a0;
//! }
//! ```
//!
//! `ostype`, `sysmap`, `kaslr_offset`, `dtb` and `phys_base` are settings;
//! every other numeric key is a field offset.

use std::path::{Path, PathBuf};

use crate::{OffsetTable, OsFamily, Pa, SymbolTable, WalkError};

/// A named introspection profile.
#[derive(Debug, Clone)]
pub struct Profile {
    /// The block name.
    pub name: String,

    /// Path to the `System.map` file, if any.
    pub sysmap: Option<PathBuf>,

    /// KASLR slide added to every `System.map` address.
    pub kaslr_offset: u64,

    /// Explicit page-table root.
    pub dtb: Option<Pa>,

    /// Physical load address of the kernel image.
    pub phys_base: u64,

    /// Field offsets.
    pub offsets: OffsetTable,
}

impl Profile {
    /// Returns the OS family of the profile.
    pub fn os(&self) -> OsFamily {
        self.offsets.os()
    }

    /// Loads the symbol table referenced by the profile.
    ///
    /// Profiles without a `sysmap` setting produce an empty table, which
    /// callers may fill with explicit overrides.
    pub fn symbols(&self) -> Result<SymbolTable, WalkError> {
        match &self.sysmap {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading System.map");
                SymbolTable::load_system_map(path, self.kaslr_offset)
            }
            None => {
                tracing::debug!(profile = %self.name, "profile has no System.map");
                Ok(SymbolTable::new())
            }
        }
    }
}

/// A parsed profile configuration file.
#[derive(Debug, Clone, Default)]
pub struct ProfileConfig {
    profiles: Vec<Profile>,
}

impl ProfileConfig {
    /// Parses a configuration from text.
    pub fn parse(text: &str) -> Result<Self, WalkError> {
        Parser::default().parse(text)
    }

    /// Loads a configuration file.
    ///
    /// Relative `sysmap` paths are resolved against the directory containing
    /// the configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WalkError> {
        let path = path.as_ref();
        let mut config = Self::parse(&std::fs::read_to_string(path)?)?;

        if let Some(base) = path.parent() {
            for profile in &mut config.profiles {
                if let Some(sysmap) = &mut profile.sysmap
                    && sysmap.is_relative()
                {
                    *sysmap = base.join(&*sysmap);
                }
            }
        }

        Ok(config)
    }

    /// Returns the profile named `name`, or the first profile if `name` is
    /// `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<&Profile, WalkError> {
        match name {
            Some(name) => self
                .profiles
                .iter()
                .find(|profile| profile.name == name)
                .ok_or_else(|| WalkError::UnknownProfile(name.to_owned())),
            None => self
                .profiles
                .first()
                .ok_or_else(|| WalkError::UnknownProfile(String::from("<empty config>"))),
        }
    }

    /// Returns all profiles in file order.
    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }
}

enum Value {
    Number(u64),
    Text(String),
}

#[derive(Default)]
struct Block {
    name: String,
    line: usize,
    os: Option<OsFamily>,
    sysmap: Option<PathBuf>,
    kaslr_offset: u64,
    dtb: Option<Pa>,
    phys_base: u64,
    offsets: Vec<(String, u64)>,
}

impl Block {
    fn set(&mut self, line: usize, key: &str, value: Value) -> Result<(), WalkError> {
        match (key, value) {
            ("ostype", Value::Text(os)) => {
                let os = os
                    .parse()
                    .map_err(|_| error(line, format!("unknown ostype `{os}`")))?;
                self.os = Some(os);
            }
            ("sysmap", Value::Text(path)) => self.sysmap = Some(PathBuf::from(path)),
            ("kaslr_offset", Value::Number(value)) => self.kaslr_offset = value,
            ("dtb", Value::Number(value)) => self.dtb = Some(Pa(value)),
            ("phys_base", Value::Number(value)) => self.phys_base = value,
            ("ostype" | "sysmap" | "kaslr_offset" | "dtb" | "phys_base", _) => {
                return Err(error(line, format!("invalid value for `{key}`")));
            }
            (_, Value::Number(offset)) => self.offsets.push((key.to_owned(), offset)),
            (_, Value::Text(_)) => {
                tracing::debug!(line, key, "ignoring non-numeric setting");
            }
        }

        Ok(())
    }

    fn finish(self) -> Result<Profile, WalkError> {
        let os = self
            .os
            .ok_or_else(|| error(self.line, format!("profile `{}` has no ostype", self.name)))?;

        Ok(Profile {
            name: self.name,
            sysmap: self.sysmap,
            kaslr_offset: self.kaslr_offset,
            dtb: self.dtb,
            phys_base: self.phys_base,
            offsets: OffsetTable::new(os, self.offsets),
        })
    }
}

#[derive(Default)]
struct Parser {
    profiles: Vec<Profile>,
    current: Option<Block>,
    pending_name: Option<String>,
}

impl Parser {
    fn parse(mut self, text: &str) -> Result<ProfileConfig, WalkError> {
        let mut last_line = 0;

        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            last_line = line;

            let content = strip_comment(raw).trim();
            if content.is_empty() {
                continue;
            }

            self.line(line, content)?;
        }

        if let Some(block) = self.current {
            return Err(error(last_line, format!("unterminated profile `{}`", block.name)));
        }

        if let Some(name) = self.pending_name {
            return Err(error(last_line, format!("profile `{name}` has no body")));
        }

        Ok(ProfileConfig {
            profiles: self.profiles,
        })
    }

    fn line(&mut self, line: usize, content: &str) -> Result<(), WalkError> {
        if content == "}" || content == "};" {
            let block = self
                .current
                .take()
                .ok_or_else(|| error(line, "unexpected `}`"))?;

            self.profiles.push(block.finish()?);
            return Ok(());
        }

        if let Some(name) = content.strip_suffix('{') {
            if self.current.is_some() {
                return Err(error(line, "nested profile blocks are not supported"));
            }

            let name = match name.trim() {
                "" => self
                    .pending_name
                    .take()
                    .ok_or_else(|| error(line, "profile block without a name"))?,
                name => name.to_owned(),
            };

            self.current = Some(Block {
                name,
                line,
                ..Block::default()
            });
            return Ok(());
        }

        let Some(block) = &mut self.current else {
            if self.pending_name.is_some() || content.contains(char::is_whitespace) {
                return Err(error(line, format!("unexpected `{content}` outside a profile")));
            }

            self.pending_name = Some(content.to_owned());
            return Ok(());
        };

        for assignment in content.split(';') {
            let assignment = assignment.trim();
            if assignment.is_empty() {
                continue;
            }

            let (key, value) = assignment
                .split_once('=')
                .ok_or_else(|| error(line, format!("expected `key = value`, found `{assignment}`")))?;

            let key = key.trim();
            if key.is_empty() {
                return Err(error(line, "empty key"));
            }

            block.set(line, key, parse_value(line, value.trim())?)?;
        }

        Ok(())
    }
}

fn parse_value(line: usize, value: &str) -> Result<Value, WalkError> {
    if let Some(text) = value.strip_prefix('"') {
        let text = text
            .strip_suffix('"')
            .ok_or_else(|| error(line, "unterminated string"))?;

        return Ok(Value::Text(text.to_owned()));
    }

    if let Some(hex) = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        return u64::from_str_radix(hex, 16)
            .map(Value::Number)
            .map_err(|_| error(line, format!("invalid hex number `{value}`")));
    }

    if value.starts_with(|c: char| c.is_ascii_digit()) {
        return value
            .parse()
            .map(Value::Number)
            .map_err(|_| error(line, format!("invalid number `{value}`")));
    }

    if value.is_empty() {
        return Err(error(line, "missing value"));
    }

    Ok(Value::Text(value.to_owned()))
}

/// Removes `#` and `//` comments that are not inside a quoted string.
fn strip_comment(line: &str) -> &str {
    let mut in_quotes = false;
    let bytes = line.as_bytes();

    for (index, &byte) in bytes.iter().enumerate() {
        match byte {
            b'"' => in_quotes = !in_quotes,
            b'#' if !in_quotes => return &line[..index],
            b'/' if !in_quotes && bytes.get(index + 1) == Some(&b'/') => return &line[..index],
            _ => {}
        }
    }

    line
}

fn error(line: usize, message: impl Into<String>) -> WalkError {
    WalkError::Config {
        line,
        message: message.into(),
    }
}

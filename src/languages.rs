// SPDX-License-Identifier: MIT OR Apache-2.0

//! Language registry mapping file extensions to snippet languages

use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::errors::{Error, Result};

/// Languages a snippet can be tagged with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Language {
    C,
    Css,
    Csv,
    Html,
    Js,
    Json,
    Jsx,
    Md,
    Py,
    Txt,
    Yaml,
}

/// Extension lookup table (extensions are matched without the leading dot)
static EXTENSIONS: Lazy<HashMap<&'static str, Language>> = Lazy::new(|| {
    let mut table = HashMap::new();

    table.insert("c", Language::C);
    table.insert("h", Language::C);
    table.insert("js", Language::Js);
    table.insert("mjs", Language::Js);
    table.insert("yaml", Language::Yaml);
    table.insert("yml", Language::Yaml);

    // Direct 1:1 matches
    table.insert("css", Language::Css);
    table.insert("csv", Language::Csv);
    table.insert("html", Language::Html);
    table.insert("json", Language::Json);
    table.insert("jsx", Language::Jsx);
    table.insert("md", Language::Md);
    table.insert("py", Language::Py);
    table.insert("txt", Language::Txt);

    table
});

impl Language {
    const ALL: [Language; 11] = [
        Language::C,
        Language::Css,
        Language::Csv,
        Language::Html,
        Language::Js,
        Language::Json,
        Language::Jsx,
        Language::Md,
        Language::Py,
        Language::Txt,
        Language::Yaml,
    ];

    /// All known languages in declaration order
    pub fn all() -> &'static [Language] {
        &Self::ALL
    }

    /// Human-readable name, also the value stored in the `language` column
    pub fn display_name(self) -> &'static str {
        match self {
            Language::C => "The C Programming Language",
            Language::Css => "Cascading Style Sheets",
            Language::Csv => "Comma Separated Values",
            Language::Html => "Hyper Text Markup Language",
            Language::Js => "JavaScript",
            Language::Json => "JavaScript Object Notation",
            Language::Jsx => "JavaScript Extended",
            Language::Md => "Markdown",
            Language::Py => "Python",
            Language::Txt => "Plain Text",
            Language::Yaml => "Yaml Ain't Markup Language",
        }
    }

    /// Detect the language of a file from its extension.
    ///
    /// Matching is exact: `.PY` is not `.py`.
    pub fn from_extension(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // `Path::extension` drops the dot, so an empty or missing extension
        // corresponds to a suffix shorter than two characters.
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                Error::UnsupportedLanguage(format!("file {} has no extension", path.display()))
            })?;

        EXTENSIONS.get(ext).copied().ok_or_else(|| {
            Error::UnsupportedLanguage(format!("unrecognized extension '.{}'", ext))
        })
    }

    /// Resolve user input: a display name ("Python") or an extension ("py", ".py").
    ///
    /// Display names match case-insensitively here, extensions exactly.
    pub fn from_user_input(value: &str) -> Result<Self> {
        let value = value.trim();
        if let Some(lang) = Self::ALL
            .iter()
            .copied()
            .find(|lang| lang.display_name().eq_ignore_ascii_case(value))
        {
            return Ok(lang);
        }
        EXTENSIONS
            .get(value.trim_start_matches('.'))
            .copied()
            .ok_or_else(|| Error::UnsupportedLanguage(format!("unknown language '{}'", value)))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|lang| lang.display_name() == s)
            .ok_or_else(|| Error::UnsupportedLanguage(format!("unknown language '{}'", s)))
    }
}

impl Serialize for Language {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.display_name())
    }
}

impl<'de> Deserialize<'de> for Language {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

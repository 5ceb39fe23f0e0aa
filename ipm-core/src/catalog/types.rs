//! Small value types shared by catalog and registry records

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;
use std::fmt;
use std::str::FromStr;

use crate::error::IpmError;

/// IP category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Digital,
    Comm,
    Analog,
    Dataconv,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Digital,
        Category::Comm,
        Category::Analog,
        Category::Dataconv,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Digital => "digital",
            Category::Comm => "comm",
            Category::Analog => "analog",
            Category::Dataconv => "dataconv",
        }
    }
}

impl FromStr for Category {
    type Err = IpmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| IpmError::InvalidCategory(s.to_string()))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fabrication process an IP targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Technology {
    Sky130,
    Gf180mcu,
}

impl Technology {
    pub const ALL: [Technology; 2] = [Technology::Sky130, Technology::Gf180mcu];

    pub fn as_str(&self) -> &'static str {
        match self {
            Technology::Sky130 => "sky130",
            Technology::Gf180mcu => "gf180mcu",
        }
    }
}

impl Default for Technology {
    fn default() -> Self {
        Technology::Sky130
    }
}

impl FromStr for Technology {
    type Err = IpmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Technology::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| IpmError::InvalidTechnology(s.to_string()))
    }
}

impl fmt::Display for Technology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical width or height, kept in whatever form the catalog published
///
/// The upstream catalog mixes JSON numbers and numeric strings. Numbers are
/// held as their raw JSON text, so `0.350`, `1e2` and integers wider than
/// 64 bits are written back exactly as read.
#[derive(Debug, Clone)]
pub enum Dimension {
    Number(Box<RawValue>),
    Text(String),
}

impl Dimension {
    /// Build a numeric dimension from its JSON spelling
    pub fn number(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<serde_json::Number>(raw)?;
        RawValue::from_string(raw.to_string()).map(Dimension::Number)
    }
}

impl PartialEq for Dimension {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Dimension::Number(a), Dimension::Number(b)) => a.get() == b.get(),
            (Dimension::Text(a), Dimension::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Serialize for Dimension {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Dimension::Number(raw) => raw.serialize(serializer),
            Dimension::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for Dimension {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        if raw.get().starts_with('"') {
            return serde_json::from_str(raw.get())
                .map(Dimension::Text)
                .map_err(de::Error::custom);
        }
        match serde_json::from_str::<serde_json::Number>(raw.get()) {
            Ok(_) => Ok(Dimension::Number(raw)),
            Err(_) => Err(de::Error::custom(format!(
                "expected a number or a string, found {}",
                raw.get()
            ))),
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Number(raw) => f.write_str(raw.get()),
            Dimension::Text(s) => f.write_str(s),
        }
    }
}

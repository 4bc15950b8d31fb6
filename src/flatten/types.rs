use serde::{Deserialize, Serialize};

/// JSON-typed columns of the Google Analytics customer revenue export
pub const DEFAULT_JSON_COLUMNS: [&str; 4] = ["device", "geoNetwork", "totals", "trafficSource"];

/// Where the expanded columns of a JSON-typed column end up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColumnPlacement {
    /// Take the position of the column they replace
    #[default]
    InPlace,
    /// Go after every other column, in flattening order
    Append,
}

/// What to do when an expanded column name is already taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollisionPolicy {
    /// Fail the whole flatten call
    #[default]
    Error,
    /// Drop the existing column in favor of the expanded one
    Overwrite,
}

/// Configuration for flattening JSON-typed columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlattenConfig {
    /// Columns whose cells hold JSON objects, expanded in this order
    pub json_columns: Vec<String>,

    /// Joins the source column name and the nested key
    pub separator: String,

    pub placement: ColumnPlacement,

    pub on_collision: CollisionPolicy,
}

impl Default for FlattenConfig {
    fn default() -> Self {
        FlattenConfig {
            json_columns: DEFAULT_JSON_COLUMNS.iter().map(|s| s.to_string()).collect(),
            separator: String::from("."),
            placement: ColumnPlacement::InPlace,
            on_collision: CollisionPolicy::Error,
        }
    }
}

impl FlattenConfig {
    /// Default settings for an explicit list of JSON-typed columns
    pub fn for_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FlattenConfig {
            json_columns: columns.into_iter().map(Into::into).collect(),
            ..FlattenConfig::default()
        }
    }
}

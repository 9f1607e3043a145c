//! Per-call validation options.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::path_de;

/// What an object with `additionalProperties: false` does with an unknown key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownField {
    #[default]
    Fail,
    Drop,
}

/// Knobs every maker receives. The default is strict: no string coercion,
/// no scalar-to-array wrapping, internal property names, unknown keys fail.
///
/// Loadable from JSON with camelCase keys, e.g.
/// `{"unknownField": "drop", "convertFromNetwork": true}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct MakeOptions {
    pub unknown_field: UnknownField,
    /// Accept `"12"` where a number or integer is expected.
    pub parse_numeric_strings: bool,
    /// Accept `"true"` / `"false"` where a boolean is expected.
    pub parse_boolean_strings: bool,
    /// Wrap a lone scalar into a one-element array where an array is expected.
    pub allow_convert_for_array_type: bool,
    /// Read object properties by their wire names.
    pub convert_from_network: bool,
}

impl MakeOptions {
    pub fn from_json_str(src: &str) -> Result<Self> {
        path_de::from_str_with_path(src)
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        path_de::from_slice_with_path(bytes)
    }

    /// Lenient options for query strings and headers, where every scalar
    /// arrives as a string and repeated keys may or may not form a list.
    pub fn for_parameters() -> Self {
        Self {
            parse_numeric_strings: true,
            parse_boolean_strings: true,
            allow_convert_for_array_type: true,
            ..Self::default()
        }
    }

    /// Options for bodies arriving off the wire.
    pub fn from_network() -> Self {
        Self { convert_from_network: true, ..Self::default() }
    }
}

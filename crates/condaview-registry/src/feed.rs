//! Upstream feed documents.
//!
//! Conda channels publish a `channeldata.json` catalog with descriptive
//! metadata per package, and one `repodata.json` index per architecture
//! listing every artifact. Both are parsed leniently: fields of an
//! unexpected type are treated as absent rather than failing the document.

use std::{collections::HashMap, fmt};

use indexmap::IndexMap;
use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer,
};

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        _ => None,
    })
}

fn lenient_strings<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Array(items)) => {
            Some(
                items
                    .into_iter()
                    .filter_map(|item| {
                        match item {
                            serde_json::Value::String(s) => Some(s),
                            _ => None,
                        }
                    })
                    .collect(),
            )
        }
        _ => None,
    })
}

fn optional_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OptMillisVisitor;

    impl<'de> Visitor<'de> for OptMillisVisitor {
        type Value = Option<i64>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an integer timestamp, string, or null")
        }

        fn visit_none<E>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
            Ok(i64::try_from(v).ok())
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
            Ok(v.is_finite().then_some(v as i64))
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(v.trim().parse::<i64>().ok())
        }

        fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
        where
            D: Deserializer<'de>,
        {
            deserializer.deserialize_any(self)
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: de::SeqAccess<'de>,
        {
            while seq.next_element::<de::IgnoredAny>()?.is_some() {}
            Ok(None)
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: de::MapAccess<'de>,
        {
            while map
                .next_entry::<de::IgnoredAny, de::IgnoredAny>()?
                .is_some()
            {}
            Ok(None)
        }

        fn visit_bool<E>(self, _v: bool) -> Result<Self::Value, E> {
            Ok(None)
        }
    }

    deserializer.deserialize_option(OptMillisVisitor)
}

/// `channeldata.json`: descriptive metadata keyed by package name.
#[derive(Debug, Default, Deserialize)]
pub struct ChannelData {
    #[serde(default)]
    pub packages: HashMap<String, ChannelDataEntry>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ChannelDataEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub dev_url: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub home: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub license: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
}

/// `repodata.json` for one architecture: artifacts keyed by file name, in
/// document order.
#[derive(Debug, Default, Deserialize)]
pub struct RepoData {
    #[serde(default)]
    pub packages: IndexMap<String, RepoDataEntry>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RepoDataEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub version: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub license: Option<String>,

    #[serde(default, deserialize_with = "lenient_strings")]
    pub depends: Option<Vec<String>>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub subdir: Option<String>,

    /// Build time in milliseconds since the epoch.
    #[serde(default, deserialize_with = "optional_millis")]
    pub timestamp: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channeldata_deserialization() {
        let json = r#"{
            "channeldata_version": 1,
            "packages": {
                "numpy": {
                    "dev_url": "https://github.com/numpy/numpy",
                    "home": "https://numpy.org",
                    "license": "BSD-3-Clause",
                    "description": "Array processing for numbers, strings, records, and objects.",
                    "subdirs": ["linux-64", "osx-arm64"]
                },
                "odd": {
                    "license": ["MIT"],
                    "home": null
                }
            }
        }"#;

        let data: ChannelData = serde_json::from_str(json).unwrap();
        let numpy = &data.packages["numpy"];
        assert_eq!(numpy.dev_url.as_deref(), Some("https://github.com/numpy/numpy"));
        assert_eq!(numpy.home.as_deref(), Some("https://numpy.org"));
        assert_eq!(numpy.license.as_deref(), Some("BSD-3-Clause"));

        let odd = &data.packages["odd"];
        assert_eq!(odd.license, None);
        assert_eq!(odd.home, None);
        assert_eq!(odd.description, None);
    }

    #[test]
    fn test_repodata_preserves_order() {
        let json = r#"{
            "info": {"subdir": "linux-64"},
            "packages": {
                "zlib-1.2.13-h5eee18b_0.tar.bz2": {"name": "zlib", "version": "1.2.13"},
                "abseil-cpp-20211102.0-hd4dd3e8_0.tar.bz2": {"name": "abseil-cpp", "version": "20211102.0"},
                "numpy-1.24.3-py311h08b1b3b_1.tar.bz2": {"name": "numpy", "version": "1.24.3"}
            }
        }"#;

        let data: RepoData = serde_json::from_str(json).unwrap();
        let keys: Vec<_> = data.packages.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "zlib-1.2.13-h5eee18b_0.tar.bz2",
                "abseil-cpp-20211102.0-hd4dd3e8_0.tar.bz2",
                "numpy-1.24.3-py311h08b1b3b_1.tar.bz2",
            ]
        );
    }

    #[test]
    fn test_repodata_entry_fields() {
        let json = r#"{
            "name": "numpy",
            "version": "1.24.3",
            "license": "BSD-3-Clause",
            "depends": ["libgcc-ng >=11.2.0", "python >=3.11,<3.12.0a0", 5],
            "subdir": "linux-64",
            "timestamp": 1684929335287
        }"#;

        let entry: RepoDataEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.name.as_deref(), Some("numpy"));
        assert_eq!(entry.version.as_deref(), Some("1.24.3"));
        assert_eq!(
            entry.depends,
            Some(vec![
                "libgcc-ng >=11.2.0".to_string(),
                "python >=3.11,<3.12.0a0".to_string()
            ])
        );
        assert_eq!(entry.timestamp, Some(1684929335287));
    }

    #[test]
    fn test_repodata_entry_lenient_timestamp() {
        let parse = |raw: &str| {
            let json = format!(r#"{{"name": "x", "timestamp": {raw}}}"#);
            serde_json::from_str::<RepoDataEntry>(&json)
                .unwrap()
                .timestamp
        };

        assert_eq!(parse("null"), None);
        assert_eq!(parse("\"1684929335287\""), Some(1684929335287));
        assert_eq!(parse("\"soon\""), None);
        assert_eq!(parse("1684929335287.0"), Some(1684929335287));
        assert_eq!(parse("[1]"), None);
        assert_eq!(parse("true"), None);

        let entry: RepoDataEntry = serde_json::from_str(r#"{"name": "x"}"#).unwrap();
        assert_eq!(entry.timestamp, None);
        assert_eq!(entry.depends, None);
    }
}

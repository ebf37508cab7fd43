// MIT License - Copyright (c) 2026 Peter Wright
// Topic namespace and parser

use std::fmt;
use std::str::FromStr;

/// Root segment of every panel topic.
pub const TOPIC_ROOT: &str = "system";

/// The two entity families a panel publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    /// Physical lines (`inputs/...`)
    Inputs,
    /// Arming groups (`partitions/...`)
    Partitions,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Inputs, Category::Partitions];

    /// The wire segment for this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inputs => "inputs",
            Self::Partitions => "partitions",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inputs" => Ok(Self::Inputs),
            "partitions" => Ok(Self::Partitions),
            _ => Err(()),
        }
    }
}

/// A recognized `{category}/{id}/{field}` topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUpdate {
    pub category: Category,
    pub id: String,
    pub field: String,
}

/// Parse a namespace-relative topic such as `inputs/7/status`.
///
/// Returns `None` for anything that is not an input or partition field
/// update. A trailing subtype segment (`inputs/7/status/raw`) is ignored.
/// Never fails: the wildcard subscription delivers plenty of topics this
/// parser has no interest in.
pub fn parse(topic: &str) -> Option<ParsedUpdate> {
    let mut segments = topic.split('/');
    let category = segments.next()?.parse::<Category>().ok()?;
    let id = segments.next().filter(|s| !s.is_empty())?;
    let field = segments.next().filter(|s| !s.is_empty())?;
    Some(ParsedUpdate {
        category,
        id: id.to_string(),
        field: field.to_string(),
    })
}

/// Topic prefix for one panel, e.g. `system/PS123/`.
pub fn namespace(serial_number: &str) -> String {
    format!("{TOPIC_ROOT}/{serial_number}/")
}

/// Wildcard subscription covering everything a panel publishes.
pub fn subscription(serial_number: &str) -> String {
    format!("{TOPIC_ROOT}/{serial_number}/#")
}

/// Full wire topic for a namespace-relative subtopic.
pub fn full_topic(serial_number: &str, subtopic: &str) -> String {
    format!("{TOPIC_ROOT}/{serial_number}/{subtopic}")
}

/// Strip the panel namespace from a wire topic. `None` if the topic
/// belongs to a different namespace.
pub fn strip_namespace<'a>(topic: &'a str, serial_number: &str) -> Option<&'a str> {
    topic
        .strip_prefix(TOPIC_ROOT)?
        .strip_prefix('/')?
        .strip_prefix(serial_number)?
        .strip_prefix('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input_field() {
        let parsed = parse("inputs/7/status").expect("recognized");
        assert_eq!(parsed.category, Category::Inputs);
        assert_eq!(parsed.id, "7");
        assert_eq!(parsed.field, "status");
    }

    #[test]
    fn test_parse_partition_field() {
        let parsed = parse("partitions/2/night_mode").expect("recognized");
        assert_eq!(parsed.category, Category::Partitions);
        assert_eq!(parsed.id, "2");
        assert_eq!(parsed.field, "night_mode");
    }

    #[test]
    fn test_parse_ignores_trailing_subtype() {
        let parsed = parse("inputs/3/block/state").expect("recognized");
        assert_eq!(parsed.id, "3");
        assert_eq!(parsed.field, "block");
    }

    #[test]
    fn test_parse_ignored_shapes() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("foo/bar"), None);
        assert_eq!(parse("inputs/7"), None);
        assert_eq!(parse("inputs//status"), None);
        assert_eq!(parse("inputs/7/"), None);
        assert_eq!(parse("outputs/1/status"), None);
        assert_eq!(parse("Inputs/1/status"), None);
        // The full wire topic is not namespace-relative
        assert_eq!(parse("system/123/inputs/7/status"), None);
    }

    #[test]
    fn test_namespace_helpers() {
        assert_eq!(subscription("PS1"), "system/PS1/#");
        assert_eq!(namespace("PS1"), "system/PS1/");
        assert_eq!(
            full_topic("PS1", "inputs/4/block_set"),
            "system/PS1/inputs/4/block_set"
        );
    }

    #[test]
    fn test_strip_namespace() {
        assert_eq!(
            strip_namespace("system/123/inputs/7/status", "123"),
            Some("inputs/7/status")
        );
        assert_eq!(strip_namespace("system/1234/inputs/7/status", "123"), None);
        assert_eq!(strip_namespace("system/999/inputs/7/status", "123"), None);
        assert_eq!(strip_namespace("other/123/inputs/7/status", "123"), None);
        assert_eq!(strip_namespace("system/123", "123"), None);
    }

    #[test]
    fn test_category_round_trip_names() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>(), Ok(category));
        }
    }
}

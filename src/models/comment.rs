//! Comment record model and the field default table.

use serde::{Deserialize, Serialize};

/// Mapping between a CSV column, the raw API key it is read from, and the
/// value used when the key is missing or cannot be coerced.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Column name in the English header.
    pub column: &'static str,
    /// Column label in the origin-locale header.
    pub source_label: &'static str,
    /// Key read from each raw comment object.
    pub source_key: &'static str,
    /// Fallback value.
    pub default: &'static str,
}

pub const AUTHOR: FieldSpec = FieldSpec {
    column: "author_display_name",
    source_label: "昵称",
    source_key: "nickname",
    default: "anonymous",
};

pub const REGION: FieldSpec = FieldSpec {
    column: "region",
    source_label: "地区",
    source_key: "location",
    default: "unknown",
};

pub const POSTED_AT: FieldSpec = FieldSpec {
    column: "posted_at",
    source_label: "日期",
    source_key: "creationTime",
    default: "",
};

pub const VARIANT: FieldSpec = FieldSpec {
    column: "variant_label",
    source_label: "产品",
    source_key: "productColor",
    default: "none",
};

pub const BODY: FieldSpec = FieldSpec {
    column: "body",
    source_label: "评论",
    source_key: "content",
    default: "",
};

pub const RATING: FieldSpec = FieldSpec {
    column: "rating",
    source_label: "评分",
    source_key: "score",
    default: "5",
};

/// Rating used when `score` is missing or not numeric.
pub const DEFAULT_RATING: i64 = 5;

/// All fields, in column order.
pub const FIELDS: [FieldSpec; 6] = [AUTHOR, REGION, POSTED_AT, VARIANT, BODY, RATING];

/// Which labels to write in the CSV header row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderStyle {
    /// `author_display_name,region,posted_at,variant_label,body,rating`
    #[default]
    English,
    /// Origin-locale labels (昵称,地区,日期,产品,评论,评分).
    Source,
}

impl HeaderStyle {
    pub fn labels(self) -> [&'static str; 6] {
        FIELDS.map(|f| match self {
            HeaderStyle::English => f.column,
            HeaderStyle::Source => f.source_label,
        })
    }
}

/// One normalized review comment. Every field is always populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub author_display_name: String,
    pub region: String,
    /// Passed through verbatim from the API.
    pub posted_at: String,
    pub variant_label: String,
    pub body: String,
    pub rating: i64,
}

impl Default for CommentRecord {
    fn default() -> Self {
        Self {
            author_display_name: AUTHOR.default.to_string(),
            region: REGION.default.to_string(),
            posted_at: POSTED_AT.default.to_string(),
            variant_label: VARIANT.default.to_string(),
            body: BODY.default.to_string(),
            rating: DEFAULT_RATING,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_labels() {
        assert_eq!(
            HeaderStyle::English.labels(),
            [
                "author_display_name",
                "region",
                "posted_at",
                "variant_label",
                "body",
                "rating"
            ]
        );
        assert_eq!(
            HeaderStyle::Source.labels(),
            ["昵称", "地区", "日期", "产品", "评论", "评分"]
        );
    }

    #[test]
    fn test_default_record_matches_table() {
        let record = CommentRecord::default();
        assert_eq!(record.author_display_name, "anonymous");
        assert_eq!(record.region, "unknown");
        assert_eq!(record.variant_label, "none");
        assert_eq!(record.rating.to_string(), RATING.default);
    }
}

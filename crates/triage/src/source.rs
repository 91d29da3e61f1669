//! Source vocabulary: which export a row came from and which canonical
//! fields each export owns.

use serde::Serialize;

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// The three exports reconciled per run, in join order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Site-crawl export (Screaming Frog).
    Frog,
    /// Search-performance export (Google Search Console).
    Gsc,
    /// Web-analytics export (GA4).
    Ga4,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Frog, SourceKind::Gsc, SourceKind::Ga4];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Frog => "frog",
            Self::Gsc => "gsc",
            Self::Ga4 => "ga4",
        }
    }

    /// Fields owned by this source, identifier first.
    pub fn fields(&self) -> &'static [Field] {
        match self {
            Self::Frog => &[
                Field::Url,
                Field::StatusCode,
                Field::Title,
                Field::MetaDescription,
                Field::WordCount,
                Field::Inlinks,
                Field::SchemaTypes,
            ],
            Self::Gsc => &[
                Field::Url,
                Field::Clicks,
                Field::Impressions,
                Field::Ctr,
                Field::Position,
            ],
            Self::Ga4 => &[
                Field::Url,
                Field::Users,
                Field::Sessions,
                Field::EngagedSessions,
                Field::AvgEngagementTime,
            ],
        }
    }

    /// Native column headers accepted for `field`, in preference order.
    pub fn default_aliases(&self, field: Field) -> &'static [&'static str] {
        match (self, field) {
            (Self::Frog, Field::Url) => &["Address", "URL"],
            (Self::Frog, Field::StatusCode) => &["Status Code"],
            (Self::Frog, Field::Title) => &["Title 1", "Title"],
            (Self::Frog, Field::MetaDescription) => &["Meta Description 1", "Meta Description"],
            (Self::Frog, Field::WordCount) => &["Word Count"],
            (Self::Frog, Field::Inlinks) => &["Inlinks", "Unique Inlinks"],
            (Self::Frog, Field::SchemaTypes) => &["Schema Types", "Structured Data Types"],

            (Self::Gsc, Field::Url) => &["Page", "Top pages", "URL", "Landing page"],
            (Self::Gsc, Field::Clicks) => &["Clicks"],
            (Self::Gsc, Field::Impressions) => &["Impressions"],
            (Self::Gsc, Field::Ctr) => &["CTR"],
            (Self::Gsc, Field::Position) => &["Position", "Average position"],

            (Self::Ga4, Field::Url) => &[
                "Page",
                "Page path",
                "Page path + query string",
                "Landing page",
                "Page path and screen class",
            ],
            (Self::Ga4, Field::Users) => &["Users", "Total users", "Active users"],
            (Self::Ga4, Field::Sessions) => &["Sessions"],
            (Self::Ga4, Field::EngagedSessions) => &["Engaged sessions"],
            (Self::Ga4, Field::AvgEngagementTime) => &[
                "Average engagement time",
                "Average engagement time per session",
            ],

            _ => &[],
        }
    }

    /// Resolve a canonical field name (as used in config overrides) for this source.
    pub fn field_named(&self, name: &str) -> Option<Field> {
        self.fields().iter().copied().find(|f| f.name() == name)
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Fields
// ---------------------------------------------------------------------------

/// How a raw cell is coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Identifier,
    Text,
    /// Non-negative integer.
    Count,
    /// Non-negative real; exports round some volumes to decimals.
    Quantity,
    Number,
    /// Fraction, or a percent string.
    Ratio,
    /// Seconds, `mm:ss` or `hh:mm:ss`.
    Duration,
}

impl ValueKind {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Count | Self::Quantity | Self::Number | Self::Ratio | Self::Duration)
    }
}

/// Canonical field vocabulary shared by all adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Url,
    // crawl
    StatusCode,
    Title,
    MetaDescription,
    WordCount,
    Inlinks,
    SchemaTypes,
    // search
    Clicks,
    Impressions,
    Ctr,
    Position,
    // analytics
    Users,
    Sessions,
    EngagedSessions,
    AvgEngagementTime,
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::StatusCode => "status_code",
            Self::Title => "title",
            Self::MetaDescription => "meta_description",
            Self::WordCount => "word_count",
            Self::Inlinks => "inlinks",
            Self::SchemaTypes => "schema_types",
            Self::Clicks => "clicks",
            Self::Impressions => "impressions",
            Self::Ctr => "ctr",
            Self::Position => "position",
            Self::Users => "users",
            Self::Sessions => "sessions",
            Self::EngagedSessions => "engaged_sessions",
            Self::AvgEngagementTime => "avg_engagement_time",
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Url => ValueKind::Identifier,
            Self::Title | Self::MetaDescription | Self::SchemaTypes => ValueKind::Text,
            Self::StatusCode | Self::WordCount | Self::Inlinks => ValueKind::Count,
            Self::Ctr => ValueKind::Ratio,
            Self::AvgEngagementTime => ValueKind::Duration,
            Self::Clicks
            | Self::Impressions
            | Self::Users
            | Self::Sessions
            | Self::EngagedSessions => ValueKind::Quantity,
            Self::Position => ValueKind::Number,
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

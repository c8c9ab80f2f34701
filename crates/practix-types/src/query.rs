//! Closed query parameter types: sort fields, orders and filter predicates
//!
//! Everything a client may send is parsed into these enums at the boundary;
//! values outside the whitelist never reach the query layer.

use crate::models::{CategoryId, Difficulty};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default number of items per page
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Upper bound on items per page
pub const MAX_PAGE_SIZE: u32 = 100;

/// A query parameter value outside its whitelist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamError {
    pub param: &'static str,
    pub value: String,
}

impl ParamError {
    pub fn new(param: &'static str, value: impl Into<String>) -> Self {
        Self {
            param,
            value: value.into(),
        }
    }
}

impl fmt::Display for ParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported {} '{}'", self.param, self.value)
    }
}

impl std::error::Error for ParamError {}

/// Sortable fields (whitelist)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    Quality,
    Relevance,
    Difficulty,
    Title,
}

impl SortField {
    pub const ALL: [SortField; 4] = [
        SortField::Quality,
        SortField::Relevance,
        SortField::Difficulty,
        SortField::Title,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortField::Quality => "quality",
            SortField::Relevance => "relevance",
            SortField::Difficulty => "difficulty",
            SortField::Title => "title",
        }
    }

    /// Natural direction for the field when none is given
    pub fn default_order(self) -> SortOrder {
        match self {
            SortField::Quality | SortField::Relevance => SortOrder::Desc,
            SortField::Difficulty | SortField::Title => SortOrder::Asc,
        }
    }

    pub fn next(self) -> SortField {
        match self {
            SortField::Quality => SortField::Relevance,
            SortField::Relevance => SortField::Difficulty,
            SortField::Difficulty => SortField::Title,
            SortField::Title => SortField::Quality,
        }
    }
}

impl FromStr for SortField {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quality" => Ok(SortField::Quality),
            "relevance" => Ok(SortField::Relevance),
            "difficulty" => Ok(SortField::Difficulty),
            "title" => Ok(SortField::Title),
            other => Err(ParamError::new("sort", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    pub fn toggled(self) -> SortOrder {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }
}

impl FromStr for SortOrder {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(ParamError::new("order", other)),
        }
    }
}

/// Sort field plus direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: SortField,
    pub order: SortOrder,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: SortField::Quality,
            order: SortOrder::Desc,
        }
    }
}

impl SortSpec {
    pub fn new(field: SortField, order: SortOrder) -> Self {
        Self { field, order }
    }

    /// Parse raw `sort`/`order` parameters, defaulting missing parts
    pub fn parse(field: Option<&str>, order: Option<&str>) -> Result<Self, ParamError> {
        let field = match field {
            Some(f) if !f.trim().is_empty() => f.parse()?,
            _ => SortSpec::default().field,
        };
        let order = match order {
            Some(o) if !o.trim().is_empty() => o.parse()?,
            _ => field.default_order(),
        };
        Ok(Self { field, order })
    }

    /// Canonical form used in cache keys, e.g. `quality:desc`
    pub fn signature(&self) -> String {
        format!("{}:{}", self.field.as_str(), self.order.as_str())
    }
}

/// Filters accepted by category listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListFilters {
    pub difficulty: Option<Difficulty>,
}

impl ListFilters {
    pub fn parse(difficulty: Option<&str>) -> Result<Self, ParamError> {
        Ok(Self {
            difficulty: parse_optional_difficulty(difficulty)?,
        })
    }

    /// Canonical form used in cache keys and pages, e.g. `difficulty=easy`
    pub fn signature(&self) -> String {
        format!(
            "difficulty={}",
            self.difficulty.map(Difficulty::as_str).unwrap_or("any")
        )
    }
}

/// Filters accepted by search
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchFilters {
    pub difficulty: Option<Difficulty>,
    pub category: Option<CategoryId>,
}

impl SearchFilters {
    pub fn parse(difficulty: Option<&str>, category: Option<&str>) -> Result<Self, ParamError> {
        Ok(Self {
            difficulty: parse_optional_difficulty(difficulty)?,
            category: category
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(CategoryId::from),
        })
    }

    pub fn signature(&self) -> String {
        format!(
            "difficulty={};category={}",
            self.difficulty.map(Difficulty::as_str).unwrap_or("any"),
            self.category.as_ref().map(CategoryId::as_str).unwrap_or("any")
        )
    }
}

/// Signature of one listing view (filters plus ordering)
///
/// Carried by listing pages and used by clients to key per-view state.
pub fn view_signature(filters: &ListFilters, sort: &SortSpec) -> String {
    format!("{};sort={}", filters.signature(), sort.signature())
}

fn parse_optional_difficulty(raw: Option<&str>) -> Result<Option<Difficulty>, ParamError> {
    match raw.map(str::trim) {
        None | Some("") | Some("any") | Some("all") => Ok(None),
        Some(value) => value.parse().map(Some),
    }
}

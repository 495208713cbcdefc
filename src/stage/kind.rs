//! Stage kinds and their parameter descriptors
//!
//! Every kind carries a static list of [`ParamSpec`]s describing the
//! parameters it accepts, in display order. The built-in grammar reads these
//! descriptors to bind arguments; the session layer reads them to order the
//! serialized kwargs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type accepted by a stage parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// 24-character hex sample identifier
    Id,
    /// List of sample identifiers
    IdList,
    /// String (quoted or bare word)
    Str,
    /// List of strings
    StrList,
    /// Integer
    Int,
    /// Floating point (integers are accepted and widened)
    Float,
    /// Boolean
    Bool,
    /// Nested expression, checked by the expression parser
    Expr,
    /// The literal `none`
    Null,
}

impl ParamType {
    pub fn display_name(&self) -> &'static str {
        match self {
            ParamType::Id => "id",
            ParamType::IdList => "list<id>",
            ParamType::Str => "str",
            ParamType::StrList => "list<str>",
            ParamType::Int => "int",
            ParamType::Float => "float",
            ParamType::Bool => "bool",
            ParamType::Expr => "expr",
            ParamType::Null => "none",
        }
    }
}

/// Default filled in when an optional parameter is omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamDefault {
    Null,
    Bool(bool),
}

/// Descriptor of one stage parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    /// Accepted types, tried in order
    pub types: &'static [ParamType],
    pub default: Option<ParamDefault>,
}

impl ParamSpec {
    const fn required(name: &'static str, types: &'static [ParamType]) -> Self {
        Self {
            name,
            types,
            default: None,
        }
    }

    const fn optional(
        name: &'static str,
        types: &'static [ParamType],
        default: ParamDefault,
    ) -> Self {
        Self {
            name,
            types,
            default: Some(default),
        }
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }

    /// Whether this parameter holds a field name that the backend must know
    pub fn references_fields(&self) -> bool {
        matches!(self.name, "field" | "field_names" | "field_or_expr")
    }

    /// Type signature as shown in the kind picker, e.g. `float|none`
    pub fn signature(&self) -> String {
        self.types
            .iter()
            .map(|t| t.display_name())
            .collect::<Vec<_>>()
            .join("|")
    }
}

use ParamType as T;

const SAMPLE_IDS: &[ParamSpec] = &[ParamSpec::required("sample_ids", &[T::IdList, T::Id])];
const FIELD_NAMES: &[ParamSpec] = &[ParamSpec::required("field_names", &[T::StrList])];
const FIELD: &[ParamSpec] = &[ParamSpec::required("field", &[T::Str])];
const FIELD_FILTER: &[ParamSpec] = &[
    ParamSpec::required("field", &[T::Str]),
    ParamSpec::required("filter", &[T::Expr]),
];
const LIMIT: &[ParamSpec] = &[ParamSpec::required("limit", &[T::Int])];
const FILTER: &[ParamSpec] = &[ParamSpec::required("filter", &[T::Expr])];
const TAG: &[ParamSpec] = &[ParamSpec::required("tag", &[T::Str])];
const TAGS: &[ParamSpec] = &[ParamSpec::required("tags", &[T::StrList])];
const MONGO: &[ParamSpec] = &[ParamSpec::required("pipeline", &[T::Expr])];
const SHUFFLE: &[ParamSpec] = &[ParamSpec::optional(
    "seed",
    &[T::Float, T::Null],
    ParamDefault::Null,
)];
const SELECT_FIELDS: &[ParamSpec] = &[ParamSpec::optional(
    "field_names",
    &[T::StrList, T::Null],
    ParamDefault::Null,
)];
const SORT_BY: &[ParamSpec] = &[
    ParamSpec::required("field_or_expr", &[T::Str, T::Expr]),
    ParamSpec::optional("reverse", &[T::Bool], ParamDefault::Bool(false)),
];
const SKIP: &[ParamSpec] = &[ParamSpec::required("skip", &[T::Int])];
const TAKE: &[ParamSpec] = &[
    ParamSpec::required("size", &[T::Int]),
    ParamSpec::optional("seed", &[T::Float, T::Null], ParamDefault::Null),
];

/// The operation a stage applies to the dataset.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum StageKind {
    Exclude,
    ExcludeFields,
    Exists,
    FilterField,
    FilterClassifications,
    FilterDetections,
    Limit,
    #[default]
    Match,
    MatchTag,
    MatchTags,
    Mongo,
    Shuffle,
    Select,
    SelectFields,
    SortBy,
    Skip,
    Take,
}

impl StageKind {
    /// All kinds, in the order the kind picker lists them
    pub fn all() -> &'static [StageKind] {
        &[
            StageKind::Exclude,
            StageKind::ExcludeFields,
            StageKind::Exists,
            StageKind::FilterField,
            StageKind::FilterClassifications,
            StageKind::FilterDetections,
            StageKind::Limit,
            StageKind::Match,
            StageKind::MatchTag,
            StageKind::MatchTags,
            StageKind::Mongo,
            StageKind::Shuffle,
            StageKind::Select,
            StageKind::SelectFields,
            StageKind::SortBy,
            StageKind::Skip,
            StageKind::Take,
        ]
    }

    /// Name used in stage text (`match: ...`)
    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Exclude => "exclude",
            StageKind::ExcludeFields => "exclude_fields",
            StageKind::Exists => "exists",
            StageKind::FilterField => "filter_field",
            StageKind::FilterClassifications => "filter_classifications",
            StageKind::FilterDetections => "filter_detections",
            StageKind::Limit => "limit",
            StageKind::Match => "match",
            StageKind::MatchTag => "match_tag",
            StageKind::MatchTags => "match_tags",
            StageKind::Mongo => "mongo",
            StageKind::Shuffle => "shuffle",
            StageKind::Select => "select",
            StageKind::SelectFields => "select_fields",
            StageKind::SortBy => "sort_by",
            StageKind::Skip => "skip",
            StageKind::Take => "take",
        }
    }

    /// Class name used in the serialized `_cls` field
    pub fn class_name(&self) -> &'static str {
        match self {
            StageKind::Exclude => "Exclude",
            StageKind::ExcludeFields => "ExcludeFields",
            StageKind::Exists => "Exists",
            StageKind::FilterField => "FilterField",
            StageKind::FilterClassifications => "FilterClassifications",
            StageKind::FilterDetections => "FilterDetections",
            StageKind::Limit => "Limit",
            StageKind::Match => "Match",
            StageKind::MatchTag => "MatchTag",
            StageKind::MatchTags => "MatchTags",
            StageKind::Mongo => "Mongo",
            StageKind::Shuffle => "Shuffle",
            StageKind::Select => "Select",
            StageKind::SelectFields => "SelectFields",
            StageKind::SortBy => "SortBy",
            StageKind::Skip => "Skip",
            StageKind::Take => "Take",
        }
    }

    /// Look a kind up by its text name
    pub fn from_name(name: &str) -> Option<StageKind> {
        let name = name.trim();
        Self::all().iter().copied().find(|k| k.name() == name)
    }

    /// Look a kind up by its serialized class name
    pub fn from_class_name(name: &str) -> Option<StageKind> {
        Self::all().iter().copied().find(|k| k.class_name() == name)
    }

    /// Parameter descriptors in display order
    pub fn params(&self) -> &'static [ParamSpec] {
        match self {
            StageKind::Exclude | StageKind::Select => SAMPLE_IDS,
            StageKind::ExcludeFields => FIELD_NAMES,
            StageKind::Exists => FIELD,
            StageKind::FilterField
            | StageKind::FilterClassifications
            | StageKind::FilterDetections => FIELD_FILTER,
            StageKind::Limit => LIMIT,
            StageKind::Match => FILTER,
            StageKind::MatchTag => TAG,
            StageKind::MatchTags => TAGS,
            StageKind::Mongo => MONGO,
            StageKind::Shuffle => SHUFFLE,
            StageKind::SelectFields => SELECT_FIELDS,
            StageKind::SortBy => SORT_BY,
            StageKind::Skip => SKIP,
            StageKind::Take => TAKE,
        }
    }

    pub fn param(&self, name: &str) -> Option<&'static ParamSpec> {
        self.params().iter().find(|p| p.name == name)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

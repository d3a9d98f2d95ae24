use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::product::CatalogField;

pub type QueryParams = BTreeMap<String, String>;

/// Catalog action inferred from a chat message.
///
/// The first four variants form the closed set the resolver prompt advertises.
/// Anything else the model emits is kept verbatim in `Other` and treated as
/// "no data" downstream.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum IntentAction {
    FetchAllProducts,
    FetchByName,
    FetchByCategory,
    Unknown,
    Other(String),
}

impl IntentAction {
    pub const SUPPORTED: [IntentAction; 4] =
        [Self::FetchAllProducts, Self::FetchByName, Self::FetchByCategory, Self::Unknown];

    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "fetch_all_products" => Self::FetchAllProducts,
            "fetch_by_name" => Self::FetchByName,
            "fetch_by_category" => Self::FetchByCategory,
            "unknown" => Self::Unknown,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::FetchAllProducts => "fetch_all_products",
            Self::FetchByName => "fetch_by_name",
            Self::FetchByCategory => "fetch_by_category",
            Self::Unknown => "unknown",
            Self::Other(raw) => raw.as_str(),
        }
    }

    /// Field an exact-match action filters on. Its query parameter shares the
    /// field's name and is required.
    pub fn filter_field(&self) -> Option<CatalogField> {
        match self {
            Self::FetchByName => Some(CatalogField::Name),
            Self::FetchByCategory => Some(CatalogField::Category),
            Self::FetchAllProducts | Self::Unknown | Self::Other(_) => None,
        }
    }
}

impl std::fmt::Display for IntentAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for IntentAction {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<IntentAction> for String {
    fn from(value: IntentAction) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub action: IntentAction,
    pub query_params: Option<QueryParams>,
}

impl Intent {
    pub fn new(action: IntentAction, query_params: Option<QueryParams>) -> Self {
        Self { action, query_params }
    }

    pub fn unknown() -> Self {
        Self { action: IntentAction::Unknown, query_params: None }
    }

    pub fn is_unknown(&self) -> bool {
        self.action == IntentAction::Unknown
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.query_params.as_ref().and_then(|params| params.get(key)).map(String::as_str)
    }
}

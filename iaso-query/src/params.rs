//! Translating UI parameters into backend query parameters
//!
//! Pages keep their pagination, sort and filter state in URL parameters
//! named for the UI (`pageSize`, `accountId`, `tab`). The backend expects
//! `limit` and never the route-scoping fields. Values keep their JSON type,
//! so `"50"` stays a string and `20` stays a number.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use url::form_urlencoded;

pub type ParamMap = Map<String, Value>;

/// Fields consumed by the UI and never sent to the backend
const STRIPPED: [&str; 3] = ["pageSize", "accountId", "tab"];

const DEFAULT_ORDER: &str = "id";
const DEFAULT_PAGE_SIZE: u64 = 20;
const DEFAULT_PAGE: u64 = 1;

/// Values used when the parameters leave a field out
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamDefaults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Value>,

    #[serde(alias = "pageSize", skip_serializing_if = "Option::is_none")]
    pub limit: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<Value>,
}

impl ParamDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order(mut self, order: impl Into<Value>) -> Self {
        self.order = Some(order.into());
        self
    }

    pub fn limit(mut self, limit: impl Into<Value>) -> Self {
        self.limit = Some(limit.into());
        self
    }

    pub fn page(mut self, page: impl Into<Value>) -> Self {
        self.page = Some(page.into());
        self
    }
}

/// Parameters in the shape the backend expects
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiParams(ParamMap);

impl ApiParams {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn order(&self) -> Option<&Value> {
        self.get("order")
    }

    pub fn limit(&self) -> Option<&Value> {
        self.get("limit")
    }

    pub fn page(&self) -> Option<&Value> {
        self.get("page")
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn as_map(&self) -> &ParamMap {
        &self.0
    }

    pub fn into_map(self) -> ParamMap {
        self.0
    }

    /// Encode as `name=value&...` with names in sorted order.
    ///
    /// Nulls are skipped, arrays are joined with commas and objects are sent
    /// as JSON.
    pub fn to_query_string(&self) -> String {
        let mut fields: Vec<_> = self.0.iter().collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));

        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (name, value) in fields {
            if let Some(value) = query_value(value) {
                serializer.append_pair(name, &value);
            }
        }
        serializer.finish()
    }
}

fn query_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(query_value)
                .collect::<Vec<_>>()
                .join(","),
        ),
        other => Some(other.to_string()),
    }
}

/// JavaScript truthiness: empty strings, zero, false and null fall through
fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|value| match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}

/// Backend parameters from UI parameters.
///
/// `order` and `page` fall back to the defaults (`page` finally to 1),
/// `pageSize` becomes `limit`, `accountId` and `tab` are dropped and every
/// other field passes through unchanged.
pub fn api_params(params: &ParamMap, defaults: &ParamDefaults) -> ApiParams {
    let mut result: ParamMap = params
        .iter()
        .filter(|(name, _)| !STRIPPED.contains(&name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    match present(params.get("order")).or(present(defaults.order.as_ref())) {
        Some(order) => result.insert("order".into(), order.clone()),
        None => result.remove("order"),
    };
    match present(params.get("pageSize")).or(present(defaults.limit.as_ref())) {
        Some(limit) => result.insert("limit".into(), limit.clone()),
        None => result.remove("limit"),
    };
    let page = present(params.get("page"))
        .or(present(defaults.page.as_ref()))
        .cloned()
        .unwrap_or_else(|| Value::from(DEFAULT_PAGE));
    result.insert("page".into(), page);

    ApiParams(result)
}

/// UI parameters with the list defaults filled in.
///
/// Unlike [`api_params`] the UI names are kept, so the result can be written
/// back to the URL.
pub fn url_params(params: &ParamMap, defaults: &ParamDefaults) -> ParamMap {
    let mut result = params.clone();
    let fallbacks = [
        ("order", defaults.order.as_ref(), Value::from(DEFAULT_ORDER)),
        ("pageSize", defaults.limit.as_ref(), Value::from(DEFAULT_PAGE_SIZE)),
        ("page", defaults.page.as_ref(), Value::from(DEFAULT_PAGE)),
    ];
    for (name, default, fallback) in fallbacks {
        let value = present(params.get(name))
            .or(present(default))
            .cloned()
            .unwrap_or(fallback);
        result.insert(name.to_string(), value);
    }
    result
}

/// Single-slot memo for [`api_params`].
///
/// Returns the same `Arc` as long as the inputs compare equal, so cache keys
/// built from the result stay stable across renders.
#[derive(Debug, Default)]
pub struct ApiParamsMemo {
    last: Mutex<Option<(ParamMap, ParamDefaults, Arc<ApiParams>)>>,
}

impl ApiParamsMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, params: &ParamMap, defaults: &ParamDefaults) -> Arc<ApiParams> {
        let mut last = self.last.lock();
        if let Some((cached_params, cached_defaults, result)) = last.as_ref() {
            if cached_params == params && cached_defaults == defaults {
                return Arc::clone(result);
            }
        }
        let result = Arc::new(api_params(params, defaults));
        *last = Some((params.clone(), defaults.clone(), Arc::clone(&result)));
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> ParamMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_defaults_fill_sparse_params() {
        let defaults = ParamDefaults::new().order("name").limit(20).page(1);
        let params = api_params(&ParamMap::new(), &defaults);
        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            json!({"order": "name", "limit": 20, "page": 1})
        );
    }

    #[test]
    fn test_page_size_renamed_and_route_fields_stripped() {
        let params = api_params(
            &map(json!({"pageSize": "50", "accountId": "7", "tab": "x"})),
            &ParamDefaults::new().order("id"),
        );
        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            json!({"limit": "50", "order": "id", "page": 1})
        );
        assert!(!params.contains("accountId"));
        assert!(!params.contains("tab"));
        assert!(!params.contains("pageSize"));
    }

    #[test]
    fn test_params_win_and_other_fields_pass_through() {
        let params = api_params(
            &map(json!({"order": "-updated_at", "page": "3", "search": "clinic", "orgUnitTypeId": 4})),
            &ParamDefaults::new().order("id").page(1),
        );
        assert_eq!(params.order(), Some(&json!("-updated_at")));
        assert_eq!(params.page(), Some(&json!("3")));
        assert_eq!(params.get("search"), Some(&json!("clinic")));
        assert_eq!(params.get("orgUnitTypeId"), Some(&json!(4)));
        assert!(params.limit().is_none());
    }

    #[test]
    fn test_empty_values_fall_back() {
        let params = api_params(
            &map(json!({"order": "", "page": 0})),
            &ParamDefaults::new().order("name"),
        );
        assert_eq!(params.order(), Some(&json!("name")));
        assert_eq!(params.page(), Some(&json!(1)));
    }

    #[test]
    fn test_defaults_accept_page_size_alias() {
        let defaults: ParamDefaults = serde_json::from_value(json!({"pageSize": 10})).unwrap();
        assert_eq!(defaults.limit, Some(json!(10)));
    }

    #[test]
    fn test_query_string() {
        let params = api_params(
            &map(json!({"search": "health centre", "ids": [1, 2], "parent": null})),
            &ParamDefaults::new().order("name"),
        );
        assert_eq!(
            params.to_query_string(),
            "ids=1%2C2&order=name&page=1&search=health+centre"
        );
    }

    #[test]
    fn test_url_params_fill_ui_defaults() {
        let params = url_params(&map(json!({"accountId": "7", "page": "2"})), &ParamDefaults::new());
        assert_eq!(
            Value::Object(params),
            json!({"accountId": "7", "order": "id", "pageSize": 20, "page": "2"})
        );

        let params = url_params(&ParamMap::new(), &ParamDefaults::new().limit(50).order("name"));
        assert_eq!(params["pageSize"], json!(50));
        assert_eq!(params["order"], json!("name"));
    }

    #[test]
    fn test_memo_is_pointer_stable() {
        let memo = ApiParamsMemo::new();
        let defaults = ParamDefaults::new().order("id");

        let first = memo.get(&map(json!({"page": 2})), &defaults);
        let second = memo.get(&map(json!({"page": 2})), &defaults);
        assert!(Arc::ptr_eq(&first, &second));

        let third = memo.get(&map(json!({"page": 3})), &defaults);
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(third.page(), Some(&json!(3)));
    }
}

//! # Request Binding
//!
//! Binds query string or url-encoded form values onto parameter definitions.
//!
//! For every definition of every visible layer:
//!
//! 1. list types first look for `name[]`, taking all its values;
//! 2. otherwise `name` is read, falling back to the alias default of the layer;
//! 3. a non-empty value is parsed (file-backed types read it as file content,
//!    list types split it on `,`);
//! 4. an empty value takes the required/default path.

use indexmap::IndexMap;

use super::{Middleware, Next};
use crate::layers::{ParameterLayers, ParsedLayers};
use crate::parameters::{ParameterDefinition, ParameterError, ParameterResult, ParameterType, ParsedParameters};

/// Alias defaults keyed by layer slug, then parameter name
pub type AliasDefaults = IndexMap<String, IndexMap<String, String>>;

/// Multi-valued request parameters, in request order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestValues(IndexMap<String, Vec<String>>);

impl RequestValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw query string (without the leading `?`)
    pub fn from_query_string(query: &str) -> Self {
        let mut ret = Self::new();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            ret.insert(decode_component(key), decode_component(value));
        }
        ret
    }

    /// Parse an `application/x-www-form-urlencoded` body
    pub fn from_form_body(body: &[u8]) -> Self {
        Self::from_query_string(&String::from_utf8_lossy(body))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_default().push(value.into());
    }

    /// First value for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    pub fn get_all(&self, key: &str) -> Option<&[String]> {
        self.0.get(key).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn decode_component(raw: &str) -> String {
    let raw = raw.replace('+', " ");
    match urlencoding::decode(&raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw,
    }
}

#[derive(Debug, Clone)]
pub struct BindOptions {
    /// Leave parameters absent from the request untouched
    pub only_provided: bool,
    /// Skip required parameters that are missing instead of failing
    pub ignore_required: bool,
    /// Source recorded in the parse log
    pub source: String,
}

impl BindOptions {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            only_provided: false,
            ignore_required: false,
            source: source.into(),
        }
    }
}

/// Bind `request` onto one layer's definitions.
pub fn bind_layer(
    definitions: &[ParameterDefinition],
    request: &RequestValues,
    defaults: Option<&IndexMap<String, String>>,
    options: &BindOptions,
    target: &mut ParsedParameters,
) -> ParameterResult<()> {
    for definition in definitions {
        let name = definition.name.as_str();

        if definition.parameter_type.is_list() {
            if let Some(values) = request.get_all(&format!("{}[]", name)) {
                let value = definition.parse(values)?;
                target.set(definition, value, &options.source);
                continue;
            }
        }

        let (raw, source) = match request.get(name) {
            Some(v) => (v, options.source.as_str()),
            None => match defaults.and_then(|d| d.get(name)) {
                Some(v) => (v.as_str(), "alias"),
                None => ("", options.source.as_str()),
            },
        };

        if raw.is_empty() {
            apply_missing(definition, options, target)?;
            continue;
        }

        let value = if definition.parameter_type.is_file_loading() {
            definition.parse_from_reader(raw.as_bytes())?
        } else if definition.parameter_type.is_list() {
            let items: Vec<String> = raw.split(',').map(str::to_owned).collect();
            definition.parse(&items)?
        } else {
            definition.parse(&[raw.to_string()])?
        };
        target.set(definition, value, source);
    }
    Ok(())
}

fn apply_missing(
    definition: &ParameterDefinition,
    options: &BindOptions,
    target: &mut ParsedParameters,
) -> ParameterResult<()> {
    if definition.required {
        if options.ignore_required {
            return Ok(());
        }
        return Err(ParameterError::MissingRequired(definition.name.clone()));
    }
    if options.only_provided {
        return Ok(());
    }

    let Some(default) = definition.default_value()? else {
        return Ok(());
    };
    // date defaults are re-evaluated on every request ("today", "1 week ago")
    if definition.parameter_type == ParameterType::Date || !target.contains(&definition.name) {
        target.set(definition, default, "defaults");
    }
    Ok(())
}

/// Binds query string or form values onto every visible layer
#[derive(Debug, Clone)]
pub struct UpdateFromRequest {
    values: RequestValues,
    options: BindOptions,
    alias_defaults: AliasDefaults,
}

impl UpdateFromRequest {
    /// Values from the query string. Only provided values are bound and
    /// missing required values are left to [`EnforceRequired`](super::EnforceRequired).
    pub fn query(values: RequestValues) -> Self {
        Self::with_options(
            values,
            BindOptions {
                only_provided: true,
                ignore_required: true,
                source: "query".to_string(),
            },
        )
    }

    /// Values from a url-encoded form body
    pub fn form(values: RequestValues) -> Self {
        Self::with_options(
            values,
            BindOptions {
                only_provided: true,
                ignore_required: true,
                source: "form".to_string(),
            },
        )
    }

    pub fn with_options(values: RequestValues, options: BindOptions) -> Self {
        Self {
            values,
            options,
            alias_defaults: AliasDefaults::new(),
        }
    }

    pub fn with_alias_defaults(mut self, alias_defaults: AliasDefaults) -> Self {
        self.alias_defaults = alias_defaults;
        self
    }
}

impl Middleware for UpdateFromRequest {
    fn handle(
        &self,
        layers: &ParameterLayers,
        parsed: &mut ParsedLayers,
        next: Next<'_>,
    ) -> ParameterResult<()> {
        next.run(layers, parsed)?;

        for layer in layers.iter() {
            let target = &mut parsed.get_or_create(&layer.slug).parameters;
            bind_layer(
                &layer.definitions,
                &self.values,
                self.alias_defaults.get(&layer.slug),
                &self.options,
                target,
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bind(definitions: &[ParameterDefinition], query: &str, options: &BindOptions) -> ParameterResult<ParsedParameters> {
        let mut target = ParsedParameters::new();
        bind_layer(
            definitions,
            &RequestValues::from_query_string(query),
            None,
            options,
            &mut target,
        )?;
        Ok(target)
    }

    #[test]
    fn test_query_string_decoding() {
        let values = RequestValues::from_query_string("q=hello+world&x=%2Fa%2Cb&x=c&flag");
        assert_eq!(values.get("q"), Some("hello world"));
        assert_eq!(values.get_all("x").unwrap(), &["/a,b".to_string(), "c".to_string()]);
        assert_eq!(values.get("flag"), Some(""));
        assert_eq!(values.get("missing"), None);
    }

    #[test]
    fn test_list_brackets_and_commas() {
        let ids = ParameterDefinition::new("ids", ParameterType::IntegerList);
        let options = BindOptions::new("query");

        let parsed = bind(&[ids.clone()], "ids[]=1&ids[]=2", &options).unwrap();
        assert_eq!(parsed.value("ids"), Some(&json!([1, 2])));

        let parsed = bind(&[ids], "ids=3,4", &options).unwrap();
        assert_eq!(parsed.value("ids"), Some(&json!([3, 4])));
    }

    #[test]
    fn test_required_list_accepts_comma_form() {
        let tags = ParameterDefinition::new("tags", ParameterType::StringList).required();
        let parsed = bind(&[tags], "tags=a,b", &BindOptions::new("query")).unwrap();
        assert_eq!(parsed.value("tags"), Some(&json!(["a", "b"])));
    }

    #[test]
    fn test_missing_required() {
        let name = ParameterDefinition::new("name", ParameterType::String).required();
        let err = bind(&[name.clone()], "", &BindOptions::new("query")).unwrap_err();
        assert_eq!(err.to_string(), "required parameter 'name' is missing");

        let mut options = BindOptions::new("query");
        options.ignore_required = true;
        let parsed = bind(&[name], "", &options).unwrap();
        assert!(!parsed.contains("name"));
    }

    #[test]
    fn test_defaults_unless_only_provided() {
        let limit = ParameterDefinition::new("limit", ParameterType::Integer).with_default(10);

        let parsed = bind(&[limit.clone()], "", &BindOptions::new("query")).unwrap();
        assert_eq!(parsed.value("limit"), Some(&json!(10)));
        assert_eq!(parsed.get("limit").unwrap().source(), Some("defaults"));

        let mut options = BindOptions::new("query");
        options.only_provided = true;
        let parsed = bind(&[limit], "", &options).unwrap();
        assert!(!parsed.contains("limit"));
    }

    #[test]
    fn test_default_does_not_overwrite_existing_value() {
        let limit = ParameterDefinition::new("limit", ParameterType::Integer).with_default(10);
        let mut target = ParsedParameters::new();
        target.set(&limit, json!(3), "config-defaults");

        bind_layer(&[limit], &RequestValues::new(), None, &BindOptions::new("query"), &mut target).unwrap();
        assert_eq!(target.value("limit"), Some(&json!(3)));
    }

    #[test]
    fn test_date_default_always_applies() {
        let since = ParameterDefinition::new("since", ParameterType::Date).with_default("2021-03-04");
        let mut target = ParsedParameters::new();
        target.set(&since, json!("1999-01-01T00:00:00Z"), "config-defaults");

        bind_layer(&[since], &RequestValues::new(), None, &BindOptions::new("query"), &mut target).unwrap();
        assert_eq!(target.value("since"), Some(&json!("2021-03-04T00:00:00Z")));
    }

    #[test]
    fn test_file_backed_value_is_content() {
        let body = ParameterDefinition::new("filter", ParameterType::ObjectFromFile);
        let parsed = bind(
            &[body],
            "filter=%7B%22a%22%3A1%7D",
            &BindOptions::new("form"),
        )
        .unwrap();
        assert_eq!(parsed.value("filter"), Some(&json!({"a": 1})));
        assert_eq!(parsed.get("filter").unwrap().source(), Some("form"));
    }

    #[test]
    fn test_alias_defaults() {
        let who = ParameterDefinition::new("who", ParameterType::String);
        let mut defaults = IndexMap::new();
        defaults.insert("who".to_string(), "alias-value".to_string());

        let mut target = ParsedParameters::new();
        bind_layer(
            &[who.clone()],
            &RequestValues::new(),
            Some(&defaults),
            &BindOptions::new("query"),
            &mut target,
        )
        .unwrap();
        assert_eq!(target.value("who"), Some(&json!("alias-value")));
        assert_eq!(target.get("who").unwrap().source(), Some("alias"));

        let mut target = ParsedParameters::new();
        bind_layer(
            &[who],
            &RequestValues::from_query_string("who=request"),
            Some(&defaults),
            &BindOptions::new("query"),
            &mut target,
        )
        .unwrap();
        assert_eq!(target.value("who"), Some(&json!("request")));
    }

    #[test]
    fn test_invalid_value_message() {
        let count = ParameterDefinition::new("count", ParameterType::Integer);
        let err = bind(&[count], "count=abc", &BindOptions::new("query")).unwrap_err();
        assert!(err.to_string().starts_with("invalid value for parameter 'count': (abc)"));
    }
}

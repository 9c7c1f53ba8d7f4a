//! URL path templating.
//!
//! Two mutually exclusive syntaxes are supported:
//!
//! - colon placeholders, `/users/:user/repos`, where unused parameters are
//!   appended as a query string;
//! - RFC 6570 URI templates, `/search/repositories{?q,sort,order}`, levels
//!   1 to 4, where unused parameters are dropped.
//!
//! Callers pick the syntax by whether the path contains a `{`.

use std::sync::LazyLock;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;

use crate::error::{ApiError, Result};
use crate::params::{Param, Parameters};

/// Everything except RFC 3986 unreserved characters.
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

static COLON_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|/|\.):([^/.]+)").expect("valid regex"));

static TEMPLATE_EXPRESSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([+#./;?&])?([^}]+?)\}").expect("valid regex"));

static VARSPEC_MODIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)(?:(\*)|:(\d+))$").expect("valid regex"));

/// Reserved characters and existing percent-encoded triples.
static RESERVED_PASSTHROUGH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"%[0-9a-fA-F]{2}|[:/?#\[\]@!$&'()*+,;=]").expect("valid regex")
});

/// Percent-encode everything but unreserved characters.
pub fn encode(value: &str) -> String {
    utf8_percent_encode(value, UNRESERVED).to_string()
}

/// Substitute `:name` placeholders and append the rest as a query string.
///
/// A placeholder starts at the beginning of the path or right after `/` or
/// `.` and runs until the next `/` or `.`. Consumed parameters are removed
/// from the query string; null values count as missing.
pub fn expand_colon_parameters(path: &str, parameters: &Parameters) -> Result<String> {
    let mut remaining = parameters.clone();
    let mut expanded = String::with_capacity(path.len());
    let mut last = 0;

    for caps in COLON_PLACEHOLDER.captures_iter(path) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        let lead = caps.get(1).map_or("", |m| m.as_str());
        let name = name.as_str();

        expanded.push_str(&path[last..whole.start()]);
        match remaining.remove(name) {
            None | Some(Param::Null) => {
                return Err(ApiError::MissingParameter {
                    name: name.to_string(),
                    path: path.to_string(),
                });
            }
            Some(Param::Scalar(value)) => {
                expanded.push_str(lead);
                expanded.push_str(&encode(&value));
            }
            Some(_) => {
                return Err(ApiError::InvalidParameter {
                    name: name.to_string(),
                    path: path.to_string(),
                });
            }
        }
        last = whole.end();
    }
    expanded.push_str(&path[last..]);

    let mut expanded = expanded.trim_end_matches('/').to_string();
    let query = build_query(&remaining);
    if !query.is_empty() {
        expanded.push('?');
        expanded.push_str(&query);
    }
    Ok(expanded)
}

/// Form-encoded query string; lists become `name[i]`, maps `name[key]`.
fn build_query(parameters: &Parameters) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    for (name, value) in parameters.iter() {
        match value {
            Param::Null => {}
            Param::Scalar(value) => {
                query.append_pair(name, value);
            }
            Param::List(items) => {
                for (index, item) in items.iter().enumerate() {
                    if let Some(item) = item.as_scalar() {
                        query.append_pair(&format!("{name}[{index}]"), item);
                    }
                }
            }
            Param::Map(pairs) => {
                for (key, item) in pairs {
                    if let Some(item) = item.as_scalar() {
                        query.append_pair(&format!("{name}[{key}]"), item);
                    }
                }
            }
        }
    }
    query.finish()
}

/// Expansion rules for one operator.
#[derive(Clone, Copy)]
struct Operator {
    prefix: &'static str,
    separator: &'static str,
    named: bool,
    if_empty: &'static str,
    reserved: bool,
}

impl Operator {
    fn from_symbol(symbol: &str) -> Self {
        let (prefix, separator, named, if_empty, reserved) = match symbol {
            "+" => ("", ",", false, "", true),
            "#" => ("#", ",", false, "", true),
            "." => (".", ".", false, "", false),
            "/" => ("/", "/", false, "", false),
            ";" => (";", ";", true, "", false),
            "?" => ("?", "&", true, "=", false),
            "&" => ("&", "&", true, "=", false),
            _ => ("", ",", false, "", false),
        };
        Self {
            prefix,
            separator,
            named,
            if_empty,
            reserved,
        }
    }

    /// Same operator, but always emitting `name=value` pairs.
    fn as_named(&self) -> Self {
        Self {
            named: true,
            ..*self
        }
    }

    fn escape(&self, value: &str, max_length: Option<usize>) -> String {
        let truncated;
        let value = match max_length {
            Some(max) => {
                truncated = value.chars().take(max).collect::<String>();
                truncated.as_str()
            }
            None => value,
        };

        if !self.reserved {
            return encode(value);
        }

        let mut escaped = String::with_capacity(value.len());
        let mut last = 0;
        for kept in RESERVED_PASSTHROUGH.find_iter(value) {
            escaped.push_str(&encode(&value[last..kept.start()]));
            escaped.push_str(kept.as_str());
            last = kept.end();
        }
        escaped.push_str(&encode(&value[last..]));
        escaped
    }

    /// `value` must already be escaped.
    fn prefixed(&self, name: &str, value: &str) -> String {
        if !self.named {
            return value.to_string();
        }
        let mut out = self.escape(name, None);
        out.push_str(if value.is_empty() { self.if_empty } else { "=" });
        out.push_str(value);
        out
    }
}

/// A variable reference inside an expression, e.g. `list*` or `path:6`.
struct VarSpec<'a> {
    name: &'a str,
    explode: bool,
    max_length: Option<usize>,
}

impl<'a> VarSpec<'a> {
    fn parse(spec: &'a str) -> Self {
        if let Some(caps) = VARSPEC_MODIFIER.captures(spec) {
            if let Some(name) = caps.get(1) {
                let max_length = caps.get(3).and_then(|m| m.as_str().parse().ok());
                return Self {
                    name: name.as_str(),
                    explode: caps.get(2).is_some(),
                    max_length,
                };
            }
        }
        Self {
            name: spec,
            explode: false,
            max_length: None,
        }
    }
}

/// Expand every `{...}` expression in `template`.
///
/// Undefined and null variables are skipped; an expression whose variables
/// all are skipped expands to the empty string. Parameters not referenced by
/// the template are ignored.
pub fn expand_uri_template(template: &str, parameters: &Parameters) -> String {
    TEMPLATE_EXPRESSION
        .replace_all(template, |caps: &regex::Captures<'_>| {
            let operator = Operator::from_symbol(caps.get(1).map_or("", |m| m.as_str()));
            let names = caps.get(2).map_or("", |m| m.as_str());
            expand_expression(&operator, names, parameters)
        })
        .into_owned()
}

fn expand_expression(operator: &Operator, names: &str, parameters: &Parameters) -> String {
    let mut translated = Vec::new();

    for spec in names.split(',') {
        let var = VarSpec::parse(spec);
        let Some(value) = parameters.get(var.name) else {
            continue;
        };

        match value {
            Param::Null => {}
            Param::Scalar(value) => {
                translated.push(operator.prefixed(var.name, &operator.escape(value, var.max_length)));
            }
            Param::List(items) => {
                let items = items.iter().filter_map(Param::as_scalar);
                let parts: Vec<String> = if var.explode && operator.named {
                    items
                        .map(|item| operator.prefixed(var.name, &operator.escape(item, var.max_length)))
                        .collect()
                } else {
                    items.map(|item| operator.escape(item, var.max_length)).collect()
                };
                if parts.is_empty() {
                    continue;
                }
                if var.explode {
                    translated.push(parts.join(operator.separator));
                } else {
                    translated.push(operator.prefixed(var.name, &parts.join(",")));
                }
            }
            Param::Map(pairs) => {
                let pairs = pairs
                    .iter()
                    .filter_map(|(key, item)| item.as_scalar().map(|item| (key, item)));
                if var.explode {
                    let named = operator.as_named();
                    let parts: Vec<String> = pairs
                        .map(|(key, item)| named.prefixed(key, &operator.escape(item, var.max_length)))
                        .collect();
                    if !parts.is_empty() {
                        translated.push(parts.join(operator.separator));
                    }
                } else {
                    let parts: Vec<String> = pairs
                        .flat_map(|(key, item)| {
                            [operator.escape(key, None), operator.escape(item, var.max_length)]
                        })
                        .collect();
                    if !parts.is_empty() {
                        translated.push(operator.prefixed(var.name, &parts.join(",")));
                    }
                }
            }
        }
    }

    if translated.is_empty() {
        return String::new();
    }
    format!("{}{}", operator.prefix, translated.join(operator.separator))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rfc_parameters() -> Parameters {
        Parameters::new()
            .with("var", "value")
            .with("hello", "Hello World!")
            .with("path", "/foo/bar")
            .with("list", vec!["red", "green", "blue"])
            .with("keys", json!({"semi": ";", "dot": ".", "comma": ","}))
            .with("empty", "")
            .with("x", 1024)
            .with("y", 768)
            .with("undef", Param::Null)
    }

    #[test]
    fn colon_placeholders_are_substituted_and_encoded() {
        let params = Parameters::new().with("user", "john doe").with("repo", "a/b");
        let path = expand_colon_parameters("/repos/:user/:repo/issues", &params).unwrap();
        assert_eq!(path, "/repos/john%20doe/a%2Fb/issues");
    }

    #[test]
    fn colon_leftovers_become_query_in_order() {
        let params = Parameters::new()
            .with("user", "milo")
            .with("per_page", 100)
            .with("q", "a b&c");
        let path = expand_colon_parameters("/users/:user/repos", &params).unwrap();
        assert_eq!(path, "/users/milo/repos?per_page=100&q=a+b%26c");
    }

    #[test]
    fn colon_placeholder_after_dot() {
        let params = Parameters::new().with("name", "readme").with("ext", "md");
        assert_eq!(expand_colon_parameters(":name.:ext", &params).unwrap(), "readme.md");
    }

    #[test]
    fn colon_missing_parameter_names_parameter_and_path() {
        let err = expand_colon_parameters("/users/:user", &Parameters::new()).unwrap_err();
        match err {
            ApiError::MissingParameter { name, path } => {
                assert_eq!(name, "user");
                assert_eq!(path, "/users/:user");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn colon_null_counts_as_missing() {
        let params = Parameters::new().with("user", Param::Null);
        let err = expand_colon_parameters("/users/:user", &params).unwrap_err();
        assert!(matches!(err, ApiError::MissingParameter { .. }));
    }

    #[test]
    fn colon_list_value_is_rejected() {
        let params = Parameters::new().with("user", vec!["a", "b"]);
        let err = expand_colon_parameters("/users/:user", &params).unwrap_err();
        assert!(matches!(err, ApiError::InvalidParameter { .. }));
    }

    #[test]
    fn colon_trailing_slash_is_stripped() {
        let params = Parameters::new().with("page", 2);
        assert_eq!(expand_colon_parameters("/user/repos/", &params).unwrap(), "/user/repos?page=2");
    }

    #[test]
    fn colon_list_leftover_uses_indexed_keys() {
        let params = Parameters::new().with("labels", vec!["bug", "ui"]);
        assert_eq!(
            expand_colon_parameters("/issues", &params).unwrap(),
            "/issues?labels%5B0%5D=bug&labels%5B1%5D=ui"
        );
    }

    #[test]
    fn colon_only_null_leftovers_add_no_query() {
        let params = Parameters::new().with("since", Param::Null);
        assert_eq!(expand_colon_parameters("/events", &params).unwrap(), "/events");
    }

    #[test]
    fn query_expansion_skips_absent_names() {
        let params = Parameters::new().with("q", "a b");
        assert_eq!(expand_uri_template("{?q,sort}", &params), "?q=a%20b");
    }

    #[test]
    fn path_segment_explode() {
        let params = Parameters::new().with("list", vec!["a", "b"]);
        assert_eq!(expand_uri_template("{/list*}", &params), "/a/b");
    }

    #[test]
    fn rfc_6570_level_4_examples() {
        let params = rfc_parameters();
        let cases = [
            ("{var}", "value"),
            ("{hello}", "Hello%20World%21"),
            ("{+hello}", "Hello%20World!"),
            ("{+path}/here", "/foo/bar/here"),
            ("{#path:6}/here", "#/foo/b/here"),
            ("{var:3}", "val"),
            ("{list}", "red,green,blue"),
            ("{list*}", "red,green,blue"),
            ("{keys}", "semi,%3B,dot,.,comma,%2C"),
            ("{keys*}", "semi=%3B,dot=.,comma=%2C"),
            ("{+keys}", "semi,;,dot,.,comma,,"),
            ("{#keys*}", "#semi=;,dot=.,comma=,"),
            ("X{.list}", "X.red,green,blue"),
            ("X{.list*}", "X.red.green.blue"),
            ("{/list*,path:4}", "/red/green/blue/%2Ffoo"),
            ("{;list}", ";list=red,green,blue"),
            ("{;list*}", ";list=red;list=green;list=blue"),
            ("{;keys*}", ";semi=%3B;dot=.;comma=%2C"),
            ("{;x,y,empty}", ";x=1024;y=768;empty"),
            ("{?x,y,undef}", "?x=1024&y=768"),
            ("{?list*}", "?list=red&list=green&list=blue"),
            ("{?keys}", "?keys=semi,%3B,dot,.,comma,%2C"),
            ("{&x,y,empty}", "&x=1024&y=768&empty="),
        ];
        for (template, expected) in cases {
            assert_eq!(expand_uri_template(template, &params), expected, "{template}");
        }
    }

    #[test]
    fn all_undefined_expression_is_empty() {
        assert_eq!(expand_uri_template("/search{?q,sort}", &Parameters::new()), "/search");
        let params = Parameters::new().with("list", Vec::<String>::new());
        assert_eq!(expand_uri_template("{/list*}", &params), "");
    }

    #[test]
    fn null_elements_are_skipped() {
        let params = Parameters::new().with("list", json!(["a", null, "b"]));
        assert_eq!(expand_uri_template("{?list*}", &params), "?list=a&list=b");
    }

    #[test]
    fn max_length_counts_characters_not_bytes() {
        let params = Parameters::new().with("var", "žluťoučký");
        assert_eq!(expand_uri_template("{var:2}", &params), "%C5%BEl");
    }

    #[test]
    fn reserved_expansion_keeps_percent_triples() {
        let params = Parameters::new().with("path", "a%20b c");
        assert_eq!(expand_uri_template("{+path}", &params), "a%20b%20c");
        assert_eq!(expand_uri_template("{path}", &params), "a%2520b%20c");
    }

    #[test]
    fn unreferenced_parameters_are_dropped() {
        let params = Parameters::new().with("owner", "milo").with("page", 2);
        assert_eq!(expand_uri_template("/users{/owner}", &params), "/users/milo");
    }
}

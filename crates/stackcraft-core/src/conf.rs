//! Stack configuration maps.

use serde_json::Value;

use crate::{Error, Result};

/// Flattened configuration for a single stack.
pub type StackConf = serde_json::Map<String, Value>;

/// Build a [`StackConf`] from literal `"key": value` pairs.
///
/// Values accept anything `serde_json::json!` accepts as a single token tree.
///
/// ```
/// use stackcraft_core::conf;
///
/// let conf = conf! {
///     "region": "eu-west-1",
///     "access": [["tcp", 22, "0.0.0.0/0"]],
/// };
/// assert_eq!(conf["region"], "eu-west-1");
/// ```
#[macro_export]
macro_rules! conf {
    () => {
        $crate::StackConf::new()
    };
    ($($key:literal : $value:tt),+ $(,)?) => {{
        let mut conf = $crate::StackConf::new();
        $(
            conf.insert($key.to_string(), $crate::serde_json::json!($value));
        )+
        conf
    }};
}

/// Render a scalar configuration value as a string.
///
/// Null, empty strings and non-scalar values count as unset.
pub fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Overlay `overrides` on top of `defaults`; override values win.
pub fn merge(defaults: &StackConf, overrides: StackConf) -> StackConf {
    let mut merged = defaults.clone();
    merged.extend(overrides);
    merged
}

/// Parse `key=value` tokens into a configuration map.
///
/// Only the first `=` splits. A token without `=` sets its key to null.
pub fn parse_override_tokens<I, S>(tokens: I) -> Result<StackConf>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut conf = StackConf::new();
    for token in tokens {
        let token = token.as_ref();
        let (key, value) = match token.split_once('=') {
            Some((key, value)) => (key, Value::String(value.to_string())),
            None => (token, Value::Null),
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::InvalidConf {
                key: token.to_string(),
                message: "override key must not be empty".to_string(),
            });
        }
        conf.insert(key.to_string(), value);
    }
    Ok(conf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_string() {
        assert_eq!(scalar_string(&json!("dev")), Some("dev".to_string()));
        assert_eq!(scalar_string(&json!(1)), Some("1".to_string()));
        assert_eq!(scalar_string(&json!(true)), Some("true".to_string()));
        assert_eq!(scalar_string(&json!("")), None);
        assert_eq!(scalar_string(&Value::Null), None);
        assert_eq!(scalar_string(&json!(["a"])), None);
    }

    #[test]
    fn test_merge_overrides_win() {
        let defaults = conf! { "region": "eu-west-1", "bucket": "default" };
        let merged = merge(&defaults, conf! { "bucket": "custom" });
        assert_eq!(merged["region"], "eu-west-1");
        assert_eq!(merged["bucket"], "custom");
    }

    #[test]
    fn test_parse_override_tokens() {
        let conf = parse_override_tokens(["region=us-east-1", "flag", "expr=a=b"]).unwrap();
        assert_eq!(conf["region"], "us-east-1");
        assert_eq!(conf["flag"], Value::Null);
        assert_eq!(conf["expr"], "a=b");
    }

    #[test]
    fn test_parse_override_tokens_rejects_empty_key() {
        let result = parse_override_tokens(["=value"]);
        assert!(matches!(result, Err(Error::InvalidConf { .. })));
    }
}

//! Config value evaluation
//!
//! A mapping whose only key is `_env` is replaced by the value of that
//! environment variable:
//!
//! ```yaml
//! overrides:
//!   flags:
//!     api-key:
//!       _env: API_KEY
//! ```
//!
//! The variable name may itself be an `_env` mapping.

use serde_yaml::Value;
use tracing::debug;

use super::ConfigError;

pub const ENV_KEY: &str = "_env";

/// Replace every `_env` mapping in `value`, reading the process environment
pub fn evaluate_env(value: &mut Value) -> Result<(), ConfigError> {
    evaluate_with(value, &|name| std::env::var(name).ok())
}

/// Replace every `_env` mapping in `value`, reading variables from `lookup`
pub fn evaluate_with(value: &mut Value, lookup: &dyn Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
    match value {
        Value::Mapping(map) => {
            if map.len() == 1 {
                if let Some(name) = map.get_mut(ENV_KEY) {
                    evaluate_with(name, lookup)?;
                    let Value::String(name) = name else {
                        return Err(ConfigError::InvalidEnvKey);
                    };
                    debug!(variable = %name, "reading config value from environment");
                    let resolved = lookup(name).ok_or_else(|| ConfigError::MissingEnv(name.clone()))?;
                    *value = Value::String(resolved);
                    return Ok(());
                }
            }
            for (_, v) in map.iter_mut() {
                evaluate_with(v, lookup)?;
            }
            Ok(())
        }
        Value::Sequence(items) => items.iter_mut().try_for_each(|v| evaluate_with(v, lookup)),
        Value::Tagged(tagged) => evaluate_with(&mut tagged.value, lookup),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "TOKEN" => Some("s3cret".to_string()),
            "TOKEN_VAR" => Some("TOKEN".to_string()),
            _ => None,
        }
    }

    fn evaluate(yaml: &str) -> Result<Value, ConfigError> {
        let mut value: Value = serde_yaml::from_str(yaml).unwrap();
        evaluate_with(&mut value, &lookup)?;
        Ok(value)
    }

    #[test]
    fn test_env_values_resolved_anywhere() {
        let value = evaluate(
            r#"
flags:
  token:
    _env: TOKEN
  list:
    - plain
    - _env: TOKEN
  nested:
    _env:
      _env: TOKEN_VAR
"#,
        )
        .unwrap();

        assert_eq!(value["flags"]["token"], Value::from("s3cret"));
        assert_eq!(value["flags"]["list"][0], Value::from("plain"));
        assert_eq!(value["flags"]["list"][1], Value::from("s3cret"));
        assert_eq!(value["flags"]["nested"], Value::from("s3cret"));
    }

    #[test]
    fn test_mapping_with_more_keys_is_left_alone() {
        let value = evaluate("a:\n  _env: TOKEN\n  other: 1\n").unwrap();
        assert_eq!(value["a"]["_env"], Value::from("TOKEN"));
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            evaluate("a:\n  _env: NOPE\n"),
            Err(ConfigError::MissingEnv(name)) if name == "NOPE"
        ));
        assert!(matches!(evaluate("a:\n  _env: [1]\n"), Err(ConfigError::InvalidEnvKey)));
    }
}

//! Partitioned YAML configuration.
//!
//! ```yaml
//! env: dev
//! region: eu-west-1
//! stack-foo:
//!   stackvar: baz
//! stack-bar:
//!   stackvar: bar
//! ```
//!
//! Partitioning the document above for `stack-bar` yields
//! `{env: dev, region: eu-west-1, stackvar: bar}`.

use serde_yaml::Value;
use stackcraft_core::StackConf;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;

use crate::{ConfigError, ConfigResult};

/// Extract the flattened configuration of one stack from a YAML stream.
///
/// Top-level keys whose values are not mappings are global and inherited by
/// every stack. The mapping named `section` is overlaid on top of them, its
/// values winning. A missing section yields just the globals.
pub fn partition_yaml<R: Read>(reader: R, section: &str) -> ConfigResult<StackConf> {
    let doc: Value = serde_yaml::from_reader(reader)?;
    partition(doc, section)
}

/// [`partition_yaml`] over an in-memory document.
pub fn partition_yaml_str(text: &str, section: &str) -> ConfigResult<StackConf> {
    let doc: Value = serde_yaml::from_str(text)?;
    partition(doc, section)
}

/// Open a configuration file and partition it for `section`.
pub fn load_partitioned(path: impl AsRef<Path>, section: &str) -> ConfigResult<StackConf> {
    let path = path.as_ref();
    debug!(path = %path.display(), section, "Loading stack configuration");
    let file = File::open(path)?;
    partition_yaml(BufReader::new(file), section)
}

fn partition(doc: Value, section: &str) -> ConfigResult<StackConf> {
    let Value::Mapping(root) = doc else {
        return Err(ConfigError::NotAMapping);
    };

    let mut conf = StackConf::new();
    for (key, value) in &root {
        // Only non-mapping values are inherited
        if value.is_mapping() {
            continue;
        }
        let key = scalar_key(key)?;
        let value = to_json(&key, value)?;
        conf.insert(key, value);
    }

    match root.get(section) {
        None => {}
        Some(Value::Mapping(tree)) => {
            for (key, value) in tree {
                let key = scalar_key(key)?;
                let value = to_json(&key, value)?;
                conf.insert(key, value);
            }
        }
        Some(_) => return Err(ConfigError::SectionNotAMapping(section.to_string())),
    }

    Ok(conf)
}

fn scalar_key(key: &Value) -> ConfigResult<String> {
    match key {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(ConfigError::InvalidKey(format!("{:?}", other))),
    }
}

fn to_json(key: &str, value: &Value) -> ConfigResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| ConfigError::Convert {
        key: key.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    const VALID_CONFIG: &str = r#"
env: dev
region: eu
stack-foo:
  k1: v1
  k2: v2
stack-bar:
  var: bar
"#;

    const INVALID_CONFIG_NOYAML: &str = "key: [unclosed";

    const INVALID_CONFIG_ROOT: &str = r#"
- foo
- bar
"#;

    const INVALID_CONFIG_STACK: &str = r#"
env: dev
region: eu
stack-foo:
 - bar
 - baz
"#;

    #[test]
    fn test_partition_usage() {
        let foo = partition_yaml_str(VALID_CONFIG, "stack-foo").unwrap();
        assert_eq!(
            serde_json::Value::Object(foo),
            json!({ "env": "dev", "region": "eu", "k1": "v1", "k2": "v2" })
        );

        let bar = partition_yaml(VALID_CONFIG.as_bytes(), "stack-bar").unwrap();
        assert_eq!(
            serde_json::Value::Object(bar),
            json!({ "env": "dev", "region": "eu", "var": "bar" })
        );
    }

    #[test]
    fn test_missing_section_yields_globals() {
        let conf = partition_yaml_str(VALID_CONFIG, "stack-baz").unwrap();
        assert_eq!(
            serde_json::Value::Object(conf),
            json!({ "env": "dev", "region": "eu" })
        );
    }

    #[test]
    fn test_section_values_win() {
        let doc = r#"
env: dev
region: eu-west-1
release: 1
stack-foo:
  region: us-east-1
  access:
    - [tcp, 22, 0.0.0.0/0]
"#;
        let conf = partition_yaml_str(doc, "stack-foo").unwrap();
        assert_eq!(conf["region"], "us-east-1");
        assert_eq!(conf["env"], "dev");
        assert_eq!(conf["release"], 1);
        assert_eq!(conf["access"], json!([["tcp", 22, "0.0.0.0/0"]]));
    }

    #[test]
    fn test_lists_are_inherited() {
        let doc = "zones: [a, b]\nstack-foo: {}\n";
        let conf = partition_yaml_str(doc, "stack-foo").unwrap();
        assert_eq!(conf["zones"], json!(["a", "b"]));
    }

    #[test]
    fn test_partition_validation() {
        assert!(matches!(
            partition_yaml_str(INVALID_CONFIG_NOYAML, "stack-foo"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            partition_yaml_str(INVALID_CONFIG_ROOT, "stack-foo"),
            Err(ConfigError::NotAMapping)
        ));
        assert!(matches!(
            partition_yaml_str(INVALID_CONFIG_STACK, "stack-foo"),
            Err(ConfigError::SectionNotAMapping(_))
        ));
        assert!(partition_yaml_str("", "stack-foo").is_err());
    }

    #[test]
    fn test_null_section_is_rejected() {
        let doc = "region: eu\nstack-foo:\n";
        assert!(matches!(
            partition_yaml_str(doc, "stack-foo"),
            Err(ConfigError::SectionNotAMapping(_))
        ));
    }

    #[test]
    fn test_load_partitioned_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(VALID_CONFIG.as_bytes()).unwrap();

        let conf = load_partitioned(file.path(), "stack-bar").unwrap();
        assert_eq!(conf["var"], "bar");

        let missing = load_partitioned(file.path().with_extension("missing"), "stack-bar");
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}

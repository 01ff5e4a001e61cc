//! Stack variants.
//!
//! A variant decides where a stack's configuration comes from, which
//! attributes must be present, how the stack is named and which tags it
//! carries. Variants are assembled from small named building blocks instead of
//! layered overrides, so each one lists exactly the checks and tag
//! contributors it applies.

use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::conf::{StackConf, scalar_string};
use crate::stack::Stack;
use crate::template::Tag;
use crate::{Error, Result};

/// Where a stack's configuration comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfSource {
    /// Caller-supplied configuration, as-is.
    Caller,
    /// The `StackSpec` default configuration; caller configuration is ignored.
    Defaults,
    /// Defaults overlaid with caller configuration, caller values winning.
    Merged,
}

/// A named check that must hold for a stack to be constructed.
#[derive(Clone, Copy)]
pub struct Requirement {
    pub attribute: &'static str,
    pub is_met: fn(&Stack) -> bool,
}

impl Requirement {
    pub fn check(&self, stack: &Stack) -> Result<()> {
        if (self.is_met)(stack) {
            Ok(())
        } else {
            Err(Error::MissingAttribute(self.attribute))
        }
    }
}

/// A named step in tag composition. Receives the tags accumulated so far and
/// returns them extended.
#[derive(Clone, Copy)]
pub struct TagContributor {
    pub name: &'static str,
    pub contribute: fn(&Stack, Vec<Tag>) -> Result<Vec<Tag>>,
}

pub type Naming = fn(&Stack) -> Result<String>;

/// A stack variant.
#[derive(Clone, Copy)]
pub struct Variant {
    pub name: &'static str,
    pub conf_source: ConfSource,
    pub requirements: &'static [Requirement],
    pub tag_contributors: &'static [TagContributor],
    pub naming: Option<Naming>,
}

pub const BASE_NAME_SET: Requirement = Requirement {
    attribute: "BASE_NAME",
    is_met: has_base_name,
};

pub const REGION_SET: Requirement = Requirement {
    attribute: "region",
    is_met: has_region,
};

pub const ENV_SET: Requirement = Requirement {
    attribute: "env",
    is_met: has_env,
};

pub const RELEASE_SET: Requirement = Requirement {
    attribute: "release",
    is_met: has_release,
};

pub const NAME_PLACEHOLDERS_SET: Requirement = Requirement {
    attribute: "name placeholders",
    is_met: has_name_placeholders,
};

pub const BASE_TAGS: TagContributor = TagContributor {
    name: "base",
    contribute: base_tags,
};

pub const ENV_TAG: TagContributor = TagContributor {
    name: "env",
    contribute: env_tag,
};

pub const RELEASE_TAG: TagContributor = TagContributor {
    name: "release",
    contribute: release_tag,
};

impl Variant {
    /// Validation and base tags only; naming is left to a concrete variant.
    pub const BASE: Variant = Variant {
        name: "base",
        conf_source: ConfSource::Caller,
        requirements: &[BASE_NAME_SET, REGION_SET],
        tag_contributors: &[BASE_TAGS],
        naming: None,
    };

    /// Always configured from the `StackSpec` defaults; named after the base name.
    pub const ZERO_CONF: Variant = Variant {
        name: "zero-conf",
        conf_source: ConfSource::Defaults,
        requirements: &[BASE_NAME_SET, REGION_SET],
        tag_contributors: &[BASE_TAGS],
        naming: Some(base_only_name),
    };

    /// Named `{base}-{env}`.
    pub const ENV: Variant = Variant {
        name: "env",
        conf_source: ConfSource::Caller,
        requirements: &[ENV_SET, BASE_NAME_SET, REGION_SET],
        tag_contributors: &[BASE_TAGS, ENV_TAG],
        naming: Some(env_name),
    };

    /// Named `{base}-{env}-{release}`.
    pub const RELEASE_ENV: Variant = Variant {
        name: "release-env",
        conf_source: ConfSource::Caller,
        requirements: &[ENV_SET, BASE_NAME_SET, REGION_SET, RELEASE_SET],
        tag_contributors: &[BASE_TAGS, ENV_TAG, RELEASE_TAG],
        naming: Some(release_env_name),
    };

    /// Defaults merged with caller overrides. `{key}` placeholders in the base
    /// name are replaced with configuration values.
    pub const INLINE_CONF: Variant = Variant {
        name: "inline-conf",
        conf_source: ConfSource::Merged,
        requirements: &[BASE_NAME_SET, REGION_SET, NAME_PLACEHOLDERS_SET],
        tag_contributors: &[BASE_TAGS],
        naming: Some(placeholder_name),
    };

    /// Resolve the configuration a stack of this variant is built from.
    pub fn resolve_conf(&self, defaults: &StackConf, caller: StackConf) -> StackConf {
        match self.conf_source {
            ConfSource::Caller => caller,
            ConfSource::Defaults => defaults.clone(),
            ConfSource::Merged => crate::conf::merge(defaults, caller),
        }
    }

    pub fn validate(&self, stack: &Stack) -> Result<()> {
        self.requirements.iter().try_for_each(|r| r.check(stack))
    }

    pub fn stackname(&self, stack: &Stack) -> Result<String> {
        match self.naming {
            Some(naming) => naming(stack),
            None => Err(Error::Unimplemented(format!(
                "stack naming for the {} variant",
                self.name
            ))),
        }
    }

    pub fn tags(&self, stack: &Stack) -> Result<Vec<Tag>> {
        self.tag_contributors
            .iter()
            .try_fold(Vec::new(), |tags, c| (c.contribute)(stack, tags))
    }
}

impl std::fmt::Debug for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Variant")
            .field("name", &self.name)
            .field("conf_source", &self.conf_source)
            .field(
                "requirements",
                &self.requirements.iter().map(|r| r.attribute).collect::<Vec<_>>(),
            )
            .field(
                "tag_contributors",
                &self.tag_contributors.iter().map(|c| c.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl PartialEq for Variant {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

// Requirement checks

fn has_base_name(stack: &Stack) -> bool {
    !stack.base_name().is_empty()
}

fn has_region(stack: &Stack) -> bool {
    !stack.region().is_empty()
}

fn has_env(stack: &Stack) -> bool {
    stack.env().is_some()
}

fn has_release(stack: &Stack) -> bool {
    stack.release().is_some()
}

fn has_name_placeholders(stack: &Stack) -> bool {
    substitute_placeholders(stack.base_name(), stack.conf()).is_ok()
}

// Naming rules

fn base_only_name(stack: &Stack) -> Result<String> {
    Ok(stack.base_name().to_string())
}

fn env_name(stack: &Stack) -> Result<String> {
    let env = stack.env().ok_or(Error::MissingAttribute("env"))?;
    Ok(format!("{}-{}", stack.base_name(), env))
}

fn release_env_name(stack: &Stack) -> Result<String> {
    let env = stack.env().ok_or(Error::MissingAttribute("env"))?;
    let release = stack.release().ok_or(Error::MissingAttribute("release"))?;
    Ok(format!("{}-{}-{}", stack.base_name(), env, release))
}

fn placeholder_name(stack: &Stack) -> Result<String> {
    substitute_placeholders(stack.base_name(), stack.conf())
}

// Tag contributors

fn base_tags(stack: &Stack, mut tags: Vec<Tag>) -> Result<Vec<Tag>> {
    tags.push(Tag::new("Name", stack.stackname()?));
    tags.push(Tag::new("BaseName", stack.base_name()));
    Ok(tags)
}

fn env_tag(stack: &Stack, mut tags: Vec<Tag>) -> Result<Vec<Tag>> {
    let env = stack.env().ok_or(Error::MissingAttribute("env"))?;
    tags.push(Tag::new("Env", env));
    Ok(tags)
}

fn release_tag(stack: &Stack, mut tags: Vec<Tag>) -> Result<Vec<Tag>> {
    let release = stack.release().ok_or(Error::MissingAttribute("release"))?;
    tags.push(Tag::new("Release", release));
    Ok(tags)
}

// Matches `{key}` placeholders in base names.
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// Replace every `{key}` in `template` with the scalar configuration value
/// of `key`.
pub fn substitute_placeholders(template: &str, conf: &StackConf) -> Result<String> {
    let mut missing: Option<String> = None;
    let name = PLACEHOLDER.replace_all(template, |caps: &Captures| {
        let key = &caps[1];
        match conf.get(key).and_then(scalar_string) {
            Some(value) => value,
            None => {
                missing.get_or_insert_with(|| key.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(key) => Err(Error::InvalidConf {
            key,
            message: "stack name placeholder has no configuration value".to_string(),
        }),
        None => Ok(name.into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf;

    #[test]
    fn test_substitute_placeholders() {
        let conf = conf! { "team": "data", "shard": 3 };
        assert_eq!(
            substitute_placeholders("bucket-{team}-{shard}", &conf).unwrap(),
            "bucket-data-3"
        );
        assert_eq!(substitute_placeholders("plain", &conf).unwrap(), "plain");
    }

    #[test]
    fn test_substitute_placeholders_missing_key() {
        let result = substitute_placeholders("bucket-{owner}", &conf! { "team": "data" });
        match result {
            Err(Error::InvalidConf { key, .. }) => assert_eq!(key, "owner"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_variant_conf_sources() {
        let defaults = conf! { "region": "eu-west-1", "size": "s" };
        let caller = conf! { "size": "xl" };

        let zero = Variant::ZERO_CONF.resolve_conf(&defaults, caller.clone());
        assert_eq!(zero["size"], "s");

        let merged = Variant::INLINE_CONF.resolve_conf(&defaults, caller.clone());
        assert_eq!(merged["size"], "xl");
        assert_eq!(merged["region"], "eu-west-1");

        let env = Variant::ENV.resolve_conf(&defaults, caller);
        assert!(env.get("region").is_none());
    }

    #[test]
    fn test_release_variant_keeps_base_and_env_checks() {
        let attributes: Vec<_> = Variant::RELEASE_ENV
            .requirements
            .iter()
            .map(|r| r.attribute)
            .collect();
        assert_eq!(attributes, vec!["env", "BASE_NAME", "region", "release"]);
    }
}

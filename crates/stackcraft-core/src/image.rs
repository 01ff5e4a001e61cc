//! Image identifier resolution.

use tracing::debug;

use crate::provider::Provider;
use crate::{Error, Result};

/// Region name that never reaches a provider. Stacks built for tests or
/// offline rendering use it.
pub const OFFLINE_REGION: &str = "offline";

/// Identifier returned when no lookup is performed.
pub const PLACEHOLDER_IMAGE_ID: &str = "ami-00000000";

/// Resolve a human-readable manifest location (e.g.
/// `amazon/amzn2-ami-hvm-2.0.20191116.0-x86_64-ebs`) to an image id.
///
/// Exactly one image must match. Nothing is cached and failures are not
/// retried.
pub fn resolve_image_id(
    provider: Option<&dyn Provider>,
    region: &str,
    location: &str,
) -> Result<String> {
    if location.is_empty() || region == OFFLINE_REGION {
        return Ok(PLACEHOLDER_IMAGE_ID.to_string());
    }

    let provider = provider.ok_or_else(|| Error::NoImageLookup(region.to_string()))?;
    let mut images = provider.find_images(region, location)?;
    debug!(region, location, matches = images.len(), "Image lookup");

    match images.len() {
        0 => Err(Error::NoImageMatch(location.to_string())),
        1 => Ok(images.remove(0)),
        count => Err(Error::AmbiguousImage {
            location: location.to_string(),
            count,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{
        ProviderError, ProviderResponse, StackDescription, StackEvent, StackRequest,
    };

    struct Catalog(Vec<&'static str>);

    impl Provider for Catalog {
        fn describe_stack(&self, name: &str) -> std::result::Result<StackDescription, ProviderError> {
            Err(ProviderError::NotFound(name.to_string()))
        }

        fn describe_stack_events(
            &self,
            name: &str,
        ) -> std::result::Result<Vec<StackEvent>, ProviderError> {
            Err(ProviderError::NotFound(name.to_string()))
        }

        fn validate_template(&self, _: &str) -> std::result::Result<ProviderResponse, ProviderError> {
            unreachable!()
        }

        fn create_stack(&self, _: &StackRequest) -> std::result::Result<ProviderResponse, ProviderError> {
            unreachable!()
        }

        fn update_stack(&self, _: &StackRequest) -> std::result::Result<ProviderResponse, ProviderError> {
            unreachable!()
        }

        fn delete_stack(&self, _: &str) -> std::result::Result<ProviderResponse, ProviderError> {
            unreachable!()
        }

        fn find_images(
            &self,
            _region: &str,
            _location: &str,
        ) -> std::result::Result<Vec<String>, ProviderError> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    #[test]
    fn test_short_circuits_without_provider() {
        assert_eq!(resolve_image_id(None, "eu-west-1", "").unwrap(), PLACEHOLDER_IMAGE_ID);
        assert_eq!(
            resolve_image_id(None, OFFLINE_REGION, "amazon/some-ami").unwrap(),
            PLACEHOLDER_IMAGE_ID
        );
    }

    #[test]
    fn test_single_match() {
        let catalog = Catalog(vec!["ami-123"]);
        assert_eq!(
            resolve_image_id(Some(&catalog), "eu-west-1", "amazon/some-ami").unwrap(),
            "ami-123"
        );
    }

    #[test]
    fn test_cardinality_errors() {
        let none = Catalog(vec![]);
        assert!(matches!(
            resolve_image_id(Some(&none), "eu-west-1", "amazon/x"),
            Err(Error::NoImageMatch(_))
        ));

        let many = Catalog(vec!["ami-1", "ami-2"]);
        assert!(matches!(
            resolve_image_id(Some(&many), "eu-west-1", "amazon/x"),
            Err(Error::AmbiguousImage { count: 2, .. })
        ));
    }

    #[test]
    fn test_lookup_requires_provider() {
        assert!(matches!(
            resolve_image_id(None, "eu-west-1", "amazon/x"),
            Err(Error::NoImageLookup(_))
        ));
    }
}

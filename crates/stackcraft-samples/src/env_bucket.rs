//! An environment-qualified bucket configured from a partitioned YAML file.
//!
//! ```yaml
//! env: dev
//! region: eu-west-1
//! env-bucket:
//!   versioning: Enabled
//! ```

use stackcraft_core::template::{get_att, sub};
use stackcraft_core::{Output, Resource, Result, Stack, StackSpec, Variant};

pub const BASE_NAME: &str = "env-bucket";

const BUCKET_ID: &str = "Bucket";

pub fn spec() -> StackSpec {
    StackSpec::builder(BASE_NAME, Variant::ENV)
        .description("Bucket qualified by environment")
        .resource("bucket", bucket)
        .output("bucket_arn", bucket_arn)
        .build()
}

fn bucket(stack: &Stack) -> Result<Resource> {
    let versioning = stack
        .conf()
        .get("versioning")
        .and_then(|v| v.as_str())
        .unwrap_or("Suspended");
    Ok(Resource::new(BUCKET_ID, "AWS::S3::Bucket")
        .property("BucketName", sub(format!("${{AWS::AccountId}}-{}", stack.stackname()?)))
        .property(
            "VersioningConfiguration",
            serde_json::json!({ "Status": versioning }),
        ))
}

fn bucket_arn(_: &Stack) -> Result<Output> {
    Ok(Output::new("BucketArn", get_att(BUCKET_ID, "Arn"))
        .description("The ARN of the S3 bucket")
        .exported())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackcraft_core::{Error, conf};

    #[test]
    fn test_env_qualified_name() {
        let stack = Stack::new(spec(), conf! { "region": "eu-west-1", "env": "dev" }).unwrap();
        assert_eq!(stack.stackname().unwrap(), "env-bucket-dev");

        let template = stack.compile().unwrap();
        let bucket = template.resource(BUCKET_ID).unwrap();
        assert_eq!(
            bucket.get("BucketName"),
            Some(&sub("${AWS::AccountId}-env-bucket-dev"))
        );
        assert_eq!(bucket.get("VersioningConfiguration").unwrap()["Status"], "Suspended");
    }

    #[test]
    fn test_env_is_required() {
        let result = Stack::new(spec(), conf! { "region": "eu-west-1" });
        assert!(matches!(result, Err(Error::MissingAttribute("env"))));
    }
}

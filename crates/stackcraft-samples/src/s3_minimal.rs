//! A single S3 bucket exporting its ARN.

use stackcraft_core::template::get_att;
use stackcraft_core::{Output, Resource, Result, Stack, StackSpec, Variant, conf};

pub const BASE_NAME: &str = "my-s3-bucket-stack";

const BUCKET_ID: &str = "MyBucketResource";

pub fn spec() -> StackSpec {
    StackSpec::builder(BASE_NAME, Variant::INLINE_CONF)
        .description("A single S3 bucket")
        .default_conf(conf! {
            "region": "eu-west-1",
            // Prefix the bucket name with the account id
            "bucket_name": { "Fn::Sub": "${AWS::AccountId}-my-first-stackcraft-bucket" },
        })
        .resource("bucket", bucket)
        .output("bucket_arn", bucket_arn)
        .build()
}

fn bucket(stack: &Stack) -> Result<Resource> {
    Ok(Resource::new(BUCKET_ID, "AWS::S3::Bucket")
        .property("BucketName", stack.conf_value("bucket_name")?.clone()))
}

fn bucket_arn(_: &Stack) -> Result<Output> {
    Ok(Output::new("BucketArn", get_att(BUCKET_ID, "Arn"))
        .description("The ARN of the S3 bucket")
        .exported())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stackcraft_core::StackConf;
    use stackcraft_core::template::sub;

    #[test]
    fn test_defaults() {
        let stack = Stack::new(spec(), StackConf::new()).unwrap();
        assert_eq!(stack.stackname().unwrap(), BASE_NAME);
        assert_eq!(stack.region(), "eu-west-1");

        let template = stack.compile().unwrap();
        let bucket = template.resource(BUCKET_ID).unwrap();
        assert_eq!(
            bucket.get("BucketName"),
            Some(&sub("${AWS::AccountId}-my-first-stackcraft-bucket"))
        );
        let output = &template.outputs["BucketArn"];
        assert_eq!(output.value, json!({ "Fn::GetAtt": [BUCKET_ID, "Arn"] }));
        assert_eq!(
            output.export,
            Some(json!({ "Name": { "Fn::Sub": "${AWS::StackName}-BucketArn" } }))
        );
    }

    #[test]
    fn test_overrides() {
        let stack = Stack::from_override_tokens(spec(), ["bucket_name=logs", "region=us-east-1"])
            .unwrap();
        assert_eq!(stack.region(), "us-east-1");
        let template = stack.compile().unwrap();
        assert_eq!(
            template.resource(BUCKET_ID).unwrap().get("BucketName"),
            Some(&json!("logs"))
        );
    }
}

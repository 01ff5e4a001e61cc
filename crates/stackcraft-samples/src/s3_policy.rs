//! An S3 bucket with an IP-restricted read policy, plus a custom `policy`
//! command printing the effective policy document.

use serde_json::json;
use stackcraft_cli::Session;
use stackcraft_core::template::{get_att, join, reference, sub};
use stackcraft_core::{Error, Output, Resource, Result, Stack, StackSpec, Variant, conf};

pub const BASE_NAME: &str = "example-s3-stack";

const BUCKET_ID: &str = "S3Bucket";
const POLICY_ID: &str = "S3BucketPolicy";

pub fn spec() -> StackSpec {
    StackSpec::builder(BASE_NAME, Variant::INLINE_CONF)
        .description("S3 bucket with IP-based access restriction")
        .default_conf(conf! {
            "region": "eu-west-1",
            "bucket_name": "${AWS::AccountId}-stackcraft-my-test-bucket",
            // Use 0.0.0.0/0 to allow access from anywhere
            "allowed_cidr": "0.0.0.0/0",
        })
        .resource("bucket", bucket)
        .resource("bucket_policy", bucket_policy)
        .output("bucket_arn", bucket_arn)
        .build()
}

fn bucket(stack: &Stack) -> Result<Resource> {
    Ok(Resource::new(BUCKET_ID, "AWS::S3::Bucket")
        .property("BucketName", sub(stack.conf_str("bucket_name")?)))
}

fn bucket_policy(stack: &Stack) -> Result<Resource> {
    let document = json!({
        "Statement": [{
            "Action": ["s3:GetObject"],
            "Effect": "Allow",
            "Resource": join("", vec![json!("arn:aws:s3:::"), reference(BUCKET_ID), json!("/*")]),
            "Principal": "*",
            "Condition": {
                "IpAddress": { "aws:SourceIp": stack.conf_value("allowed_cidr")? }
            }
        }]
    });

    Ok(Resource::new(POLICY_ID, "AWS::S3::BucketPolicy")
        .property("Bucket", reference(BUCKET_ID))
        .property("PolicyDocument", document))
}

fn bucket_arn(_: &Stack) -> Result<Output> {
    Ok(Output::new("BucketArn", get_att(BUCKET_ID, "Arn"))
        .description("The ARN of the S3 bucket")
        .exported())
}

/// Print the bucket policy document the stack would deploy.
pub fn print_policy(session: &mut Session<'_>) -> anyhow::Result<()> {
    let policy = session
        .stack
        .resources_of("bucket_policy")?
        .into_iter()
        .next()
        .ok_or(Error::MissingAttribute("bucket policy resource"))?;
    let document = policy.get("PolicyDocument").cloned().unwrap_or_default();

    session.println(format!("Policy for bucket in stack {}:", session.stackname()?))?;
    session.println(serde_json::to_string_pretty(&document)?)?;
    Ok(())
}

//! An S3 bucket together with a named IAM user allowed to access it.
//!
//! The named user requires the `CAPABILITY_NAMED_IAM` capability.

use serde_json::json;
use stackcraft_core::template::{get_att, join, reference, sub};
use stackcraft_core::{Output, Resource, Result, Stack, StackSpec, Variant, conf};

pub const BASE_NAME: &str = "s3-iam-stack";

const BUCKET_ID: &str = "S3Bucket";
const USER_ID: &str = "S3BotUser";

pub fn spec() -> StackSpec {
    StackSpec::builder(BASE_NAME, Variant::INLINE_CONF)
        .description("S3 bucket with a dedicated IAM user")
        .capability("CAPABILITY_NAMED_IAM")
        .default_conf(conf! {
            "region": "eu-west-1",
            "bucket_name": "${AWS::AccountId}-my-s3-iam-test-bucket",
            // Must start and end with a slash
            "path": "/bot/${AWS::StackName}/",
            "username": "${AWS::StackName}-s3bot",
            "allowed_actions": ["s3:*"],
        })
        .resource("bucket", bucket)
        .resource("iam_user", iam_user)
        .output("bucket_arn", bucket_arn)
        .output("username", username)
        .build()
}

fn bucket(stack: &Stack) -> Result<Resource> {
    Ok(Resource::new(BUCKET_ID, "AWS::S3::Bucket")
        .property("BucketName", sub(stack.conf_str("bucket_name")?)))
}

fn iam_user(stack: &Stack) -> Result<Resource> {
    let policy = json!({
        "PolicyName": sub("${AWS::StackName}-policy"),
        "PolicyDocument": {
            "Statement": [{
                "Action": stack.conf_value("allowed_actions")?,
                "Effect": "Allow",
                "Resource": join("", vec![json!("arn:aws:s3:::"), reference(BUCKET_ID), json!("/*")]),
            }]
        }
    });

    Ok(Resource::new(USER_ID, "AWS::IAM::User")
        .property("Path", sub(stack.conf_str("path")?))
        .property("UserName", sub(stack.conf_str("username")?))
        .property("Policies", json!([policy])))
}

fn bucket_arn(_: &Stack) -> Result<Output> {
    Ok(Output::new("BucketArn", get_att(BUCKET_ID, "Arn"))
        .description("The ARN of the S3 bucket")
        .exported())
}

fn username(_: &Stack) -> Result<Output> {
    Ok(Output::new("UserName", reference(USER_ID))
        .description("Username of the created bot account")
        .exported())
}

//! A pay-per-request DynamoDB table keyed on a single string attribute.

use serde_json::json;
use stackcraft_core::template::{get_att, reference};
use stackcraft_core::{Output, Resource, Result, Stack, StackSpec, Variant, conf};

pub const BASE_NAME: &str = "example-dynamodb";

const TABLE_ID: &str = "DynamoDbTable";

pub fn spec() -> StackSpec {
    StackSpec::builder(BASE_NAME, Variant::INLINE_CONF)
        .default_conf(conf! {
            "region": "eu-west-1",
            "table_name": "stackcraft-sample-table",
            "table_key": "stackcraft-sample-key",
        })
        .resource("table", table)
        .output("table_outputs", table_outputs)
        .build()
}

fn table(stack: &Stack) -> Result<Resource> {
    let key = stack.conf_str("table_key")?;
    Ok(Resource::new(TABLE_ID, "AWS::DynamoDB::Table")
        .property("TableName", stack.conf_str("table_name")?)
        .property("BillingMode", "PAY_PER_REQUEST")
        .property(
            "AttributeDefinitions",
            json!([{ "AttributeName": key, "AttributeType": "S" }]),
        )
        .property("KeySchema", json!([{ "AttributeName": key, "KeyType": "HASH" }])))
}

fn table_outputs(_: &Stack) -> Result<Vec<Output>> {
    Ok(vec![
        Output::new("TableName", reference(TABLE_ID))
            .description("The name of the DynamoDB table")
            .exported(),
        Output::new("TableArn", get_att(TABLE_ID, "Arn"))
            .description("The ARN identifier of the DynamoDB table")
            .exported(),
    ])
}

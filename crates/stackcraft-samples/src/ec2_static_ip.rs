//! A single EC2 instance with a static private IP and its own security group.
//!
//! The image is given as a manifest location (the "Source" shown in the
//! console, e.g. `amazon/amzn2-ami-hvm-2.0.20191116.0-x86_64-ebs`) and
//! resolved to an image id at compile time.

use serde_json::{Value, json};
use stackcraft_core::template::reference;
use stackcraft_core::{Error, Resource, Result, Stack, StackSpec, Variant, conf};

pub const BASE_NAME: &str = "ec2-instance";

const SECURITY_GROUP_ID: &str = "Ec2SecurityGroup";
const INSTANCE_ID: &str = "Ec2Instance";

pub fn spec() -> StackSpec {
    StackSpec::builder(BASE_NAME, Variant::INLINE_CONF)
        .description("Single EC2 instance with a static IP address")
        .default_conf(conf! {
            "region": "eu-west-1",
            "instance_type": "t3.nano",
            // (protocol, port, network range) triples to allow ingress from
            "access": [["tcp", 22, "0.0.0.0/0"]],
            "vpc_id": "REPLACE-ME",
            "subnet_id": "REPLACE-ME",
            "ssh_key_name": "REPLACE-ME",
            "private_ip": "REPLACE-ME",
            "ami_location": "",
        })
        .resource("security_group", security_group)
        .resource("ingress", ingress)
        .resource("instance", instance)
        .build()
}

/// One allowed ingress rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Access {
    pub protocol: String,
    pub port: u16,
    pub cidr: String,
}

/// Parse the `access` configuration list.
pub fn access_rules(stack: &Stack) -> Result<Vec<Access>> {
    let invalid = |message: &str| Error::InvalidConf {
        key: "access".to_string(),
        message: message.to_string(),
    };

    let entries = stack
        .conf_value("access")?
        .as_array()
        .ok_or_else(|| invalid("expected a list of [protocol, port, cidr] entries"))?;

    entries
        .iter()
        .map(|entry| match entry.as_array().map(Vec::as_slice) {
            Some([Value::String(protocol), port, Value::String(cidr)]) => {
                let port = port
                    .as_u64()
                    .and_then(|p| u16::try_from(p).ok())
                    .ok_or_else(|| invalid("port must be an integer between 0 and 65535"))?;
                Ok(Access {
                    protocol: protocol.clone(),
                    port,
                    cidr: cidr.clone(),
                })
            }
            _ => Err(invalid("each entry must be [protocol, port, cidr]")),
        })
        .collect()
}

fn security_group(stack: &Stack) -> Result<Resource> {
    Ok(Resource::new(SECURITY_GROUP_ID, "AWS::EC2::SecurityGroup")
        .property("VpcId", stack.conf_str("vpc_id")?)
        .property("GroupDescription", "Access to the instance ports"))
}

fn ingress(stack: &Stack) -> Result<Vec<Resource>> {
    let rules = access_rules(stack)?;
    Ok(rules
        .into_iter()
        .enumerate()
        .map(|(i, rule)| {
            Resource::new(format!("Ec2Ingress{}", i), "AWS::EC2::SecurityGroupIngress")
                .property("GroupId", reference(SECURITY_GROUP_ID))
                .property("IpProtocol", rule.protocol)
                .property("FromPort", rule.port)
                .property("ToPort", rule.port)
                .property("CidrIp", rule.cidr)
        })
        .collect())
}

fn instance(stack: &Stack) -> Result<Resource> {
    Ok(Resource::new(INSTANCE_ID, "AWS::EC2::Instance")
        .property("ImageId", stack.image_id(stack.conf_str("ami_location")?)?)
        .property("InstanceType", stack.conf_str("instance_type")?)
        .property("KeyName", stack.conf_str("ssh_key_name")?)
        .property("SecurityGroupIds", json!([reference(SECURITY_GROUP_ID)]))
        .property("PrivateIpAddress", stack.conf_str("private_ip")?)
        .property("SubnetId", stack.conf_str("subnet_id")?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackcraft_core::StackConf;
    use stackcraft_core::image::PLACEHOLDER_IMAGE_ID;

    #[test]
    fn test_ingress_fan_out() {
        let conf = conf! {
            "access": [["tcp", 22, "10.0.0.0/8"], ["tcp", 443, "0.0.0.0/0"]],
        };
        let stack = Stack::new(spec(), conf).unwrap();
        let template = stack.compile().unwrap();

        let ingress: Vec<_> = template
            .resources_of_type("AWS::EC2::SecurityGroupIngress")
            .collect();
        assert_eq!(ingress.len(), 2);
        assert_eq!(ingress[1].get("FromPort"), Some(&json!(443)));
        assert_eq!(ingress[0].get("GroupId"), Some(&reference(SECURITY_GROUP_ID)));
    }

    #[test]
    fn test_empty_ami_location_uses_placeholder() {
        let stack = Stack::new(spec(), StackConf::new()).unwrap();
        let template = stack.compile().unwrap();
        assert_eq!(
            template.resource(INSTANCE_ID).unwrap().get("ImageId"),
            Some(&json!(PLACEHOLDER_IMAGE_ID))
        );
    }

    #[test]
    fn test_ami_lookup_without_provider_fails() {
        let stack = Stack::from_override_tokens(spec(), ["ami_location=amazon/some-ami"]).unwrap();
        assert!(matches!(stack.compile(), Err(Error::NoImageLookup(_))));
    }

    #[test]
    fn test_malformed_access_entry() {
        let stack = Stack::new(spec(), conf! { "access": [["tcp", "ssh", "0.0.0.0/0"]] }).unwrap();
        match stack.compile() {
            Err(Error::InvalidConf { key, .. }) => assert_eq!(key, "access"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}

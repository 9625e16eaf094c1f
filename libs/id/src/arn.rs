//! Remote resource ARNs.
//!
//! Every observed virtual node exposes a stable ARN naming partition,
//! region, account, parent mesh, and node:
//! `arn:{partition}:appmesh:{region}:{account}:mesh/{mesh}/virtualNode/{name}`

use crate::{IdError, MeshName, ObjectIdentity, VirtualNodeName};

const SERVICE: &str = "appmesh";
const ACCOUNT_ID_LEN: usize = 12;

/// ARN of a virtual node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceArn {
    partition: String,
    region: String,
    account_id: String,
    identity: ObjectIdentity,
}

impl ResourceArn {
    /// Builds an ARN for an identity in the given partition/region/account.
    pub fn new(
        partition: impl Into<String>,
        region: impl Into<String>,
        account_id: impl Into<String>,
        identity: ObjectIdentity,
    ) -> Result<Self, IdError> {
        let arn = Self {
            partition: partition.into(),
            region: region.into(),
            account_id: account_id.into(),
            identity,
        };
        arn.validate()?;
        Ok(arn)
    }

    /// Parses an ARN string.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        let invalid = |reason: &str| IdError::InvalidArn {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = s.splitn(6, ':').collect();
        let [prefix, partition, service, region, account_id, resource] = parts[..] else {
            return Err(invalid("expected 6 ':'-separated fields"));
        };
        if prefix != "arn" {
            return Err(invalid("must start with 'arn:'"));
        }
        if service != SERVICE {
            return Err(invalid("service must be 'appmesh'"));
        }

        let segments: Vec<&str> = resource.split('/').collect();
        let ["mesh", mesh, "virtualNode", name] = segments[..] else {
            return Err(invalid("resource must be 'mesh/<mesh>/virtualNode/<name>'"));
        };

        let identity = ObjectIdentity::new(MeshName::parse(mesh)?, VirtualNodeName::parse(name)?);
        Self::new(partition, region, account_id, identity)
    }

    fn validate(&self) -> Result<(), IdError> {
        let invalid = |reason: String| IdError::InvalidArn {
            value: self.to_string(),
            reason,
        };

        if self.partition.is_empty() {
            return Err(invalid("partition is empty".to_string()));
        }
        if self.region.is_empty() {
            return Err(invalid("region is empty".to_string()));
        }
        if self.account_id.len() != ACCOUNT_ID_LEN
            || !self.account_id.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid(format!(
                "account id must be {ACCOUNT_ID_LEN} digits"
            )));
        }
        Ok(())
    }

    /// Returns the partition (e.g. `aws`).
    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// Returns the region.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Returns the account id.
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Returns the identity named by this ARN.
    pub fn identity(&self) -> &ObjectIdentity {
        &self.identity
    }
}

impl std::fmt::Display for ResourceArn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:mesh/{}/virtualNode/{}",
            self.partition,
            SERVICE,
            self.region,
            self.account_id,
            self.identity.mesh(),
            self.identity.name()
        )
    }
}

impl std::str::FromStr for ResourceArn {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl serde::Serialize for ResourceArn {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for ResourceArn {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> ObjectIdentity {
        ObjectIdentity::parse("tf-test-mesh-1/tf-test-node-2").unwrap()
    }

    #[test]
    fn test_arn_format() {
        let arn = ResourceArn::new("aws", "us-west-2", "123456789012", identity()).unwrap();
        assert_eq!(
            arn.to_string(),
            "arn:aws:appmesh:us-west-2:123456789012:mesh/tf-test-mesh-1/virtualNode/tf-test-node-2"
        );
    }

    #[test]
    fn test_arn_parse_roundtrip() {
        let s = "arn:aws-cn:appmesh:cn-north-1:000011112222:mesh/m/virtualNode/n";
        let arn = ResourceArn::parse(s).unwrap();
        assert_eq!(arn.partition(), "aws-cn");
        assert_eq!(arn.region(), "cn-north-1");
        assert_eq!(arn.account_id(), "000011112222");
        assert_eq!(arn.identity().to_string(), "m/n");
        assert_eq!(arn.to_string(), s);
    }

    #[test]
    fn test_arn_rejects_bad_account() {
        let err = ResourceArn::new("aws", "us-east-1", "1234", identity()).unwrap_err();
        assert!(matches!(err, IdError::InvalidArn { .. }));
    }

    #[test]
    fn test_arn_rejects_wrong_resource() {
        let s = "arn:aws:appmesh:us-east-1:123456789012:mesh/m/virtualRouter/r";
        assert!(ResourceArn::parse(s).is_err());
    }

    #[test]
    fn test_arn_rejects_wrong_service() {
        let s = "arn:aws:ecs:us-east-1:123456789012:mesh/m/virtualNode/n";
        assert!(ResourceArn::parse(s).is_err());
    }
}

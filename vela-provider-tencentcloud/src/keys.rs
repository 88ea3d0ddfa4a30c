//! Typed composite keys
//!
//! Resources without a single remote ID are addressed by a struct that knows
//! its own field order. Encoding and decoding go through these types only;
//! nothing else in the provider joins or splits raw identifier strings.

use vela_core::key::{IdError, join_id, split_id};

/// Identifier of a database account: `cluster_id#account_name#host`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountId {
    pub cluster_id: String,
    pub account_name: String,
    pub host: String,
}

impl AccountId {
    pub fn new(
        cluster_id: impl Into<String>,
        account_name: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            account_name: account_name.into(),
            host: host.into(),
        }
    }

    pub fn encode(&self) -> String {
        join_id(&[&self.cluster_id, &self.account_name, &self.host])
    }

    pub fn decode(id: &str) -> Result<Self, IdError> {
        let parts = split_id(id, 3)?;
        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}

/// Identifier of a license order: `resource_id#license_type`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseOrderId {
    pub resource_id: String,
    pub license_type: u64,
}

impl LicenseOrderId {
    pub fn new(resource_id: impl Into<String>, license_type: u64) -> Self {
        Self {
            resource_id: resource_id.into(),
            license_type,
        }
    }

    pub fn encode(&self) -> String {
        join_id(&[self.resource_id.as_str(), &self.license_type.to_string()])
    }

    pub fn decode(id: &str) -> Result<Self, IdError> {
        let parts = split_id(id, 2)?;
        Ok(Self::new(parts[0], parse_numeric_part(id, parts[1])?))
    }
}

/// Identifier of a license-to-machine binding:
/// `resource_id#license_id#quuid#license_type`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseBindId {
    pub resource_id: String,
    pub license_id: u64,
    pub quuid: String,
    pub license_type: u64,
}

impl LicenseBindId {
    pub fn new(
        resource_id: impl Into<String>,
        license_id: u64,
        quuid: impl Into<String>,
        license_type: u64,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            license_id,
            quuid: quuid.into(),
            license_type,
        }
    }

    pub fn encode(&self) -> String {
        join_id(&[
            self.resource_id.as_str(),
            &self.license_id.to_string(),
            &self.quuid,
            &self.license_type.to_string(),
        ])
    }

    pub fn decode(id: &str) -> Result<Self, IdError> {
        let parts = split_id(id, 4)?;
        Ok(Self::new(
            parts[0],
            parse_numeric_part(id, parts[1])?,
            parts[2],
            parse_numeric_part(id, parts[3])?,
        ))
    }
}

fn parse_numeric_part(id: &str, part: &str) -> Result<u64, IdError> {
    part.parse()
        .map_err(|_| IdError::Malformed { id: id.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_round_trips() {
        let id = AccountId::new("cynosdbmysql-bzs467r3", "app_user", "%");
        let encoded = id.encode();
        assert_eq!(encoded, "cynosdbmysql-bzs467r3#app_user#%");
        assert_eq!(AccountId::decode(&encoded).unwrap(), id);
    }

    #[test]
    fn license_order_id_round_trips() {
        let id = LicenseOrderId::new("res-3ject8qu", 1);
        let encoded = id.encode();
        assert_eq!(encoded, "res-3ject8qu#1");
        assert_eq!(LicenseOrderId::decode(&encoded).unwrap(), id);
    }

    #[test]
    fn license_bind_id_round_trips() {
        let id = LicenseBindId::new("res-3ject8qu", 42, "2c2c42c2-6c4a-4f24-b776-0a9f6e9f84c0", 1);
        let encoded = id.encode();
        assert_eq!(
            encoded,
            "res-3ject8qu#42#2c2c42c2-6c4a-4f24-b776-0a9f6e9f84c0#1"
        );
        assert_eq!(LicenseBindId::decode(&encoded).unwrap(), id);
    }

    #[test]
    fn wrong_shape_is_broken() {
        let err = AccountId::decode("cynosdbmysql-bzs467r3#app_user").unwrap_err();
        assert!(err.to_string().contains("id is broken"));

        let err = LicenseOrderId::decode("res-3ject8qu#not-a-number").unwrap_err();
        assert!(err.to_string().contains("id is broken"));
    }
}

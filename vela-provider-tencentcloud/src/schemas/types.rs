//! TencentCloud-specific attribute types

use vela_core::resource::Value;
use vela_core::schema::AttributeType;

/// VPC identifier, e.g. "vpc-h70b6b49"
pub fn vpc_id() -> AttributeType {
    AttributeType::Custom {
        name: "VpcId".to_string(),
        validate: |value| match value {
            Value::String(s) if s.starts_with("vpc-") => Ok(()),
            Value::String(s) => Err(format!("'{}' is not a VPC id (expected vpc-xxx)", s)),
            Value::ResourceRef(_, _) => Ok(()),
            _ => Err("Expected string".to_string()),
        },
    }
}

/// Subnet identifier, e.g. "subnet-q6fhy1mi"
pub fn subnet_id() -> AttributeType {
    AttributeType::Custom {
        name: "SubnetId".to_string(),
        validate: |value| match value {
            Value::String(s) if s.starts_with("subnet-") => Ok(()),
            Value::String(s) => Err(format!("'{}' is not a subnet id (expected subnet-xxx)", s)),
            Value::ResourceRef(_, _) => Ok(()),
            _ => Err("Expected string".to_string()),
        },
    }
}

/// Availability zone, e.g. "ap-guangzhou-3"
pub fn zone() -> AttributeType {
    AttributeType::Custom {
        name: "Zone".to_string(),
        validate: |value| match value {
            Value::String(s) if s.split('-').count() >= 3 => Ok(()),
            Value::String(s) => Err(format!(
                "'{}' is not an availability zone (expected e.g. ap-guangzhou-3)",
                s
            )),
            Value::ResourceRef(_, _) => Ok(()),
            _ => Err("Expected string".to_string()),
        },
    }
}

/// Cluster run mode
pub fn db_mode() -> AttributeType {
    AttributeType::Enum(vec!["NORMAL".to_string(), "SERVERLESS".to_string()])
}

/// Billing mode: 0 pay-as-you-go, 1 prepaid
pub fn pay_mode() -> AttributeType {
    AttributeType::Custom {
        name: "PayMode".to_string(),
        validate: |value| match value {
            Value::Int(0) | Value::Int(1) => Ok(()),
            Value::Int(n) => Err(format!("pay_mode must be 0 or 1, got {}", n)),
            _ => Err("Expected integer".to_string()),
        },
    }
}

/// Target status flag for a serverless cluster
pub fn serverless_flag() -> AttributeType {
    AttributeType::Enum(vec!["resume".to_string(), "pause".to_string()])
}

/// CWP machine platform
pub fn machine_type() -> AttributeType {
    AttributeType::Enum(vec![
        "CVM".to_string(),
        "BM".to_string(),
        "ECM".to_string(),
        "LH".to_string(),
        "Other".to_string(),
        "ALL".to_string(),
    ])
}

/// CWP license edition: 0 pro pay-as-you-go, 1 pro prepaid, 2 flagship
pub fn license_type() -> AttributeType {
    AttributeType::Custom {
        name: "LicenseType".to_string(),
        validate: |value| match value {
            Value::Int(0..=2) => Ok(()),
            Value::Int(n) => Err(format!("license_type must be 0, 1 or 2, got {}", n)),
            _ => Err("Expected integer".to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vpc_and_subnet_ids_check_their_prefix() {
        assert!(vpc_id().validate(&Value::String("vpc-h70b6b49".to_string())).is_ok());
        assert!(vpc_id().validate(&Value::String("subnet-q6fhy1mi".to_string())).is_err());
        assert!(subnet_id().validate(&Value::String("subnet-q6fhy1mi".to_string())).is_ok());
        assert!(subnet_id().validate(&Value::Int(3)).is_err());
    }

    #[test]
    fn zone_wants_three_segments() {
        assert!(zone().validate(&Value::String("ap-guangzhou-3".to_string())).is_ok());
        assert!(zone().validate(&Value::String("guangzhou".to_string())).is_err());
    }

    #[test]
    fn references_pass_id_types() {
        let reference = Value::ResourceRef("network".to_string(), "vpc_id".to_string());
        assert!(vpc_id().validate(&reference).is_ok());
    }

    #[test]
    fn numeric_ranges() {
        assert!(pay_mode().validate(&Value::Int(1)).is_ok());
        assert!(pay_mode().validate(&Value::Int(2)).is_err());
        assert!(license_type().validate(&Value::Int(2)).is_ok());
        assert!(license_type().validate(&Value::Int(3)).is_err());
    }
}

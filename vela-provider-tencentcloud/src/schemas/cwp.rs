//! CWP (host security) schema definitions

use vela_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::types as tc_types;

/// Returns the schema for CWP license orders
pub fn license_order_schema() -> ResourceSchema {
    ResourceSchema::new("cwp.license_order")
        .with_description("An order of CWP protection licenses")
        .attribute(
            AttributeSchema::new("alias", AttributeType::String)
                .with_description("Display name of the order"),
        )
        .attribute(
            AttributeSchema::new("license_type", tc_types::license_type())
                .with_description("License edition (defaults to 0, pro pay-as-you-go)"),
        )
        .attribute(
            AttributeSchema::new("license_num", types::positive_int())
                .with_description("Number of licenses to order (defaults to 1)"),
        )
        .attribute(
            AttributeSchema::new("project_id", AttributeType::Int)
                .with_description("Project the order belongs to (defaults to 0)"),
        )
        .attribute(
            AttributeSchema::new("region_id", AttributeType::Int)
                .with_description("Purchase region (defaults to 1)"),
        )
}

/// Returns the schema for CWP license-to-machine bindings
pub fn license_bind_schema() -> ResourceSchema {
    ResourceSchema::new("cwp.license_bind")
        .with_description("Binds one CWP license to one machine")
        .attribute(
            AttributeSchema::new("resource_id", AttributeType::String)
                .required()
                .with_description("License order resource id"),
        )
        .attribute(
            AttributeSchema::new("license_id", types::positive_int())
                .required()
                .with_description("License id within the order"),
        )
        .attribute(
            AttributeSchema::new("license_type", tc_types::license_type())
                .required()
                .with_description("License edition, must match the order"),
        )
        .attribute(
            AttributeSchema::new("quuid", AttributeType::String)
                .required()
                .with_description("QUUID of the machine to protect"),
        )
}

/// Returns the schema for the machine listing data source
pub fn machines_schema() -> ResourceSchema {
    ResourceSchema::new("cwp.machines")
        .with_description("Lists machines known to CWP in one region")
        .attribute(
            AttributeSchema::new("machine_type", tc_types::machine_type())
                .required()
                .with_description("Platform to list, e.g. CVM or ALL"),
        )
        .attribute(
            AttributeSchema::new("machine_region", AttributeType::String)
                .required()
                .with_description("Region to list, e.g. ap-guangzhou, or all-regions"),
        )
        .attribute(
            AttributeSchema::new("keyword", AttributeType::String)
                .with_description("Filter by machine name or IP keyword"),
        )
        .attribute(
            AttributeSchema::new(
                "project_ids",
                AttributeType::List(Box::new(AttributeType::Int)),
            )
            .with_description("Filter by project ids"),
        )
        .attribute(
            AttributeSchema::new("result_output_file", AttributeType::String)
                .with_description("Write the query result to this file as JSON"),
        )
}

/// Returns all CWP schemas
pub fn schemas() -> Vec<ResourceSchema> {
    vec![license_order_schema(), license_bind_schema(), machines_schema()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use vela_core::resource::Value;

    #[test]
    fn empty_order_is_valid() {
        assert!(license_order_schema().validate(&HashMap::new()).is_ok());
    }

    #[test]
    fn order_license_type_range() {
        let mut attrs = HashMap::new();
        attrs.insert("license_type".to_string(), Value::Int(5));

        assert!(license_order_schema().validate(&attrs).is_err());
    }

    #[test]
    fn bind_requires_all_four_keys() {
        let mut attrs = HashMap::new();
        attrs.insert(
            "resource_id".to_string(),
            Value::String("res-3ject8qu".to_string()),
        );
        attrs.insert("license_id".to_string(), Value::Int(42));
        attrs.insert("license_type".to_string(), Value::Int(1));

        // quuid missing
        assert!(license_bind_schema().validate(&attrs).is_err());

        attrs.insert(
            "quuid".to_string(),
            Value::String("2c2c42c2-6c4a-4f24-b776-0a9f6e9f84c0".to_string()),
        );
        assert!(license_bind_schema().validate(&attrs).is_ok());
    }

    #[test]
    fn machines_requires_type_and_region() {
        let mut attrs = HashMap::new();
        attrs.insert("machine_type".to_string(), Value::String("CVM".to_string()));

        assert!(machines_schema().validate(&attrs).is_err());

        attrs.insert(
            "machine_region".to_string(),
            Value::String("ap-guangzhou".to_string()),
        );
        assert!(machines_schema().validate(&attrs).is_ok());
    }

    #[test]
    fn machine_type_vocabulary() {
        let mut attrs = HashMap::new();
        attrs.insert("machine_type".to_string(), Value::String("K8S".to_string()));
        attrs.insert(
            "machine_region".to_string(),
            Value::String("ap-guangzhou".to_string()),
        );

        assert!(machines_schema().validate(&attrs).is_err());
    }
}

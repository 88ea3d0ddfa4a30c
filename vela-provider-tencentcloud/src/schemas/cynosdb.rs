//! CynosDB schema definitions

use vela_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::types as tc_types;

/// Returns the schema for CynosDB clusters
pub fn cluster_schema() -> ResourceSchema {
    ResourceSchema::new("cynosdb.cluster")
        .with_description("A CynosDB serverless-capable MySQL cluster")
        .attribute(
            AttributeSchema::new("cluster_name", AttributeType::String)
                .required()
                .with_description("Name of the cluster"),
        )
        .attribute(
            AttributeSchema::new("available_zone", tc_types::zone())
                .required()
                .with_description("Availability zone, e.g. ap-guangzhou-3"),
        )
        .attribute(
            AttributeSchema::new("vpc_id", tc_types::vpc_id())
                .required()
                .with_description("VPC the cluster lives in"),
        )
        .attribute(
            AttributeSchema::new("subnet_id", tc_types::subnet_id())
                .required()
                .with_description("Subnet within the VPC"),
        )
        .attribute(
            AttributeSchema::new("db_type", AttributeType::Enum(vec!["MYSQL".to_string()]))
                .required()
                .with_description("Database engine"),
        )
        .attribute(
            AttributeSchema::new(
                "db_version",
                AttributeType::Enum(vec!["5.7".to_string(), "8.0".to_string()]),
            )
            .required()
            .with_description("Engine version"),
        )
        .attribute(
            AttributeSchema::new("password", types::account_password())
                .required()
                .with_description("Password of the root account"),
        )
        .attribute(
            AttributeSchema::new("port", types::port())
                .with_description("Access port (defaults to 5432)"),
        )
        .attribute(
            AttributeSchema::new("project_id", AttributeType::Int)
                .with_description("Project the cluster belongs to (defaults to 0)"),
        )
        .attribute(
            AttributeSchema::new("pay_mode", tc_types::pay_mode())
                .with_description("Billing mode: 0 pay-as-you-go, 1 prepaid"),
        )
        .attribute(
            AttributeSchema::new("instance_cpu_core", types::positive_int())
                .with_description("CPU cores of the read-write instance (NORMAL mode)"),
        )
        .attribute(
            AttributeSchema::new("instance_memory_size", types::positive_int())
                .with_description("Memory of the read-write instance in GB (NORMAL mode)"),
        )
        .attribute(
            AttributeSchema::new("storage_limit", types::positive_int())
                .with_description("Storage limit in GB"),
        )
        .attribute(
            AttributeSchema::new("db_mode", tc_types::db_mode())
                .with_description("NORMAL or SERVERLESS (defaults to NORMAL)"),
        )
        .attribute(
            AttributeSchema::new("min_cpu", AttributeType::Float)
                .with_description("Minimum serverless CPU, e.g. 0.25"),
        )
        .attribute(
            AttributeSchema::new("max_cpu", AttributeType::Float)
                .with_description("Maximum serverless CPU"),
        )
        .attribute(
            AttributeSchema::new(
                "auto_pause",
                AttributeType::Enum(vec!["yes".to_string(), "no".to_string()]),
            )
            .with_description("Pause the serverless cluster when idle"),
        )
        .attribute(
            AttributeSchema::new("auto_pause_delay", types::positive_int())
                .with_description("Idle seconds before auto pause (defaults to 600)"),
        )
        .attribute(
            AttributeSchema::new("serverless_status_flag", tc_types::serverless_flag())
                .with_description("Desired serverless status, resume or pause"),
        )
        .attribute(
            AttributeSchema::new("slave_zone", tc_types::zone())
                .with_description("Replica availability zone for multi-AZ deployment"),
        )
        .attribute(
            AttributeSchema::new(
                "param_items",
                AttributeType::List(Box::new(AttributeType::Map(Box::new(
                    AttributeType::String,
                )))),
            )
            .with_description("Instance parameters as {name, current_value} entries"),
        )
}

/// Returns the schema for CynosDB database accounts
pub fn account_schema() -> ResourceSchema {
    ResourceSchema::new("cynosdb.account")
        .with_description("A database account inside a CynosDB cluster")
        .attribute(
            AttributeSchema::new("cluster_id", AttributeType::String)
                .required()
                .with_description("Cluster the account belongs to"),
        )
        .attribute(
            AttributeSchema::new("account_name", AttributeType::String)
                .required()
                .with_description("Account name"),
        )
        .attribute(
            AttributeSchema::new("password", types::account_password())
                .required()
                .with_description("Account password"),
        )
        .attribute(
            AttributeSchema::new("host", AttributeType::String)
                .with_description("Client host pattern (defaults to %)"),
        )
        .attribute(
            AttributeSchema::new("description", AttributeType::String)
                .with_description("Free-form description"),
        )
}

/// Returns the schema for the cluster listing data source
pub fn clusters_schema() -> ResourceSchema {
    ResourceSchema::new("cynosdb.clusters")
        .with_description("Lists CynosDB clusters matching the given filters")
        .attribute(
            AttributeSchema::new("cluster_id", AttributeType::String)
                .with_description("Filter by exact cluster id"),
        )
        .attribute(
            AttributeSchema::new("cluster_name", AttributeType::String)
                .with_description("Filter by cluster name"),
        )
        .attribute(
            AttributeSchema::new("db_type", AttributeType::Enum(vec!["MYSQL".to_string()]))
                .with_description("Filter by engine"),
        )
        .attribute(
            AttributeSchema::new("project_id", AttributeType::Int)
                .with_description("Filter by project"),
        )
        .attribute(
            AttributeSchema::new("result_output_file", AttributeType::String)
                .with_description("Write the query result to this file as JSON"),
        )
}

/// Returns all CynosDB schemas
pub fn schemas() -> Vec<ResourceSchema> {
    vec![cluster_schema(), account_schema(), clusters_schema()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use vela_core::resource::Value;

    fn base_cluster_attrs() -> HashMap<String, Value> {
        let mut attrs = HashMap::new();
        attrs.insert("cluster_name".to_string(), Value::String("orders".to_string()));
        attrs.insert(
            "available_zone".to_string(),
            Value::String("ap-guangzhou-3".to_string()),
        );
        attrs.insert("vpc_id".to_string(), Value::String("vpc-h70b6b49".to_string()));
        attrs.insert(
            "subnet_id".to_string(),
            Value::String("subnet-q6fhy1mi".to_string()),
        );
        attrs.insert("db_type".to_string(), Value::String("MYSQL".to_string()));
        attrs.insert("db_version".to_string(), Value::String("5.7".to_string()));
        attrs.insert(
            "password".to_string(),
            Value::String("cynos2024pw".to_string()),
        );
        attrs
    }

    #[test]
    fn valid_normal_cluster() {
        let mut attrs = base_cluster_attrs();
        attrs.insert("instance_cpu_core".to_string(), Value::Int(2));
        attrs.insert("instance_memory_size".to_string(), Value::Int(4));

        assert!(cluster_schema().validate(&attrs).is_ok());
    }

    #[test]
    fn valid_serverless_cluster() {
        let mut attrs = base_cluster_attrs();
        attrs.insert("db_mode".to_string(), Value::String("SERVERLESS".to_string()));
        attrs.insert("min_cpu".to_string(), Value::Float(0.25));
        attrs.insert("max_cpu".to_string(), Value::Int(2));
        attrs.insert("auto_pause".to_string(), Value::String("yes".to_string()));

        assert!(cluster_schema().validate(&attrs).is_ok());
    }

    #[test]
    fn missing_zone_is_rejected() {
        let mut attrs = base_cluster_attrs();
        attrs.remove("available_zone");

        assert!(cluster_schema().validate(&attrs).is_err());
    }

    #[test]
    fn wrong_vpc_prefix_is_rejected() {
        let mut attrs = base_cluster_attrs();
        attrs.insert(
            "vpc_id".to_string(),
            Value::String("subnet-q6fhy1mi".to_string()),
        );

        assert!(cluster_schema().validate(&attrs).is_err());
    }

    #[test]
    fn unknown_db_mode_is_rejected() {
        let mut attrs = base_cluster_attrs();
        attrs.insert("db_mode".to_string(), Value::String("TURBO".to_string()));

        assert!(cluster_schema().validate(&attrs).is_err());
    }

    #[test]
    fn param_items_shape() {
        let mut item = HashMap::new();
        item.insert(
            "name".to_string(),
            Value::String("character_set_server".to_string()),
        );
        item.insert("current_value".to_string(), Value::String("utf8mb4".to_string()));

        let mut attrs = base_cluster_attrs();
        attrs.insert("param_items".to_string(), Value::List(vec![Value::Map(item)]));

        assert!(cluster_schema().validate(&attrs).is_ok());
    }

    #[test]
    fn weak_account_password_is_rejected() {
        let mut attrs = HashMap::new();
        attrs.insert(
            "cluster_id".to_string(),
            Value::String("cynosdbmysql-bzs467r3".to_string()),
        );
        attrs.insert("account_name".to_string(), Value::String("app".to_string()));
        attrs.insert("password".to_string(), Value::String("short".to_string()));

        assert!(account_schema().validate(&attrs).is_err());
    }

    #[test]
    fn clusters_filter_attrs_are_all_optional() {
        assert!(clusters_schema().validate(&HashMap::new()).is_ok());
    }
}

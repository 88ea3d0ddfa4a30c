//! TencentCloud resource schema definitions

pub mod cynosdb;
pub mod cwp;
pub mod types;

use vela_core::schema::ResourceSchema;

/// Returns all TencentCloud schemas
pub fn all_schemas() -> Vec<ResourceSchema> {
    let mut schemas = Vec::new();
    schemas.extend(cynosdb::schemas());
    schemas.extend(cwp::schemas());
    schemas
}

//! Vela core: the resource model, the Provider contract, planning, and the
//! shared retry/poll machinery used by every provider operation.

pub mod differ;
pub mod effect;
pub mod key;
pub mod plan;
pub mod provider;
pub mod resource;
pub mod retry;
pub mod schema;
pub mod task;

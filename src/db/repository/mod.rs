//! Repository layer: entity-scoped database operations.
//!
//! Free functions over a borrowed `Connection`, one sub-module per table.
//! All public functions are re-exported here.

mod analysis;
mod category;
mod measurement;
mod record;
mod user;

pub use analysis::*;
pub use category::*;
pub use measurement::*;
pub use record::{
    delete_record_cascade, get_record, insert_record, list_records_for_owner,
    set_analysis_completed,
};
pub use user::*;

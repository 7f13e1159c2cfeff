//! Job data model: the record a worker receives and the route it carries

mod record;
mod stage;

pub use record::{
    ErrorCode, JobRecord, ERROR_CODE, ERROR_MESSAGE, ERROR_TRACE, INDEXING_WARNING,
};
pub use stage::{RoutingStage, STAGE_EXTRACT, STAGE_NOP};

pub(crate) use record::value_text;

//! Read-only view of one route descriptor

use serde_json::{Map, Value};

/// Stage type claimed by extraction workers
pub const STAGE_EXTRACT: &str = "EXTRACT";
/// Sentinel stage type meaning "terminate here and print the result"
pub const STAGE_NOP: &str = "NOP";

const TYPE: &str = "type";
const ADDR: &str = "addr";
const PID: &str = "pid";
const START: &str = "start";
const FINISHED: &str = "finished";

/// A borrowed view into one `{type, addr, pid?, start?, finished?}` entry.
#[derive(Debug, Clone, Copy)]
pub struct RoutingStage<'a> {
    index: usize,
    entry: &'a Map<String, Value>,
}

impl<'a> RoutingStage<'a> {
    pub(crate) fn new(index: usize, entry: &'a Map<String, Value>) -> Self {
        Self { index, entry }
    }

    /// Position of this descriptor in the route.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Stage type; empty when the descriptor has none.
    pub fn stage_type(&self) -> &'a str {
        self.entry.get(TYPE).and_then(Value::as_str).unwrap_or("")
    }

    /// Forwarding address; empty when the descriptor has none.
    pub fn address(&self) -> &'a str {
        self.entry.get(ADDR).and_then(Value::as_str).unwrap_or("")
    }

    /// The vpid of the worker that claimed this stage.
    pub fn pid(&self) -> Option<&'a Value> {
        self.entry.get(PID).filter(|v| !v.is_null())
    }

    pub fn start(&self) -> Option<f64> {
        self.entry.get(START).and_then(Value::as_f64)
    }

    pub fn finished(&self) -> Option<f64> {
        self.entry.get(FINISHED).and_then(Value::as_f64)
    }

    /// True once any non-null `finished` stamp is present.
    pub fn is_finished(&self) -> bool {
        self.entry.get(FINISHED).is_some_and(|v| !v.is_null())
    }

    pub fn is_routable(&self) -> bool {
        !self.address().is_empty()
    }

    pub fn is_nop(&self) -> bool {
        self.stage_type() == STAGE_NOP
    }
}

mod consumer;

pub(crate) use consumer::{Consumer, Outcome, StopReason};

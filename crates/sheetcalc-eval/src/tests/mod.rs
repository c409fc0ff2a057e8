//! Integration-style tests that drive the evaluator through `TestWorkbook`.

mod common;
mod cycles;
mod functions;

//! Storage operations on provisioned forms: write, read, drop.

mod reader;
mod sync;
mod teardown;
pub use reader::RecordReader;
pub use sync::{child_values, main_values, plan_children, ChildPlan, RecordSynchronizer, SyncSummary};
pub use teardown::{drop_order, TableOutcome, TeardownManager};

pub mod add;
pub mod common;
pub mod completions;
pub mod delete;
pub mod dismiss;
pub mod edit;
pub mod list;
pub mod run;
pub mod sync;
pub mod toggle;

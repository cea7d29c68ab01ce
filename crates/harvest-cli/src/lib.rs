//! Wiring and output helpers for the `harvest` binary.

pub mod output;
pub mod wiring;

pub use output::{print_json, render_orgs_table, render_problems_table, render_stats_table};
pub use wiring::{build_engine, load_organizations, open_stores, Stores};

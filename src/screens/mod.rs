pub mod charts;
pub mod dashboard;
pub mod status;

// The dashboard draws one of two views inside a shared frame:
// - Overview: one panel per node with the metric catalogue and HAProxy state
// - Charts: replication-delay history per node
//
// Overlays: help ('?'), HAProxy confirmation and the weight prompt.

pub use charts::{build_charts, DelayChart};
pub use dashboard::{Dashboard, DashboardState, Dialog};
pub use status::{build_panels, NodePanel};

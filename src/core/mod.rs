pub mod client;
pub mod haproxy;
pub mod inspect;
pub mod poller;
pub mod series;
pub mod snapshot;

pub use client::{FetchError, HttpStatusSource, StatusSource};
pub use haproxy::{ControlAction, ControlError, HaproxyControl};
pub use inspect::InspectClient;
pub use poller::{PollEvent, PollScheduler, PollState, Poller};
pub use series::{Sample, SeriesStore, SeriesView};
pub use snapshot::{ClusterSnapshot, HostStatus, MetricValue};

//! Localization - Fusion controller and result publishers
//!
//! [`FusionController`] owns the [`Synchronizer`](sync_engine::Synchronizer)
//! and the [`Estimator`](eskf::Estimator). Each [`FusionController::run`] call
//! drains whatever the buffers allow: it initializes from the first aligned
//! triplet, then interleaves inertial predictions with lidar/GNSS corrections
//! and hands every result to a [`FusionPublisher`](contracts::FusionPublisher).

mod controller;
pub mod publisher;

pub use controller::FusionController;
pub use publisher::{
    FanoutPublisher, JsonLinesPublisher, LogPublisher, PublishedEvent, RecordingPublisher,
};

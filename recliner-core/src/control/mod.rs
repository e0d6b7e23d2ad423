//! Control loop plumbing
//!
//! The [`Coordinator`] runs both motors; [`CommandSource`] implementations
//! decide what it should be doing.

pub mod activity;
pub mod coordinator;
pub mod sequence;
pub mod source;

pub use activity::{Activity, ActivityMonitor, ModeTargets};
pub use coordinator::{ChannelReport, Coordinator, CoordinatorReport, MotorChannel};
pub use sequence::{SequencePlayer, SequenceStep};
pub use source::{CommandSource, ControlBus, ModeSource, RemoteSource, SourceCommand};

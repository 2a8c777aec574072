#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core interlock logic (hardware-agnostic).
//!
//! All hardware interactions go through the `pisau_traits::Camera`,
//! `pisau_traits::Switches` and `pisau_traits::MotorDriver` traits.
//!
//! ## Architecture
//!
//! - **Zones**: trapezoid geometry, point-in-zone test, cached overlay (`zone`, `overlay`)
//! - **Vision**: FULL/LIGHT frame pipeline, skin then motion stage (`pipeline`)
//! - **Motor**: set-point, RPM/temperature model, enable/duty contract (`governor`)
//! - **Safety**: overrun accumulators and the latching state machine (`overrun`, `coordinator`)
//! - **Loop**: cooperative scheduler, command queue, controller (`scheduler`, `command`, `controller`)
//!
//! ## Threading
//!
//! Everything except [`command::CommandSender`] is single-threaded; shared
//! state uses `Rc<RefCell<_>>` / `Rc<Cell<_>>` handles instead of locks.

pub mod command;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod coordinator;
pub mod error;
pub mod governor;
pub mod hw_error;
pub mod mocks;
pub mod overlay;
pub mod overrun;
pub mod pipeline;
pub mod scheduler;
pub mod status;
pub mod util;
pub mod zone;

pub use command::{Command, CommandQueue, CommandSender, SpeedPreset};
pub use config::{DetectionCfg, GovernorCfg, LatchPolicy, OverrunCfg, TaskPeriods, ZoneCfg};
pub use controller::{Controller, Flow, Hardware, LoopStats};
pub use coordinator::{Advisory, MachineState, SafetyCoordinator};
pub use error::{GuardError, Result};
pub use governor::{MAX_RPM, MotorGovernor, MotorState, MotorTelemetry, SharedGovernor};
pub use overlay::{Overlay, generate_overlay};
pub use overrun::{Crossing, Metric, OverrunAccumulator};
pub use pipeline::{FrameMode, FrameReport, IntrusionEvent, IntrusionKind, IntrusionPipeline};
pub use scheduler::{Scheduler, TaskHandle, TaskKind};
pub use status::StatusSnapshot;
pub use zone::{DirtyFlag, Point, ZoneDetector, Zones, compute_zones, point_in_zone};

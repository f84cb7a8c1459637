//! `autoshop-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the error taxonomy, money rounding and the two ports the
//! domain needs from the outside world (a clock and a gauge sink).

pub mod clock;
pub mod entity;
pub mod error;
pub mod gauge;
pub mod id;
pub mod money;
pub mod range;

pub use clock::{Clock, FixedClock, SystemClock};
pub use entity::Entity;
pub use error::{DomainError, DomainResult, optional_text, required_text};
pub use gauge::{GaugeSink, NoopGaugeSink};
pub use id::{ClientId, EmployeeId, InvoiceId, LineItemId, OrderId, ServiceId, UserId, VehicleId};
pub use money::{Money, present, to_f64};
pub use range::TimeRange;

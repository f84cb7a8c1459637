//! `autoshop-orders`: repair order lifecycle.
//!
//! An order moves through `pending → in_progress → completed → delivered`.
//! Line items snapshot the service price when they are created and are
//! frozen once the order reaches a billable state.

pub mod line_item;
pub mod order;
pub mod state;

pub use line_item::LineItem;
pub use order::{NewOrder, Order, OrderPatch, RequestedService, plan_order};
pub use state::{OrderState, StateCounts, TransitionPolicy};

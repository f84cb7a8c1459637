use core::str::FromStr;
use serde::{Deserialize, Serialize};

use autoshop_core::{DomainError, DomainResult};

/// Order lifecycle state.
///
/// Declaration order is the forward order of the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    Pending,
    InProgress,
    Completed,
    Delivered,
}

impl OrderState {
    /// Every state, in lifecycle order.
    pub const ALL: [OrderState; 4] = [
        OrderState::Pending,
        OrderState::InProgress,
        OrderState::Completed,
        OrderState::Delivered,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderState::Pending => "pending",
            OrderState::InProgress => "in_progress",
            OrderState::Completed => "completed",
            OrderState::Delivered => "delivered",
        }
    }

    /// An invoice may be generated from this state.
    pub fn is_billable(self) -> bool {
        matches!(self, OrderState::Completed | OrderState::Delivered)
    }

    /// Line items may still be appended in this state.
    pub fn accepts_line_items(self) -> bool {
        !self.is_billable()
    }
}

impl core::fmt::Display for OrderState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(OrderState::Pending),
            "in_progress" => Ok(OrderState::InProgress),
            "completed" => Ok(OrderState::Completed),
            "delivered" => Ok(OrderState::Delivered),
            other => Err(DomainError::invalid(format!(
                "invalid order state '{other}'; expected one of: pending, in_progress, completed, delivered"
            ))),
        }
    }
}

/// Which state writes an order update may perform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPolicy {
    /// Any valid state may be written directly, including moving backwards.
    #[default]
    Permissive,
    /// Monotonic: states only move forward (skipping ahead is allowed).
    Forward,
}

impl TransitionPolicy {
    pub fn check(self, from: OrderState, to: OrderState) -> DomainResult<()> {
        match self {
            TransitionPolicy::Permissive => Ok(()),
            TransitionPolicy::Forward if to >= from => Ok(()),
            TransitionPolicy::Forward => Err(DomainError::invalid(format!(
                "order cannot move back from {from} to {to}"
            ))),
        }
    }
}

impl FromStr for TransitionPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(TransitionPolicy::Permissive),
            "forward" => Ok(TransitionPolicy::Forward),
            other => Err(DomainError::invalid(format!(
                "unknown transition policy '{other}'"
            ))),
        }
    }
}

/// Order counts per state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    pub pending: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub delivered: u64,
}

impl StateCounts {
    pub fn record(&mut self, state: OrderState) {
        self.add(state, 1);
    }

    pub fn add(&mut self, state: OrderState, n: u64) {
        *self.slot(state) += n;
    }

    pub fn get(&self, state: OrderState) -> u64 {
        match state {
            OrderState::Pending => self.pending,
            OrderState::InProgress => self.in_progress,
            OrderState::Completed => self.completed,
            OrderState::Delivered => self.delivered,
        }
    }

    pub fn total(&self) -> u64 {
        self.pending + self.in_progress + self.completed + self.delivered
    }

    /// Always four entries, in lifecycle order.
    pub fn entries(&self) -> [(OrderState, u64); 4] {
        OrderState::ALL.map(|s| (s, self.get(s)))
    }

    fn slot(&mut self, state: OrderState) -> &mut u64 {
        match state {
            OrderState::Pending => &mut self.pending,
            OrderState::InProgress => &mut self.in_progress,
            OrderState::Completed => &mut self.completed,
            OrderState::Delivered => &mut self.delivered,
        }
    }
}

impl FromIterator<OrderState> for StateCounts {
    fn from_iter<I: IntoIterator<Item = OrderState>>(iter: I) -> Self {
        let mut counts = StateCounts::default();
        for s in iter {
            counts.record(s);
        }
        counts
    }
}

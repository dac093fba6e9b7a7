//! Fan-out accounting for a single publish call.

use std::ops::{Add, AddAssign};

use serde::Serialize;
use utoipa::ToSchema;

/// Counts produced by one publish.
///
/// `pruned` counts only removals this publish performed. A subscriber whose
/// send failed after another path already removed it is attempted but not
/// pruned, and an already-closed subscriber swept from the channel is pruned
/// without being attempted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct DeliveryReport {
    /// Subscribers a send was attempted on.
    pub attempted: usize,
    /// Sends that were accepted by the subscriber's stream.
    pub delivered: usize,
    /// Subscribers this publish removed from the registry.
    pub pruned: usize,
}

impl DeliveryReport {
    /// Returns `true` if no subscriber was targeted.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.attempted == 0
    }
}

impl Add for DeliveryReport {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            attempted: self.attempted.saturating_add(rhs.attempted),
            delivered: self.delivered.saturating_add(rhs.delivered),
            pruned: self.pruned.saturating_add(rhs.pruned),
        }
    }
}

impl AddAssign for DeliveryReport {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

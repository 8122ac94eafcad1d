use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};

/// events observed while simulating a loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    InterestRateChanged {
        month: u32,
        old_rate: Rate,
        new_rate: Rate,
    },
    ExtraPaymentApplied {
        month: u32,
        amount: Money,
        balance_after: Money,
    },
    /// extra payment whose month came after the balance was cleared
    ExtraPaymentConsumed {
        month: u32,
        amount: Money,
    },
    LoanPaidOff {
        month: u32,
    },
    ResidualBalance {
        term_months: u32,
        balance: Money,
    },
    SimulationAborted {
        month: u32,
        reason: String,
    },
}

/// event store for collecting events during a simulation
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}

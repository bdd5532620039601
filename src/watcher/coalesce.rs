/// Collapses bursts of triggers into refreshes.
///
/// At most one refresh runs at a time. Any number of triggers arriving while
/// it runs schedule exactly one follow-up.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Coalescer {
    in_flight: bool,
    pending:   bool,
}

impl Coalescer {
    /// Record a trigger. Returns true if a refresh should start now.
    pub fn trigger(&mut self) -> bool {
        if self.in_flight {
            self.pending = true;
            false
        } else {
            self.in_flight = true;
            true
        }
    }

    /// Record that the running refresh finished. Returns true if a follow-up
    /// refresh should start now.
    pub fn finish(&mut self) -> bool {
        if self.pending {
            self.pending = false;
            true
        } else {
            self.in_flight = false;
            false
        }
    }

    pub fn is_in_flight(&self) -> bool { self.in_flight }
    pub fn is_pending(&self) -> bool { self.pending }
}

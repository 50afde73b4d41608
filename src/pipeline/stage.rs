//! Stage taxonomy, per-call state machine, and timing capture.
//!
//! Every pipeline step moves through `Pending → Scored → (Accepted |
//! Rejected) → Done`. The transitions consume `self`, so a verdict cannot be
//! emitted from `Pending` and a finished verdict cannot be revised — the
//! compiler enforces what the state machine demands.

use std::time::Instant;

use serde::Serialize;

use crate::memory::MemoryProbe;

/// The closed set of pipeline steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    VoiceActivity,
    WakeWord,
    Classification,
    Response,
}

impl StageKind {
    pub fn name(&self) -> &'static str {
        match self {
            StageKind::VoiceActivity => "voice_activity",
            StageKind::WakeWord => "wake_word",
            StageKind::Classification => "classification",
            StageKind::Response => "response",
        }
    }

    /// Advisory latency budget in milliseconds. Recorded in telemetry, never
    /// enforced by preemption; this core assumes none is available.
    pub fn budget_ms(&self) -> u64 {
        match self {
            StageKind::VoiceActivity => 10,
            StageKind::WakeWord => 20,
            StageKind::Classification => 50,
            StageKind::Response => 5,
        }
    }
}

/// A stage call that has not produced a verdict yet. There is deliberately
/// no way to read a result out of this state.
#[must_use]
pub struct PendingStage {
    kind: StageKind,
}

/// A stage call holding a verdict awaiting the threshold decision.
#[must_use]
pub struct ScoredStage<V> {
    kind: StageKind,
    verdict: V,
}

/// A resolved stage call; `finish` yields the immutable verdict.
#[must_use]
pub struct ResolvedStage<V> {
    kind: StageKind,
    verdict: V,
    accepted: bool,
}

impl PendingStage {
    pub fn new(kind: StageKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> StageKind {
        self.kind
    }

    /// Record the stage's verdict: `Pending → Scored`.
    pub fn score<V>(self, verdict: V) -> ScoredStage<V> {
        ScoredStage { kind: self.kind, verdict }
    }
}

impl<V> ScoredStage<V> {
    /// Apply the threshold decision: `Scored → Accepted | Rejected`.
    pub fn resolve(self, accepted: bool) -> ResolvedStage<V> {
        ResolvedStage { kind: self.kind, verdict: self.verdict, accepted }
    }
}

impl<V> ResolvedStage<V> {
    pub fn accepted(&self) -> bool {
        self.accepted
    }

    /// Terminal transition to `Done`; the verdict leaves the state machine
    /// and can no longer change.
    pub fn finish(self) -> (StageKind, V, bool) {
        (self.kind, self.verdict, self.accepted)
    }
}

/// Timing and memory delta for one executed stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageRecord {
    pub stage: StageKind,
    pub elapsed_ms: f64,
    /// Free-memory delta across the stage (positive means memory was
    /// consumed).
    pub memory_delta_bytes: i64,
    /// True when the stage overran its advisory budget.
    pub over_budget: bool,
}

/// Samples wall time and free memory around one stage call.
pub struct StageTimer {
    kind: StageKind,
    started: Instant,
    free_before: u64,
}

impl StageTimer {
    pub fn start(kind: StageKind, probe: &dyn MemoryProbe) -> Self {
        Self { kind, started: Instant::now(), free_before: probe.free_bytes() }
    }

    pub fn stop(self, probe: &dyn MemoryProbe) -> StageRecord {
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let free_after = probe.free_bytes();
        StageRecord {
            stage: self.kind,
            elapsed_ms,
            memory_delta_bytes: self.free_before as i64 - free_after as i64,
            over_budget: elapsed_ms > self.kind.budget_ms() as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::FixedProbe;

    #[test]
    fn state_machine_carries_verdict_through() {
        let pending = PendingStage::new(StageKind::WakeWord);
        let resolved = pending.score(0.72f32).resolve(true);
        assert!(resolved.accepted());
        let (kind, verdict, accepted) = resolved.finish();
        assert_eq!(kind, StageKind::WakeWord);
        assert_eq!(verdict, 0.72);
        assert!(accepted);
    }

    #[test]
    fn rejection_reaches_done_too() {
        let (_, verdict, accepted) =
            PendingStage::new(StageKind::Classification).score("none").resolve(false).finish();
        assert_eq!(verdict, "none");
        assert!(!accepted);
    }

    #[test]
    fn timer_records_memory_delta() {
        let probe = FixedProbe::new(100_000);
        let timer = StageTimer::start(StageKind::VoiceActivity, &probe);
        probe.set(92_000);
        let record = timer.stop(&probe);
        assert_eq!(record.memory_delta_bytes, 8_000);
        assert_eq!(record.stage, StageKind::VoiceActivity);
    }

    #[test]
    fn stage_budgets_are_ordered_by_cost() {
        assert!(StageKind::VoiceActivity.budget_ms() < StageKind::Classification.budget_ms());
    }
}

use crate::layout::{Anchor, AnchorAssignment};
use std::cell::Cell;
use std::collections::BTreeMap;
use std::time::Instant;

/// Millisecond time source. Injected so tests can step time by hand.
pub trait Clock {
    fn now_ms(&self) -> f64;
}

#[derive(Debug, Clone)]
pub struct SystemClock {
    start: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Cell<f64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self { now: Cell::new(start) }
    }

    pub fn set(&self, now: f64) {
        self.now.set(now);
    }

    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> f64 {
        (**self).now_ms()
    }
}

/// Quadratic ease-in-out on `[0, 1]`.
pub fn ease_in_out(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        2.0 * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
    }
}

/// Handle for one scheduled frame. Frames carrying an older generation are
/// ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameToken(u64);

pub type AnchorMap = BTreeMap<String, AnchorAssignment>;

#[derive(Debug, Clone, PartialEq)]
enum Phase {
    Idle,
    Interpolating { start: f64, from: AnchorMap },
}

/// Smooths anchor moves after a topology change. Only edges whose anchor ids
/// changed glide; everything else snaps.
#[derive(Debug, Clone)]
pub struct AnchorAnimator {
    duration_ms: f64,
    phase: Phase,
    target: AnchorMap,
    generation: u64,
}

impl AnchorAnimator {
    pub fn new(duration_ms: f64) -> Self {
        Self {
            duration_ms: duration_ms.max(0.0),
            phase: Phase::Idle,
            target: AnchorMap::new(),
            generation: 0,
        }
    }

    pub fn is_animating(&self) -> bool {
        matches!(self.phase, Phase::Interpolating { .. })
    }

    pub fn target(&self) -> &AnchorMap {
        &self.target
    }

    /// Jump straight to `anchors` with no run.
    pub fn reset(&mut self, anchors: AnchorMap) {
        self.cancel();
        self.target = anchors;
    }

    /// Point the animator at a freshly computed assignment. Starts a run (and
    /// hands back its first frame token) when any edge changed anchor ids.
    pub fn retarget(&mut self, next: AnchorMap, now: f64) -> Option<FrameToken> {
        let changed = next.iter().any(|(id, assignment)| {
            self.target
                .get(id)
                .is_some_and(|current| !current.same_ids(assignment))
        });
        if !changed || self.duration_ms <= 0.0 {
            self.phase = Phase::Idle;
            self.target = next;
            return None;
        }
        let from = self.sample(now);
        self.generation += 1;
        self.phase = Phase::Interpolating { start: now, from };
        self.target = next;
        log::trace!("anchor run {} started at {now}", self.generation);
        Some(FrameToken(self.generation))
    }

    /// Drop any in-flight run; pending tokens go stale.
    pub fn cancel(&mut self) {
        self.generation += 1;
        self.phase = Phase::Idle;
    }

    fn progress(&self, start: f64, now: f64) -> f64 {
        if self.duration_ms <= 0.0 {
            return 1.0;
        }
        ((now - start) / self.duration_ms).clamp(0.0, 1.0)
    }

    /// Presented anchors at `now`.
    pub fn sample(&self, now: f64) -> AnchorMap {
        let Phase::Interpolating { start, from } = &self.phase else {
            return self.target.clone();
        };
        let eased = ease_in_out(self.progress(*start, now)) as f32;
        self.target
            .iter()
            .map(|(id, to)| {
                let presented = match from.get(id) {
                    Some(prev) if !prev.same_ids(to) => AnchorAssignment {
                        source: lerp(&prev.source, &to.source, eased),
                        target: lerp(&prev.target, &to.target, eased),
                    },
                    _ => *to,
                };
                (id.clone(), presented)
            })
            .collect()
    }

    /// Service a scheduled frame. Stale tokens yield `None`; otherwise the
    /// presented anchors and the token for the next frame, if the run is
    /// still going.
    pub fn on_frame(&mut self, token: FrameToken, now: f64) -> Option<(AnchorMap, Option<FrameToken>)> {
        if token.0 != self.generation {
            return None;
        }
        let Phase::Interpolating { start, .. } = &self.phase else {
            return None;
        };
        let done = self.progress(*start, now) >= 1.0;
        let anchors = self.sample(now);
        if done {
            self.phase = Phase::Idle;
            return Some((anchors, None));
        }
        Some((anchors, Some(token)))
    }
}

fn lerp(from: &Anchor, to: &Anchor, t: f32) -> Anchor {
    Anchor {
        id: to.id,
        cx: from.cx + (to.cx - from.cx) * t,
        cy: from.cy + (to.cy - from.cy) * t,
    }
}

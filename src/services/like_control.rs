//! Optimistic like state for a single like button.
//!
//! The control flips its displayed state before the store round trip, then
//! either adopts the authoritative outcome or restores the exact snapshot it
//! started from. While a toggle is pending the control is disabled.

use crate::error::{AppError, AppResult};
use crate::models::{LikeOutcome, RequestContext};
use crate::services::like::LikeService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeSnapshot {
    pub liked: bool,
    pub count: i64,
}

impl LikeSnapshot {
    /// The optimistic guess: flag flipped, count moved by exactly one
    pub fn toggled(self) -> Self {
        LikeSnapshot {
            liked: !self.liked,
            count: if self.liked { self.count - 1 } else { self.count + 1 },
        }
    }
}

impl From<LikeOutcome> for LikeSnapshot {
    fn from(outcome: LikeOutcome) -> Self {
        LikeSnapshot {
            liked: outcome.liked,
            count: outcome.new_count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    Idle,
    Pending(LikeSnapshot),
    Resolved,
}

/// State restored after a failed toggle
pub fn rollback(prev: LikeSnapshot) -> LikeSnapshot {
    prev
}

#[derive(Debug, Clone)]
pub struct LikeControl {
    project_id: String,
    shown: LikeSnapshot,
    state: ControlState,
}

impl LikeControl {
    pub fn new(project_id: impl Into<String>, liked: bool, count: i64) -> Self {
        LikeControl {
            project_id: project_id.into(),
            shown: LikeSnapshot { liked, count },
            state: ControlState::Idle,
        }
    }

    pub fn shown(&self) -> LikeSnapshot {
        self.shown
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self.state, ControlState::Pending(_))
    }

    /// Apply the optimistic flip. Returns `None` while another toggle is in flight.
    pub fn begin(&mut self) -> Option<LikeSnapshot> {
        if self.is_disabled() {
            return None;
        }
        let prev = self.shown;
        self.state = ControlState::Pending(prev);
        self.shown = prev.toggled();
        Some(self.shown)
    }

    /// Adopt the server outcome. Ignored unless a toggle is pending.
    pub fn succeed(&mut self, outcome: LikeOutcome) -> bool {
        match self.state {
            ControlState::Pending(_) => {
                self.shown = outcome.into();
                self.state = ControlState::Resolved;
                true
            }
            _ => false,
        }
    }

    /// Restore the pre-toggle snapshot. Ignored unless a toggle is pending.
    pub fn fail(&mut self) -> bool {
        match self.state {
            ControlState::Pending(prev) => {
                self.shown = rollback(prev);
                self.state = ControlState::Resolved;
                true
            }
            _ => false,
        }
    }

    /// Run one optimistic toggle against the like service.
    ///
    /// Anonymous callers get `Unauthenticated` and the control is left untouched.
    pub async fn toggle(&mut self, service: &LikeService<'_>, ctx: &RequestContext) -> AppResult<LikeSnapshot> {
        ctx.require_session()?;

        if self.begin().is_none() {
            return Err(AppError::Conflict(
                "A like toggle is already in progress".to_string(),
            ));
        }

        let result = service.toggle_like(ctx, &self.project_id).await;
        match result {
            Ok(outcome) => {
                self.succeed(outcome);
                Ok(self.shown)
            }
            Err(e) => {
                tracing::warn!("Like toggle on {} failed, rolling back: {}", self.project_id, e);
                self.fail();
                Err(e)
            }
        }
    }
}

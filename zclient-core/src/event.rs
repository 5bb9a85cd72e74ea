//! Abstract events delivered by the platform window layer.
//!
//! The window layer itself is external; this module only carries the event
//! vocabulary and the handler contract so application code can be written
//! and tested without a display.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{Error, Result};

/// A user-triggered window event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
	/// Window close requested.
	Delete,
	KeyPress { code: u32 },
	MouseClick { button: u32, x: i32, y: i32 },
	Resize { width: u32, height: u32 },
}

impl AppEvent {
	/// Numeric type tag used by the native window bridge.
	pub fn type_code(&self) -> u32 {
		match self {
			AppEvent::Delete => 1,
			AppEvent::KeyPress { .. } => 2,
			AppEvent::MouseClick { .. } => 3,
			AppEvent::Resize { .. } => 4,
		}
	}
}

/// Result of handling one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventOutcome {
	Handled,
	/// Something went wrong but was dealt with; keep running.
	RecoverableError,
	/// Propagate and terminate the application.
	FatalError,
}

impl EventOutcome {
	/// Status code understood by the native bridge (0 / -1 / -2).
	pub fn code(self) -> i8 {
		match self {
			EventOutcome::Handled => 0,
			EventOutcome::RecoverableError => -1,
			EventOutcome::FatalError => -2,
		}
	}

	pub fn from_code(code: i8) -> Option<Self> {
		match code {
			0 => Some(EventOutcome::Handled),
			-1 => Some(EventOutcome::RecoverableError),
			-2 => Some(EventOutcome::FatalError),
			_ => None,
		}
	}
}

pub trait EventHandler {
	fn handle(&mut self, event: &AppEvent) -> EventOutcome;
}

impl<F> EventHandler for F
where
	F: FnMut(&AppEvent) -> EventOutcome,
{
	fn handle(&mut self, event: &AppEvent) -> EventOutcome { self(event) }
}

/// Deliver `event` to `handler`. Recoverable errors are logged and
/// swallowed; a fatal outcome becomes [`Error::Event`].
pub fn dispatch<H: EventHandler + ?Sized>(handler: &mut H, event: &AppEvent) -> Result<EventOutcome> {
	let outcome = handler.handle(event);
	match outcome {
		EventOutcome::Handled => debug!(?event, "event handled"),
		EventOutcome::RecoverableError => warn!(?event, "event handler recovered from an error"),
		EventOutcome::FatalError => {
			error!(?event, "event handler reported a fatal error");
			return Err(Error::event(format!("fatal error while handling event type {}", event.type_code())));
		}
	}
	Ok(outcome)
}

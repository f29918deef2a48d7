#![forbid(unsafe_code)]

//! Core primitives shared by quickedit widgets: host input events, clocks,
//! the coalescing timer, reactive values, and locale selection.

pub mod event;
pub mod locale;
pub mod reactive;
pub mod time;
pub mod timer;

pub use event::{Event, HitTarget, KeyCode, KeyEvent, KeyEventKind, Modifiers};
pub use time::{Clock, Duration, Instant, ManualClock, SystemClock};
pub use timer::CoalescingTimer;

#![forbid(unsafe_code)]

//! Stack of quick dialogs, newest on top.
//!
//! [`DialogHost::open`] pushes a dialog and hands its content a [`DialogCtl`]
//! that closes it again. Dialogs are laid out bottom to top with strictly
//! increasing z-index; only the top dialog sees input.
//!
//! # Invariants
//!
//! - Only the top dialog receives events from [`DialogHost::handle_event`].
//! - A newly opened dialog takes focus. Closing the focused dialog moves
//!   focus to whatever is on top afterwards.
//! - Closing an already closed dialog is a no-op that returns `false`.
//! - A close requested while the host is busy (from inside
//!   [`DialogHost::with_content`]) is applied once the host is free again.
//!
//! # Example
//!
//! ```
//! use qedit_core::{Event, KeyCode, KeyEvent};
//! use qedit_widgets::{DialogAction, DialogHost, QuickDialogProps};
//!
//! let host: DialogHost<String> = DialogHost::new();
//! let ctl = host.open(QuickDialogProps::new("Settings").width(480), |_ctl| {
//!     String::from("body")
//! });
//! assert!(ctl.is_open());
//!
//! let action = host.handle_event(&Event::Key(KeyEvent::new(KeyCode::Escape)));
//! assert_eq!(action, Some(DialogAction::EscapePressed));
//! assert!(host.is_empty());
//! assert!(!ctl.close());
//! ```

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use qedit_core::{Event, HitTarget, KeyCode};
use tracing::debug;

/// CSS class of the element that hosts one dialog and its mask.
pub const CONTAINER_CLASS: &str = "quickDialog-container";

/// Label of the title-bar close button.
pub const CLOSE_BUTTON_LABEL: &str = "X";

/// Hit target of the mask around a dialog.
pub const DIALOG_HIT_BACKDROP: HitTarget = HitTarget::new(0x5144_0001);

/// Hit target of the dialog body.
pub const DIALOG_HIT_CONTENT: HitTarget = HitTarget::new(0x5144_0002);

/// Hit target of the title-bar close button.
pub const DIALOG_HIT_CLOSE_BUTTON: HitTarget = HitTarget::new(0x5144_0003);

/// Base z-index for the dialog layer.
const BASE_DIALOG_Z: u32 = 1000;

/// Z-index increment between stacked dialogs.
const Z_INCREMENT: u32 = 10;

static DIALOG_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier of an opened dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DialogId(u64);

impl DialogId {
    fn next() -> Self {
        Self(DIALOG_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Options of one dialog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuickDialogProps {
    pub title: String,
    /// Content width in pixels.
    pub width: Option<u32>,
    /// Content height in pixels, also used as the flex basis.
    pub height: Option<u32>,
    pub disable_mask_close: bool,
    pub disable_close_button: bool,
}

impl QuickDialogProps {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn width(mut self, px: u32) -> Self {
        self.width = Some(px);
        self
    }

    #[must_use]
    pub fn height(mut self, px: u32) -> Self {
        self.height = Some(px);
        self
    }

    #[must_use]
    pub fn disable_mask_close(mut self, disable: bool) -> Self {
        self.disable_mask_close = disable;
        self
    }

    #[must_use]
    pub fn disable_close_button(mut self, disable: bool) -> Self {
        self.disable_close_button = disable;
        self
    }

    /// Escape and mask clicks dismiss the dialog only while both the mask
    /// and the close button are enabled.
    fn dismissable(&self) -> bool {
        !self.disable_mask_close && !self.disable_close_button
    }

    fn shows_close_button(&self) -> bool {
        !self.disable_close_button
    }
}

/// How a dialog was dismissed by [`DialogHost::handle_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogAction {
    EscapePressed,
    BackdropClicked,
    CloseButton,
}

/// Inline style of the dialog content box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentStyle {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub flex_basis: Option<u32>,
}

/// Render description of one open dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogView {
    pub id: DialogId,
    pub class: &'static str,
    pub title: String,
    /// `None` when the close button is disabled.
    pub close_button: Option<&'static str>,
    pub content_style: ContentStyle,
    pub z_index: u32,
    pub focused: bool,
}

trait CloseDialog {
    fn close(&self, id: DialogId) -> bool;
    fn is_open(&self, id: DialogId) -> bool;
}

/// Handle given to dialog content for closing its own dialog.
#[derive(Clone)]
pub struct DialogCtl {
    id: DialogId,
    host: Weak<dyn CloseDialog>,
}

impl DialogCtl {
    #[must_use]
    pub fn id(&self) -> DialogId {
        self.id
    }

    /// Close the dialog. Returns `false` if it was already closed or the
    /// host is gone.
    pub fn close(&self) -> bool {
        self.host.upgrade().is_some_and(|host| host.close(self.id))
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.host.upgrade().is_some_and(|host| host.is_open(self.id))
    }
}

impl std::fmt::Debug for DialogCtl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogCtl").field("id", &self.id).finish()
    }
}

struct DialogLayer<C> {
    id: DialogId,
    props: QuickDialogProps,
    content: C,
}

struct HostInner<C> {
    layers: RefCell<Vec<DialogLayer<C>>>,
    focused: Cell<Option<DialogId>>,
    deferred: RefCell<Vec<DialogId>>,
}

impl<C> HostInner<C> {
    fn remove(&self, id: DialogId) -> bool {
        let removed = {
            let Ok(mut layers) = self.layers.try_borrow_mut() else {
                let open = self
                    .layers
                    .try_borrow()
                    .is_ok_and(|layers| layers.iter().any(|layer| layer.id == id));
                let mut deferred = self.deferred.borrow_mut();
                if !open || deferred.contains(&id) {
                    return false;
                }
                deferred.push(id);
                debug!(dialog = id.get(), "dialog close deferred");
                return true;
            };
            let Some(pos) = layers.iter().position(|layer| layer.id == id) else {
                return false;
            };
            let removed = layers.remove(pos);
            if self.focused.get() == Some(id) {
                self.focused.set(layers.last().map(|layer| layer.id));
            }
            removed
        };
        debug!(dialog = id.get(), title = %removed.props.title, "dialog closed");
        // Content is dropped here, after the stack borrow is released.
        drop(removed);
        true
    }

    fn settle(&self) {
        loop {
            let pending = std::mem::take(&mut *self.deferred.borrow_mut());
            if pending.is_empty() {
                break;
            }
            for id in pending {
                self.remove(id);
            }
        }
    }
}

impl<C> CloseDialog for HostInner<C> {
    fn close(&self, id: DialogId) -> bool {
        self.remove(id)
    }

    fn is_open(&self, id: DialogId) -> bool {
        let pending = self.deferred.try_borrow().is_ok_and(|d| d.contains(&id));
        !pending
            && self
                .layers
                .try_borrow()
                .is_ok_and(|layers| layers.iter().any(|layer| layer.id == id))
    }
}

/// LIFO stack of open dialogs with content of type `C`.
pub struct DialogHost<C: 'static> {
    inner: Rc<HostInner<C>>,
}

impl<C: 'static> Default for DialogHost<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: 'static> DialogHost<C> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(HostInner {
                layers: RefCell::new(Vec::new()),
                focused: Cell::new(None),
                deferred: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Open a dialog on top of the stack and focus it.
    ///
    /// `content` builds the dialog body and receives the controller that
    /// closes this dialog; the same controller is returned.
    pub fn open(&self, props: QuickDialogProps, content: impl FnOnce(DialogCtl) -> C) -> DialogCtl {
        let id = DialogId::next();
        let inner: Rc<dyn CloseDialog> = self.inner.clone();
        let ctl = DialogCtl {
            id,
            host: Rc::downgrade(&inner),
        };
        let content = content(ctl.clone());
        debug!(dialog = id.get(), title = %props.title, "dialog opened");
        self.inner
            .layers
            .borrow_mut()
            .push(DialogLayer { id, props, content });
        self.inner.focused.set(Some(id));
        self.inner.settle();
        ctl
    }

    /// Route an event to the top dialog.
    ///
    /// Returns the dismissal that happened, or `None` if the event was not
    /// for the dialog chrome (or no dialog is open).
    pub fn handle_event(&self, event: &Event) -> Option<DialogAction> {
        let (id, action) = {
            let layers = self.inner.layers.borrow();
            let top = layers.last()?;
            let action = match event {
                Event::Key(key)
                    if key.is_press()
                        && key.code == KeyCode::Escape
                        && top.props.dismissable() =>
                {
                    DialogAction::EscapePressed
                }
                Event::Click { target }
                    if *target == DIALOG_HIT_BACKDROP && top.props.dismissable() =>
                {
                    DialogAction::BackdropClicked
                }
                Event::Click { target }
                    if *target == DIALOG_HIT_CLOSE_BUTTON && top.props.shows_close_button() =>
                {
                    DialogAction::CloseButton
                }
                _ => return None,
            };
            (top.id, action)
        };
        self.inner.remove(id);
        debug!(dialog = id.get(), ?action, "dialog dismissed");
        Some(action)
    }

    /// Render descriptions, bottom dialog first.
    #[must_use]
    pub fn views(&self) -> Vec<DialogView> {
        let focused = self.inner.focused.get();
        self.inner
            .layers
            .borrow()
            .iter()
            .enumerate()
            .map(|(index, layer)| DialogView {
                id: layer.id,
                class: CONTAINER_CLASS,
                title: layer.props.title.clone(),
                close_button: layer.props.shows_close_button().then_some(CLOSE_BUTTON_LABEL),
                content_style: ContentStyle {
                    width: layer.props.width,
                    height: layer.props.height,
                    flex_basis: layer.props.height,
                },
                z_index: BASE_DIALOG_Z + Z_INCREMENT * index as u32,
                focused: focused == Some(layer.id),
            })
            .collect()
    }

    /// Run `f` on the content of dialog `id`.
    ///
    /// Closes requested by `f` through a [`DialogCtl`] apply when it returns.
    pub fn with_content<R>(&self, id: DialogId, f: impl FnOnce(&C) -> R) -> Option<R> {
        let result = {
            let layers = self.inner.layers.borrow();
            layers
                .iter()
                .find(|layer| layer.id == id)
                .map(|layer| f(&layer.content))
        };
        self.inner.settle();
        result
    }

    #[must_use]
    pub fn focused(&self) -> Option<DialogId> {
        self.inner.focused.get()
    }

    #[must_use]
    pub fn top(&self) -> Option<DialogId> {
        self.inner.layers.borrow().last().map(|layer| layer.id)
    }

    #[must_use]
    pub fn is_open(&self, id: DialogId) -> bool {
        self.inner.is_open(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.layers.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.layers.borrow().is_empty()
    }

    /// Close every dialog, top first.
    pub fn close_all(&self) {
        while let Some(id) = self.top() {
            self.inner.remove(id);
        }
    }
}

impl<C: 'static> std::fmt::Debug for DialogHost<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogHost")
            .field("len", &self.len())
            .field("focused", &self.focused())
            .finish()
    }
}

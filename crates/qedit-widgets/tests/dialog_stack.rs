use std::cell::RefCell;
use std::rc::Rc;

use qedit_core::{Event, KeyCode, KeyEvent, KeyEventKind};
use qedit_widgets::{
    DIALOG_HIT_BACKDROP, DIALOG_HIT_CLOSE_BUTTON, DialogAction, DialogCtl, DialogHost,
    QuickDialogProps,
};

fn escape() -> Event {
    Event::Key(KeyEvent::new(KeyCode::Escape))
}

#[test]
fn only_the_top_dialog_is_dismissed() {
    let host: DialogHost<&'static str> = DialogHost::new();
    let bottom = host.open(QuickDialogProps::new("bottom"), |_| "first");
    let top = host.open(QuickDialogProps::new("top"), |_| "second");
    assert_eq!(host.focused(), Some(top.id()));

    assert_eq!(host.handle_event(&escape()), Some(DialogAction::EscapePressed));
    assert!(!top.is_open());
    assert!(bottom.is_open());
    assert_eq!(host.focused(), Some(bottom.id()));

    assert_eq!(
        host.handle_event(&Event::Click {
            target: DIALOG_HIT_BACKDROP
        }),
        Some(DialogAction::BackdropClicked)
    );
    assert!(host.is_empty());
    assert_eq!(host.focused(), None);
}

#[test]
fn sticky_top_shields_dialogs_below() {
    let host: DialogHost<()> = DialogHost::new();
    let below = host.open(QuickDialogProps::new("below"), |_| ());
    host.open(QuickDialogProps::new("sticky").disable_mask_close(true), |_| ());

    assert_eq!(host.handle_event(&escape()), None);
    assert_eq!(host.len(), 2);
    assert!(below.is_open());
}

#[test]
fn key_release_does_not_close() {
    let host: DialogHost<()> = DialogHost::new();
    host.open(QuickDialogProps::new("x"), |_| ());
    let release = Event::Key(KeyEvent::new(KeyCode::Escape).with_kind(KeyEventKind::Release));
    assert_eq!(host.handle_event(&release), None);
    assert_eq!(host.len(), 1);
}

#[test]
fn views_stack_with_increasing_z_index() {
    let host: DialogHost<()> = DialogHost::new();
    for title in ["one", "two", "three"] {
        host.open(QuickDialogProps::new(title), |_| ());
    }
    let views = host.views();
    let titles: Vec<&str> = views.iter().map(|v| v.title.as_str()).collect();
    assert_eq!(titles, ["one", "two", "three"]);
    assert!(views.windows(2).all(|w| w[0].z_index < w[1].z_index));
    assert_eq!(views.iter().filter(|v| v.focused).count(), 1);
    assert!(views[2].focused);
}

#[test]
fn closing_a_lower_dialog_keeps_focus_on_top() {
    let host: DialogHost<()> = DialogHost::new();
    let a = host.open(QuickDialogProps::new("a"), |_| ());
    let b = host.open(QuickDialogProps::new("b"), |_| ());
    assert!(a.close());
    assert_eq!(host.focused(), Some(b.id()));
    assert_eq!(host.len(), 1);
}

struct Confirm {
    ctl: DialogCtl,
}

#[test]
fn content_can_close_its_own_dialog() {
    let host: DialogHost<Confirm> = DialogHost::new();
    let ctl = host.open(QuickDialogProps::new("confirm"), |ctl| Confirm { ctl });

    let closed = host.with_content(ctl.id(), |content| content.ctl.close());
    assert_eq!(closed, Some(true));
    assert!(host.is_empty());
    assert!(!ctl.is_open());
    assert_eq!(host.with_content(ctl.id(), |_| ()), None);
}

#[test]
fn close_button_reports_action() {
    let host: DialogHost<()> = DialogHost::new();
    host.open(QuickDialogProps::new("btn"), |_| ());
    assert_eq!(
        host.handle_event(&Event::Click {
            target: DIALOG_HIT_CLOSE_BUTTON
        }),
        Some(DialogAction::CloseButton)
    );
}

#[test]
fn controller_outlives_host_safely() {
    let ctl = {
        let host: DialogHost<()> = DialogHost::new();
        host.open(QuickDialogProps::new("gone"), |_| ())
    };
    assert!(!ctl.is_open());
    assert!(!ctl.close());
}

#[test]
fn close_all_drops_every_content() {
    let dropped = Rc::new(RefCell::new(Vec::new()));

    struct Tracked(&'static str, Rc<RefCell<Vec<&'static str>>>);
    impl Drop for Tracked {
        fn drop(&mut self) {
            self.1.borrow_mut().push(self.0);
        }
    }

    let host: DialogHost<Tracked> = DialogHost::new();
    host.open(QuickDialogProps::new("a"), |_| Tracked("a", Rc::clone(&dropped)));
    host.open(QuickDialogProps::new("b"), |_| Tracked("b", Rc::clone(&dropped)));
    host.close_all();
    assert!(host.is_empty());
    assert_eq!(*dropped.borrow(), ["b", "a"]);
}

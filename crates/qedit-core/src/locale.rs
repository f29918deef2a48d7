#![forbid(unsafe_code)]

//! Locale selection for widget labels.
//!
//! The active locale lives in a thread-local [`LocaleContext`] seeded from the
//! environment. Hosts running in a browser call [`set_locale`] with the value
//! of `navigator.language` during startup.

use crate::reactive::{Observable, Subscription};
use std::env;

/// Locale identifier such as `"en"`, `"en-US"`, or `"zh-CN"`.
pub type Locale = String;

thread_local! {
    static GLOBAL_CONTEXT: LocaleContext = LocaleContext::system();
}

/// Shared, observable locale setting.
#[derive(Clone, Debug)]
pub struct LocaleContext {
    current: Observable<Locale>,
}

impl LocaleContext {
    #[must_use]
    pub fn new(locale: impl Into<Locale>) -> Self {
        Self {
            current: Observable::new(normalize_locale(locale.into())),
        }
    }

    /// Context initialized from `LC_ALL` / `LANG`.
    #[must_use]
    pub fn system() -> Self {
        Self::new(detect_system_locale())
    }

    /// The thread-local context shared by all widgets on this thread.
    #[must_use]
    pub fn global() -> Self {
        GLOBAL_CONTEXT.with(Clone::clone)
    }

    #[must_use]
    pub fn current_locale(&self) -> Locale {
        self.current.get()
    }

    pub fn set_locale(&self, locale: impl Into<Locale>) {
        let next = normalize_locale(locale.into());
        let previous = self.current.get();
        if previous == next {
            return;
        }
        tracing::debug!(from = %previous, to = %next, "locale changed");
        self.current.set(next);
    }

    pub fn subscribe(&self, callback: impl Fn(&Locale) + 'static) -> Subscription {
        self.current.subscribe(callback)
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.current.version()
    }
}

/// Detect the locale from the environment. `LC_ALL` wins over `LANG`;
/// defaults to `"en"`.
#[must_use]
pub fn detect_system_locale() -> Locale {
    let lc_all = env::var("LC_ALL").ok();
    let lang = env::var("LANG").ok();
    detect_locale_from(lc_all.as_deref(), lang.as_deref())
}

/// Set the thread-local locale.
pub fn set_locale(locale: impl Into<Locale>) {
    LocaleContext::global().set_locale(locale);
}

/// Read the thread-local locale.
#[must_use]
pub fn current_locale() -> Locale {
    LocaleContext::global().current_locale()
}

/// Primary language subtag, lowercased (`"zh-CN"` → `"zh"`).
#[must_use]
pub fn language_of(locale: &str) -> String {
    locale
        .split('-')
        .next()
        .unwrap_or(locale)
        .to_ascii_lowercase()
}

fn normalize_locale(locale: Locale) -> Locale {
    normalize_locale_raw(&locale).unwrap_or_else(|| "en".to_string())
}

fn detect_locale_from(lc_all: Option<&str>, lang: Option<&str>) -> Locale {
    lc_all
        .and_then(normalize_locale_raw)
        .or_else(|| lang.and_then(normalize_locale_raw))
        .unwrap_or_else(|| "en".to_string())
}

/// `"zh_CN.UTF-8@pinyin"` → `"zh-CN"`; `C`/`POSIX` → `"en"`.
fn normalize_locale_raw(raw: &str) -> Option<Locale> {
    let raw = raw.trim();
    let raw = raw.split(['@', '.']).next().unwrap_or(raw).trim();
    if raw.is_empty() {
        return None;
    }
    if raw.eq_ignore_ascii_case("c") || raw.eq_ignore_ascii_case("posix") {
        return Some("en".to_string());
    }
    Some(raw.replace('_', "-"))
}

//! In-process browsing contexts.
//!
//! A [`MemoryBrowser`] owns an [`EventLoop`] and a table of page scripts. Each
//! [`MemoryWindow`] is one browsing context: it has a location, a set of
//! message listeners and, when hosted, a parent. Messages posted between
//! windows are delivered on a later turn of the shared event loop and are
//! dropped when the target origin does not match, like `postMessage`.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::error::{Result, TransportError};
use crate::event_loop::EventLoop;
use crate::origin::normalize_location;
use crate::traits::{
    BrowsingContext, FrameSpec, Listener, ListenerId, MessageData, MessageEvent, RawChannel,
};

/// Script run inside a hosted frame once it has loaded.
pub type PageScript = Rc<dyn Fn(MemoryWindow)>;

/// A set of windows sharing one event loop.
#[derive(Clone, Default)]
pub struct MemoryBrowser {
    event_loop: EventLoop,
    pages: Rc<RefCell<HashMap<String, PageScript>>>,
}

impl MemoryBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// The loop driving every window of this browser.
    pub fn event_loop(&self) -> EventLoop {
        self.event_loop.clone()
    }

    /// Register the script executed when a frame loads `url`.
    ///
    /// The fragment of `url` is ignored when matching.
    pub fn register_page(&self, url: &str, script: impl Fn(MemoryWindow) + 'static) {
        self.pages
            .borrow_mut()
            .insert(strip_fragment(url).to_string(), Rc::new(script));
    }

    /// Open a top-level window at `href`.
    pub fn open_window(&self, href: &str) -> Result<MemoryWindow> {
        MemoryWindow::create(self.clone(), href, None, None)
    }

    fn page_for(&self, url: &str) -> Option<PageScript> {
        self.pages.borrow().get(strip_fragment(url)).cloned()
    }
}

impl fmt::Debug for MemoryBrowser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryBrowser")
            .field("event_loop", &self.event_loop)
            .field("pages", &self.pages.borrow().len())
            .finish()
    }
}

/// One in-process browsing context.
#[derive(Clone)]
pub struct MemoryWindow {
    inner: Rc<WindowInner>,
}

struct WindowInner {
    browser: MemoryBrowser,
    href: String,
    origin: String,
    name: Option<String>,
    parent: Option<Weak<WindowInner>>,
    listeners: RefCell<Vec<(ListenerId, Listener)>>,
    next_listener: Cell<u64>,
    frames: RefCell<Vec<HostedFrame>>,
    closed: Cell<bool>,
}

struct HostedFrame {
    spec: FrameSpec,
    window: MemoryWindow,
}

impl MemoryWindow {
    fn create(
        browser: MemoryBrowser,
        href: &str,
        name: Option<String>,
        parent: Option<Weak<WindowInner>>,
    ) -> Result<Self> {
        let origin = normalize_location(href)?;
        Ok(Self {
            inner: Rc::new(WindowInner {
                browser,
                href: href.to_string(),
                origin,
                name,
                parent,
                listeners: RefCell::new(Vec::new()),
                next_listener: Cell::new(1),
                frames: RefCell::new(Vec::new()),
                closed: Cell::new(false),
            }),
        })
    }

    /// Full location of this window.
    pub fn href(&self) -> &str {
        &self.inner.href
    }

    /// Normalized origin of this window.
    pub fn origin(&self) -> &str {
        &self.inner.origin
    }

    /// Frame name, for hosted windows.
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Whether this window has been removed.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.get()
    }

    /// Windows currently hosted by this one, in creation order.
    pub fn frames(&self) -> Vec<MemoryWindow> {
        self.inner
            .frames
            .borrow()
            .iter()
            .map(|frame| frame.window.clone())
            .collect()
    }

    /// The provisioning request a hosted frame was created from.
    pub fn frame_spec(&self, name: &str) -> Option<FrameSpec> {
        self.inner
            .frames
            .borrow()
            .iter()
            .find(|frame| frame.spec.name == name)
            .map(|frame| frame.spec.clone())
    }

    /// Number of message listeners currently registered.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    /// Queue `data` for delivery to this window as if sent from `sender_origin`.
    ///
    /// Delivery happens on a later turn. It is skipped when `target_origin` is
    /// neither `"*"` nor this window's origin, or when the window is closed.
    pub fn post(&self, data: MessageData, sender_origin: &str, target_origin: &str) {
        if self.is_closed() {
            trace!(href = %self.inner.href, "dropping message for closed window");
            return;
        }
        if target_origin != "*" {
            let matches = normalize_location(target_origin)
                .map(|target| target == self.inner.origin)
                .unwrap_or(false);
            if !matches {
                trace!(
                    target_origin,
                    origin = %self.inner.origin,
                    "dropping message for mismatched target origin"
                );
                return;
            }
        }

        let event = MessageEvent {
            data,
            origin: sender_origin.to_string(),
        };
        let window = Rc::downgrade(&self.inner);
        self.inner.browser.event_loop.defer(move || {
            if let Some(inner) = window.upgrade() {
                MemoryWindow { inner }.dispatch(&event);
            }
        });
    }

    fn dispatch(&self, event: &MessageEvent) {
        if self.is_closed() {
            return;
        }
        let snapshot: Vec<(ListenerId, Listener)> = self.inner.listeners.borrow().clone();
        for (id, listener) in snapshot {
            // A listener removed by an earlier one in this dispatch must not run.
            let registered = self
                .inner
                .listeners
                .borrow()
                .iter()
                .any(|(other, _)| *other == id);
            if registered {
                listener(event);
            }
        }
    }

    fn add_listener(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.inner.next_listener.get());
        self.inner.next_listener.set(id.0 + 1);
        self.inner.listeners.borrow_mut().push((id, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        self.inner
            .listeners
            .borrow_mut()
            .retain(|(other, _)| *other != id);
    }

    fn remove_frame(&self, child: &MemoryWindow) {
        let mut frames = self.inner.frames.borrow_mut();
        if let Some(position) = frames
            .iter()
            .position(|frame| Rc::ptr_eq(&frame.window.inner, &child.inner))
        {
            let frame = frames.remove(position);
            frame.window.close();
            debug!(name = %frame.spec.name, "removed hosted frame");
        }
    }

    fn close(&self) {
        self.inner.closed.set(true);
        self.inner.listeners.borrow_mut().clear();
        let frames: Vec<HostedFrame> = self.inner.frames.borrow_mut().drain(..).collect();
        for frame in frames {
            frame.window.close();
        }
    }
}

impl BrowsingContext for MemoryWindow {
    fn location(&self) -> String {
        self.inner.href.clone()
    }

    fn event_loop(&self) -> EventLoop {
        self.inner.browser.event_loop.clone()
    }

    fn open_frame(&self, spec: FrameSpec) -> Result<Box<dyn RawChannel>> {
        if self.is_closed() {
            return Err(TransportError::Closed(self.inner.href.clone()));
        }

        let child = MemoryWindow::create(
            self.inner.browser.clone(),
            &spec.url,
            Some(spec.name.clone()),
            Some(Rc::downgrade(&self.inner)),
        )?;
        debug!(name = %spec.name, url = %spec.url, "hosting frame");

        let script = self.inner.browser.page_for(&spec.url);
        let on_load = spec.on_load.clone();
        let loading = Rc::downgrade(&child.inner);
        self.inner.browser.event_loop.defer(move || {
            let Some(inner) = loading.upgrade() else {
                return;
            };
            let window = MemoryWindow { inner };
            if window.is_closed() {
                return;
            }
            if let Some(script) = script {
                script(window.clone());
            }
            if let Some(on_load) = on_load {
                let frame: &dyn BrowsingContext = &window;
                on_load(frame);
            }
        });

        self.inner.frames.borrow_mut().push(HostedFrame {
            spec,
            window: child.clone(),
        });

        Ok(Box::new(MemoryChannel::new(self.clone(), child, true)))
    }

    fn parent(&self) -> Option<Box<dyn RawChannel>> {
        let parent = self.inner.parent.as_ref()?.upgrade()?;
        Some(Box::new(MemoryChannel::new(
            self.clone(),
            MemoryWindow { inner: parent },
            false,
        )))
    }
}

impl fmt::Debug for MemoryWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryWindow")
            .field("href", &self.inner.href)
            .field("origin", &self.inner.origin)
            .field("closed", &self.inner.closed.get())
            .finish()
    }
}

/// Channel between a local window and a remote one.
pub struct MemoryChannel {
    local: MemoryWindow,
    remote: MemoryWindow,
    owns_remote: bool,
}

impl MemoryChannel {
    /// `owns_remote` marks the side that created the remote frame; only that
    /// side removes it on [`RawChannel::close`].
    pub fn new(local: MemoryWindow, remote: MemoryWindow, owns_remote: bool) -> Self {
        Self {
            local,
            remote,
            owns_remote,
        }
    }

    pub fn local(&self) -> &MemoryWindow {
        &self.local
    }

    pub fn remote(&self) -> &MemoryWindow {
        &self.remote
    }
}

impl RawChannel for MemoryChannel {
    fn send(&self, payload: &str, target_origin: &str) {
        self.remote
            .post(MessageData::from(payload), self.local.origin(), target_origin);
    }

    fn listen(&self, listener: Listener) -> ListenerId {
        self.local.add_listener(listener)
    }

    fn unlisten(&self, id: ListenerId) {
        self.local.remove_listener(id);
    }

    fn close(&self) {
        if self.owns_remote {
            self.local.remove_frame(&self.remote);
        }
    }
}

fn strip_fragment(url: &str) -> &str {
    url.split_once('#').map_or(url, |(base, _)| base)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn recorder(window: &MemoryWindow) -> Rc<RefCell<Vec<MessageEvent>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        window.add_listener(Rc::new(move |event: &MessageEvent| {
            sink.borrow_mut().push(event.clone())
        }));
        seen
    }

    #[test]
    fn post_is_delivered_on_a_later_turn() {
        let browser = MemoryBrowser::new();
        let window = browser.open_window("http://host.test/index.html").unwrap();
        let seen = recorder(&window);

        window.post(MessageData::from("hi"), "http://guest.test", "*");
        assert!(seen.borrow().is_empty());

        browser.event_loop().run_until_idle();
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(seen.borrow()[0].origin, "http://guest.test");
        assert_eq!(seen.borrow()[0].data.as_text(), Some("hi"));
    }

    #[test]
    fn post_to_wrong_target_origin_is_dropped() {
        let browser = MemoryBrowser::new();
        let window = browser.open_window("http://host.test/index.html").unwrap();
        let seen = recorder(&window);

        window.post(MessageData::from("a"), "http://guest.test", "http://other.test");
        window.post(
            MessageData::from("b"),
            "http://guest.test",
            "http://host.test/some/path",
        );
        browser.event_loop().run_until_idle();

        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(seen.borrow()[0].data.as_text(), Some("b"));
    }

    #[test]
    fn hosted_frame_runs_page_script_then_on_load() {
        let browser = MemoryBrowser::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let script_log = Rc::clone(&log);
        browser.register_page("http://guest.test/frame.html", move |window| {
            script_log.borrow_mut().push(format!("script {}", window.href()));
        });
        let host = browser.open_window("http://host.test/").unwrap();

        let load_log = Rc::clone(&log);
        let _channel = host
            .open_frame(FrameSpec {
                url: "http://guest.test/frame.html#xdm_c=c1".to_string(),
                name: "xdm_c1_provider".to_string(),
                container: "body".to_string(),
                on_load: Some(Rc::new(move |frame: &dyn BrowsingContext| {
                    load_log
                        .borrow_mut()
                        .push(format!("load {}", frame.location()));
                })),
                ..FrameSpec::default()
            })
            .unwrap();

        assert!(log.borrow().is_empty());
        browser.event_loop().run_until_idle();
        assert_eq!(
            *log.borrow(),
            vec![
                "script http://guest.test/frame.html#xdm_c=c1".to_string(),
                "load http://guest.test/frame.html#xdm_c=c1".to_string()
            ]
        );
        assert_eq!(host.frames().len(), 1);
        assert_eq!(host.frames()[0].name(), Some("xdm_c1_provider"));
    }

    #[test]
    fn channel_pair_exchanges_messages_with_sender_origin() {
        let browser = MemoryBrowser::new();
        let host = browser.open_window("http://host.test/").unwrap();
        let to_guest = host
            .open_frame(FrameSpec {
                url: "http://guest.test/frame.html".to_string(),
                name: "f".to_string(),
                ..FrameSpec::default()
            })
            .unwrap();
        let guest = host.frames()[0].clone();
        let to_host = guest.parent().expect("hosted window has a parent");

        let at_host = recorder(&host);
        let at_guest = recorder(&guest);

        to_guest.send("down", "http://guest.test");
        to_host.send("up", "http://host.test");
        browser.event_loop().run_until_idle();

        assert_eq!(at_guest.borrow()[0].origin, "http://host.test");
        assert_eq!(at_guest.borrow()[0].data.as_text(), Some("down"));
        assert_eq!(at_host.borrow()[0].origin, "http://guest.test");
        assert_eq!(at_host.borrow()[0].data.as_text(), Some("up"));
    }

    #[test]
    fn closing_owner_channel_removes_frame() {
        let browser = MemoryBrowser::new();
        let host = browser.open_window("http://host.test/").unwrap();
        let channel = host
            .open_frame(FrameSpec {
                url: "http://guest.test/frame.html".to_string(),
                name: "f".to_string(),
                ..FrameSpec::default()
            })
            .unwrap();
        let guest = host.frames()[0].clone();

        channel.close();
        assert!(host.frames().is_empty());
        assert!(guest.is_closed());

        channel.send("late", "*");
        browser.event_loop().run_until_idle();
        assert_eq!(guest.listener_count(), 0);
    }

    #[test]
    fn listener_removed_during_dispatch_does_not_run() {
        let browser = MemoryBrowser::new();
        let window = browser.open_window("http://host.test/").unwrap();
        let calls = Rc::new(RefCell::new(Vec::new()));

        let second_id = Rc::new(Cell::new(ListenerId(0)));
        let remover_window = window.clone();
        let remover_target = Rc::clone(&second_id);
        let first_calls = Rc::clone(&calls);
        window.add_listener(Rc::new(move |_event: &MessageEvent| {
            first_calls.borrow_mut().push("first");
            remover_window.remove_listener(remover_target.get());
        }));
        let second_calls = Rc::clone(&calls);
        second_id.set(window.add_listener(Rc::new(move |_event: &MessageEvent| {
            second_calls.borrow_mut().push("second")
        })));

        window.post(MessageData::from("x"), "http://a.test", "*");
        browser.event_loop().run_until_idle();
        assert_eq!(*calls.borrow(), vec!["first"]);
    }
}

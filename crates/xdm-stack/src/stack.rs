use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;
use xdm_transport::EventLoop;

/// Completion signal for an outgoing message. `true` when the layer below
/// accepted it.
pub type Ack = Box<dyn FnOnce(bool)>;

/// One element of a communication stack.
///
/// Every method has a default that forwards to the neighbor the operation
/// travels towards: `init`, `destroy` and `outgoing` go down, `incoming` and
/// `callback` go up.
pub trait Layer {
    /// Short name used in traces and [`Stack::layer_names`].
    fn name(&self) -> &'static str {
        "layer"
    }

    fn init(&self, cx: &Cx) {
        cx.forward_init();
    }

    fn destroy(&self, cx: &Cx) {
        cx.forward_destroy();
    }

    fn incoming(&self, cx: &Cx, message: &str, origin: &str) {
        cx.forward_incoming(message, origin);
    }

    fn outgoing(&self, cx: &Cx, message: String, origin: Option<String>, ack: Option<Ack>) {
        cx.forward_outgoing(message, origin, ack);
    }

    fn callback(&self, cx: &Cx, success: bool) {
        cx.forward_callback(success);
    }
}

struct Node {
    layer: Rc<dyn Layer>,
    up: Option<usize>,
    down: Option<usize>,
    linked: bool,
}

struct StackInner {
    nodes: RefCell<Vec<Node>>,
    top: Cell<Option<usize>>,
    event_loop: EventLoop,
}

/// An owned chain of layers.
///
/// Index 0 is the bottom (closest to the raw channel), the last layer is the
/// top (closest to the application).
pub struct Stack {
    inner: Rc<StackInner>,
}

impl Stack {
    /// Link `layers` bottom-first into a chain.
    pub fn chain(event_loop: EventLoop, layers: Vec<Box<dyn Layer>>) -> Self {
        let len = layers.len();
        let nodes = layers
            .into_iter()
            .enumerate()
            .map(|(i, layer)| Node {
                layer: Rc::from(layer),
                down: i.checked_sub(1),
                up: (i + 1 < len).then_some(i + 1),
                linked: true,
            })
            .collect();

        Self {
            inner: Rc::new(StackInner {
                nodes: RefCell::new(nodes),
                top: Cell::new(len.checked_sub(1)),
                event_loop,
            }),
        }
    }

    /// Handle to the topmost linked layer.
    pub fn top(&self) -> Option<Cx> {
        self.inner.top.get().map(|index| Cx {
            stack: Rc::downgrade(&self.inner),
            index,
        })
    }

    /// Start the chain. Cascades downward from the top.
    pub fn init(&self) {
        if let Some(top) = self.top() {
            top.init();
        }
    }

    /// Tear the chain down. Cascades downward from the top.
    pub fn destroy(&self) {
        if let Some(top) = self.top() {
            top.destroy();
        }
    }

    /// Names of the linked layers, top first.
    pub fn layer_names(&self) -> Vec<&'static str> {
        let nodes = self.inner.nodes.borrow();
        let mut names = Vec::with_capacity(nodes.len());
        let mut cursor = self.inner.top.get();
        while let Some(index) = cursor {
            names.push(nodes[index].layer.name());
            cursor = nodes[index].down;
        }
        names
    }

    pub fn event_loop(&self) -> EventLoop {
        self.inner.event_loop.clone()
    }
}

impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack")
            .field("layers", &self.layer_names())
            .finish()
    }
}

/// A layer's handle on its position in the chain.
///
/// Cheap to clone and safe to keep in deferred tasks or listeners: it does not
/// keep the stack alive, and every operation is a no-op once the stack is
/// gone.
#[derive(Clone)]
pub struct Cx {
    stack: Weak<StackInner>,
    index: usize,
}

impl Cx {
    fn layer(&self) -> Option<Rc<dyn Layer>> {
        let stack = self.stack.upgrade()?;
        let nodes = stack.nodes.borrow();
        nodes.get(self.index).map(|node| Rc::clone(&node.layer))
    }

    fn neighbor(&self, pick: impl Fn(&Node) -> Option<usize>) -> Option<Cx> {
        let stack = self.stack.upgrade()?;
        let nodes = stack.nodes.borrow();
        let index = pick(nodes.get(self.index)?)?;
        Some(Cx {
            stack: self.stack.clone(),
            index,
        })
    }

    /// The layer above this one, towards the application.
    pub fn up(&self) -> Option<Cx> {
        self.neighbor(|node| node.up)
    }

    /// The layer below this one, towards the raw channel.
    pub fn down(&self) -> Option<Cx> {
        self.neighbor(|node| node.down)
    }

    /// Whether this layer is still part of the chain.
    pub fn is_linked(&self) -> bool {
        self.stack
            .upgrade()
            .and_then(|stack| stack.nodes.borrow().get(self.index).map(|node| node.linked))
            .unwrap_or(false)
    }

    /// Invoke `init` on the layer this handle addresses.
    pub fn init(&self) {
        if let Some(layer) = self.layer() {
            layer.init(self);
        }
    }

    /// Invoke `destroy` on the layer this handle addresses.
    pub fn destroy(&self) {
        if let Some(layer) = self.layer() {
            layer.destroy(self);
        }
    }

    /// Invoke `incoming` on the layer this handle addresses.
    pub fn incoming(&self, message: &str, origin: &str) {
        if let Some(layer) = self.layer() {
            layer.incoming(self, message, origin);
        }
    }

    /// Invoke `outgoing` on the layer this handle addresses.
    pub fn outgoing(&self, message: String, origin: Option<String>, ack: Option<Ack>) {
        match self.layer() {
            Some(layer) => layer.outgoing(self, message, origin, ack),
            None => {
                if let Some(ack) = ack {
                    ack(false);
                }
            }
        }
    }

    /// Invoke `callback` on the layer this handle addresses.
    pub fn callback(&self, success: bool) {
        if let Some(layer) = self.layer() {
            layer.callback(self, success);
        }
    }

    pub fn forward_init(&self) {
        match self.down() {
            Some(down) => down.init(),
            None => trace!(index = self.index, "init reached bottom of stack"),
        }
    }

    pub fn forward_destroy(&self) {
        match self.down() {
            Some(down) => down.destroy(),
            None => trace!(index = self.index, "destroy reached bottom of stack"),
        }
    }

    pub fn forward_incoming(&self, message: &str, origin: &str) {
        match self.up() {
            Some(up) => up.incoming(message, origin),
            None => trace!(index = self.index, origin, "incoming message past top of stack"),
        }
    }

    /// Forward downward. Without a layer below, the message is lost and
    /// `ack` reports failure.
    pub fn forward_outgoing(&self, message: String, origin: Option<String>, ack: Option<Ack>) {
        match self.down() {
            Some(down) => down.outgoing(message, origin, ack),
            None => {
                trace!(index = self.index, "outgoing message past bottom of stack");
                if let Some(ack) = ack {
                    ack(false);
                }
            }
        }
    }

    pub fn forward_callback(&self, success: bool) {
        match self.up() {
            Some(up) => up.callback(success),
            None => trace!(index = self.index, success, "callback past top of stack"),
        }
    }

    /// Splice this layer out of the chain, linking its neighbors directly.
    ///
    /// Removing a layer that is already detached does nothing.
    pub fn remove_self(&self) {
        let Some(stack) = self.stack.upgrade() else {
            return;
        };
        let mut nodes = stack.nodes.borrow_mut();
        let Some(node) = nodes.get(self.index) else {
            return;
        };
        if !node.linked {
            return;
        }
        let (up, down) = (node.up, node.down);

        match up {
            Some(up) => nodes[up].down = down,
            None => stack.top.set(down),
        }
        if let Some(down) = down {
            nodes[down].up = up;
        }

        let node = &mut nodes[self.index];
        node.up = None;
        node.down = None;
        node.linked = false;
        trace!(index = self.index, layer = node.layer.name(), "layer removed from stack");
    }

    /// The event loop driving this stack, while the stack is alive.
    pub fn event_loop(&self) -> Option<EventLoop> {
        self.stack
            .upgrade()
            .map(|stack| stack.event_loop.clone())
    }

    /// Run `task` on a later turn of the stack's event loop.
    ///
    /// Dropped without running if the stack no longer exists.
    pub fn defer(&self, task: impl FnOnce() + 'static) {
        if let Some(event_loop) = self.event_loop() {
            event_loop.defer(task);
        }
    }
}

impl fmt::Debug for Cx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cx")
            .field("index", &self.index)
            .field("linked", &self.is_linked())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    type Log = Rc<RefCell<Vec<String>>>;

    /// Records every operation that reaches it, then forwards by default.
    struct Probe {
        name: &'static str,
        log: Log,
    }

    impl Layer for Probe {
        fn name(&self) -> &'static str {
            self.name
        }

        fn init(&self, cx: &Cx) {
            self.log.borrow_mut().push(format!("{} init", self.name));
            cx.forward_init();
        }

        fn destroy(&self, cx: &Cx) {
            self.log.borrow_mut().push(format!("{} destroy", self.name));
            cx.forward_destroy();
        }

        fn incoming(&self, cx: &Cx, message: &str, origin: &str) {
            self.log
                .borrow_mut()
                .push(format!("{} incoming {message} from {origin}", self.name));
            cx.forward_incoming(message, origin);
        }

        fn outgoing(&self, cx: &Cx, message: String, origin: Option<String>, ack: Option<Ack>) {
            self.log
                .borrow_mut()
                .push(format!("{} outgoing {message}", self.name));
            cx.forward_outgoing(message, origin, ack);
        }

        fn callback(&self, cx: &Cx, success: bool) {
            self.log
                .borrow_mut()
                .push(format!("{} callback {success}", self.name));
            cx.forward_callback(success);
        }
    }

    /// Overrides nothing.
    struct Passthrough;

    impl Layer for Passthrough {
        fn name(&self) -> &'static str {
            "passthrough"
        }
    }

    fn probe(name: &'static str, log: &Log) -> Box<dyn Layer> {
        Box::new(Probe {
            name,
            log: Rc::clone(log),
        })
    }

    fn three_layers(log: &Log) -> Stack {
        Stack::chain(
            EventLoop::new(),
            vec![probe("bottom", log), Box::new(Passthrough), probe("top", log)],
        )
    }

    #[test]
    fn init_and_destroy_cascade_downward() {
        let log = Log::default();
        let stack = three_layers(&log);

        stack.init();
        stack.destroy();

        assert_eq!(
            *log.borrow(),
            vec!["top init", "bottom init", "top destroy", "bottom destroy"]
        );
    }

    #[test]
    fn defaults_forward_in_both_directions() {
        let log = Log::default();
        let stack = three_layers(&log);
        let top = stack.top().unwrap();
        let bottom = top.down().unwrap().down().unwrap();

        top.outgoing("ping".to_string(), None, None);
        bottom.incoming("pong", "http://remote.test");
        bottom.callback(true);

        assert_eq!(
            *log.borrow(),
            vec![
                "top outgoing ping",
                "bottom outgoing ping",
                "bottom incoming pong from http://remote.test",
                "top incoming pong from http://remote.test",
                "bottom callback true",
                "top callback true",
            ]
        );
    }

    #[test]
    fn outgoing_past_bottom_acks_failure() {
        let stack = Stack::chain(EventLoop::new(), vec![Box::new(Passthrough)]);
        let acked = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&acked);

        stack.top().unwrap().outgoing(
            "lost".to_string(),
            None,
            Some(Box::new(move |ok| *sink.borrow_mut() = Some(ok))),
        );

        assert_eq!(*acked.borrow(), Some(false));
    }

    #[test]
    fn remove_self_splices_middle_layer() {
        let log = Log::default();
        let stack = three_layers(&log);
        let middle = stack.top().unwrap().down().unwrap();

        middle.remove_self();

        assert!(!middle.is_linked());
        assert!(middle.up().is_none());
        assert!(middle.down().is_none());
        assert_eq!(stack.layer_names(), vec!["top", "bottom"]);

        stack.top().unwrap().outgoing("direct".to_string(), None, None);
        assert_eq!(
            *log.borrow(),
            vec!["top outgoing direct", "bottom outgoing direct"]
        );
    }

    #[test]
    fn remove_self_twice_is_a_no_op() {
        let log = Log::default();
        let stack = three_layers(&log);
        let middle = stack.top().unwrap().down().unwrap();

        middle.remove_self();
        middle.remove_self();

        assert_eq!(stack.layer_names(), vec!["top", "bottom"]);
    }

    #[test]
    fn removing_top_moves_top_down() {
        let log = Log::default();
        let stack = three_layers(&log);

        stack.top().unwrap().remove_self();

        assert_eq!(stack.layer_names(), vec!["passthrough", "bottom"]);
    }

    #[test]
    fn handles_outliving_the_stack_are_inert() {
        let log = Log::default();
        let stack = three_layers(&log);
        let top = stack.top().unwrap();
        drop(stack);

        top.init();
        top.defer(|| panic!("must not run"));
        assert!(top.event_loop().is_none());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn defer_runs_on_the_stack_event_loop() {
        let event_loop = EventLoop::new();
        let stack = Stack::chain(event_loop.clone(), vec![Box::new(Passthrough)]);
        let ran = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&ran);

        stack.top().unwrap().defer(move || *flag.borrow_mut() = true);
        assert!(!*ran.borrow());
        event_loop.run_until_idle();
        assert!(*ran.borrow());
    }
}

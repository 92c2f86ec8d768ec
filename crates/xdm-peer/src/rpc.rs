use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, info};
use xdm_frame::{ChannelId, PostMessageTransport, Role};
use xdm_rpc::{Interface, Proxy, RpcBehavior};
use xdm_stack::{Cx, Layer, Queue, Stack};
use xdm_transport::{normalize_location, resolve_url, BrowsingContext, RawChannel};

use crate::acl::Acl;
use crate::config::Config;
use crate::error::{PeerError, Result};
use crate::provision::frame_spec;
use crate::query::{Query, PARAM_CHANNEL, PARAM_EMBEDDER};

/// Topmost layer: reports readiness to the application.
struct ReadyNotifier {
    on_ready: Option<Rc<dyn Fn(bool)>>,
}

impl Layer for ReadyNotifier {
    fn name(&self) -> &'static str {
        "ready"
    }

    fn callback(&self, _cx: &Cx, success: bool) {
        if let Some(on_ready) = &self.on_ready {
            on_ready(success);
        }
    }
}

/// The endpoint a connection talks through, decided at setup.
struct Endpoint {
    role: Role,
    channel: ChannelId,
    origin: String,
    port: Box<dyn RawChannel>,
    frame_name: Option<String>,
}

/// One RPC connection between a host page and its hosted frame.
///
/// Created by either side with the same call: a context whose location
/// carries the provider parameters becomes the guest, any other context
/// becomes the host and provisions the frame. Dropping the connection tears
/// it down.
pub struct Rpc {
    stack: Stack,
    proxy: Proxy,
    role: Role,
    channel: ChannelId,
    origin: String,
    frame_name: Option<String>,
    destroyed: Cell<bool>,
}

impl Rpc {
    /// Set up the connection and start the handshake.
    ///
    /// Configuration problems are reported here and leave nothing behind:
    /// no frame is created and no listener is registered.
    pub fn new(context: &dyn BrowsingContext, config: Config, interface: Interface) -> Result<Self> {
        let location = context.location();
        let query = Query::from_location(&location);
        let is_host = config.host.unwrap_or(!query.is_provider());

        let endpoint = if is_host {
            host_endpoint(context, &location, &config)?
        } else {
            guest_endpoint(context, &query, &config)?
        };
        let origin = endpoint.origin;

        let transport = PostMessageTransport::new(
            endpoint.role,
            endpoint.channel.clone(),
            origin.clone(),
            endpoint.port,
        );
        let rpc = RpcBehavior::new(interface);
        let proxy = rpc.proxy();
        let stack = Stack::chain(
            context.event_loop(),
            vec![
                Box::new(transport),
                Box::new(Queue::new(true)),
                Box::new(rpc),
                Box::new(ReadyNotifier {
                    on_ready: config.on_ready.clone(),
                }),
            ],
        );

        info!(
            role = ?endpoint.role,
            channel = %endpoint.channel,
            remote = %origin,
            "rpc connection created"
        );
        stack.init();

        Ok(Self {
            stack,
            proxy,
            role: endpoint.role,
            channel: endpoint.channel,
            origin,
            frame_name: endpoint.frame_name,
            destroyed: Cell::new(false),
        })
    }

    /// Stubs for the declared remote methods. Empty after [`Rpc::destroy`].
    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    /// Normalized origin of the other side.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_host(&self) -> bool {
        self.role == Role::Initiator
    }

    /// Name of the hosted frame, on the host side.
    pub fn frame_name(&self) -> Option<&str> {
        self.frame_name.as_deref()
    }

    /// Names of the layers currently linked, top first.
    pub fn layers(&self) -> Vec<&'static str> {
        self.stack.layer_names()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    /// Tear the connection down: stubs are removed, outstanding calls are
    /// abandoned, listeners are unregistered and a hosted frame is removed.
    pub fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        debug!(channel = %self.channel, "destroying rpc connection");
        self.stack.destroy();
    }
}

impl Drop for Rpc {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl fmt::Debug for Rpc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rpc")
            .field("role", &self.role)
            .field("channel", &self.channel)
            .field("origin", &self.origin)
            .field("frame_name", &self.frame_name)
            .field("destroyed", &self.destroyed.get())
            .finish()
    }
}

fn host_endpoint(context: &dyn BrowsingContext, location: &str, config: &Config) -> Result<Endpoint> {
    let remote_url = config.remote.as_deref().ok_or(PeerError::MissingRemote)?;
    let remote = resolve_url(remote_url, location)?;
    let channel = match &config.channel {
        Some(id) => ChannelId::new(id.clone())?,
        None => ChannelId::generate(),
    };
    let container = config.container.clone().ok_or(PeerError::MissingContainer)?;
    let embedder = normalize_location(location)?;
    let origin = normalize_location(&remote)?;

    let spec = frame_spec(config, container, &remote, &embedder, &channel);
    let frame_name = spec.name.clone();
    debug!(channel = %channel, url = %spec.url, "provisioning frame");
    let port = context.open_frame(spec)?;

    Ok(Endpoint {
        role: Role::Initiator,
        channel,
        origin,
        port,
        frame_name: Some(frame_name),
    })
}

fn guest_endpoint(context: &dyn BrowsingContext, query: &Query, config: &Config) -> Result<Endpoint> {
    let remote = query
        .embedder()
        .ok_or(PeerError::MissingParameter(PARAM_EMBEDDER))?;
    let channel = query
        .channel()
        .ok_or(PeerError::MissingParameter(PARAM_CHANNEL))?;
    let channel = ChannelId::sanitized(channel)?;

    // The ACL sees the same origin the channel is later locked to.
    let origin = normalize_location(&remote)?;
    if !config.acl.is_empty() && !Acl::new(&config.acl)?.matches(&origin) {
        return Err(PeerError::AccessDenied(origin));
    }
    let port = context.parent().ok_or(PeerError::NoParent)?;

    Ok(Endpoint {
        role: Role::Responder,
        channel,
        origin,
        port,
        frame_name: None,
    })
}

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use xdm_transport::{BrowsingContext, LoadHook};

/// Connection configuration.
///
/// Host-side fields (`remote`, `channel`, `container`, `props`, `on_load`)
/// are ignored by the guest side, which takes its parameters from its
/// location instead; `acl` applies to the guest side only.
#[derive(Clone, Default)]
pub struct Config {
    /// Location of the provider page, resolved against the host's location.
    pub remote: Option<String>,
    /// Explicit channel id. Generated when absent.
    pub channel: Option<String>,
    /// Force the host (`true`) or guest (`false`) role instead of detecting it
    /// from the location.
    pub host: Option<bool>,
    /// Element the hosted frame is inserted into.
    pub container: Option<String>,
    /// Frame properties, applied over the defaults.
    pub props: BTreeMap<String, String>,
    /// Origins the guest accepts as embedder. Empty accepts any.
    pub acl: Vec<String>,
    /// Namespace mixed into the frame name prefix.
    pub namespace: Option<String>,
    /// Called once the channel is ready.
    pub on_ready: Option<Rc<dyn Fn(bool)>>,
    /// Called with the hosted frame's context when it has finished loading.
    pub on_load: Option<LoadHook>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = Some(remote.into());
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Force the host role.
    pub fn as_host(mut self) -> Self {
        self.host = Some(true);
        self
    }

    /// Force the guest role.
    pub fn as_guest(mut self) -> Self {
        self.host = Some(false);
        self
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    pub fn with_acl<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.acl.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_on_ready(mut self, on_ready: impl Fn(bool) + 'static) -> Self {
        self.on_ready = Some(Rc::new(on_ready));
        self
    }

    pub fn with_on_load(mut self, on_load: impl Fn(&dyn BrowsingContext) + 'static) -> Self {
        self.on_load = Some(Rc::new(on_load));
        self
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("remote", &self.remote)
            .field("channel", &self.channel)
            .field("host", &self.host)
            .field("container", &self.container)
            .field("props", &self.props)
            .field("acl", &self.acl)
            .field("namespace", &self.namespace)
            .field("on_ready", &self.on_ready.is_some())
            .field("on_load", &self.on_load.is_some())
            .finish()
    }
}

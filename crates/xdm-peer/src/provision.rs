use std::collections::BTreeMap;

use xdm_frame::ChannelId;
use xdm_transport::{append_query_parameters, FrameSpec};

use crate::config::Config;
use crate::query::{PARAM_CHANNEL, PARAM_EMBEDDER, PARAM_PROVIDER};

const BASE_PREFIX: &str = "xdm_";
const NAME_SUFFIX: &str = "_provider";

/// Prefix of hosted frame names, optionally scoped by a namespace.
pub fn frame_prefix(namespace: Option<&str>) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{BASE_PREFIX}{}_", ns.replace('.', "_")),
        _ => BASE_PREFIX.to_string(),
    }
}

/// Element name of the frame hosting `channel`.
pub fn frame_name(prefix: &str, channel: &ChannelId) -> String {
    format!("{prefix}{channel}{NAME_SUFFIX}")
}

/// Presentation properties every hosted frame starts from.
pub fn default_props() -> BTreeMap<String, String> {
    [
        ("frameBorder", "0"),
        ("allowTransparency", "true"),
        ("scrolling", "no"),
        ("width", "100%"),
        ("style", "margin: 0; padding: 0; border: 0"),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value.to_string()))
    .collect()
}

/// Build the provisioning request for a host-side connection.
///
/// `remote` is the resolved provider location and `embedder` the host's own
/// origin; both end up in the frame URL's fragment.
pub fn frame_spec(
    config: &Config,
    container: String,
    remote: &str,
    embedder: &str,
    channel: &ChannelId,
) -> FrameSpec {
    let url = append_query_parameters(
        remote,
        &[
            (PARAM_EMBEDDER, embedder),
            (PARAM_CHANNEL, channel.as_str()),
            (PARAM_PROVIDER, "1"),
        ],
    );

    let mut props = default_props();
    props.extend(
        config
            .props
            .iter()
            .map(|(key, value)| (key.clone(), value.clone())),
    );

    FrameSpec {
        url,
        name: frame_name(&frame_prefix(config.namespace.as_deref()), channel),
        container,
        props,
        on_load: config.on_load.clone(),
    }
}

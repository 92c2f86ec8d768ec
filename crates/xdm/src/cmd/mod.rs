use clap::{Args, Subcommand};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod acl;
pub mod demo;
pub mod frame;
pub mod origin;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check an origin against access control patterns.
    Acl(AclArgs),
    /// Normalize a URL to its origin and resolve it against a base.
    Origin(OriginArgs),
    /// Encode or decode a channel frame.
    #[command(subcommand)]
    Frame(FrameCommand),
    /// Run an in-memory host/guest session and print the call results.
    Demo(DemoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Acl(args) => acl::run(args, format),
        Command::Origin(args) => origin::run(args, format),
        Command::Frame(command) => frame::run(command, format),
        Command::Demo(args) => demo::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct AclArgs {
    /// Origin to check.
    pub origin: String,
    /// Allowed origin pattern (`*`/`?` wildcards, or a regex starting with `^`).
    #[arg(long = "pattern", short = 'p', required = true)]
    pub patterns: Vec<String>,
}

#[derive(Args, Debug)]
pub struct OriginArgs {
    /// URL to normalize.
    pub url: String,
    /// Base location used to resolve relative URLs.
    #[arg(long, value_name = "URL")]
    pub base: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum FrameCommand {
    /// Prefix a payload with its channel id.
    Encode(FrameArgs),
    /// Strip the channel prefix from a raw frame.
    Decode(FrameArgs),
    /// Print the handshake sentinel of a channel.
    Sentinel(SentinelArgs),
}

#[derive(Args, Debug)]
pub struct FrameArgs {
    /// Channel id.
    #[arg(long, short = 'c')]
    pub channel: String,
    /// Payload (encode) or raw frame (decode).
    pub input: String,
}

#[derive(Args, Debug)]
pub struct SentinelArgs {
    /// Channel id.
    #[arg(long, short = 'c')]
    pub channel: String,
}

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// First operand sent to the guest's `add` method.
    #[arg(long, default_value_t = 2, allow_negative_numbers = true)]
    pub a: i64,
    /// Second operand sent to the guest's `add` method.
    #[arg(long, default_value_t = 3, allow_negative_numbers = true)]
    pub b: i64,
    /// Message echoed by the guest.
    #[arg(long, default_value = "hello")]
    pub message: String,
    /// Explicit channel id. Generated when omitted.
    #[arg(long, short = 'c')]
    pub channel: Option<String>,
    /// ACL the guest applies to the host origin.
    #[arg(long = "acl", value_name = "PATTERN")]
    pub acl: Vec<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

use serde::Serialize;
use xdm_frame::{decode_frame, encode_frame, ready_sentinel, ChannelId};

use crate::cmd::FrameCommand;
use crate::exit::{frame_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct FrameOutput<'a> {
    channel: &'a str,
    payload: &'a str,
    frame: &'a str,
    wire_size: usize,
}

pub fn run(command: FrameCommand, format: OutputFormat) -> CliResult<i32> {
    match command {
        FrameCommand::Encode(args) => {
            let channel = parse_channel(&args.channel)?;
            let frame = encode_frame(&channel, &args.input);
            print_frame(&channel, &args.input, &frame, &frame, format);
        }
        FrameCommand::Decode(args) => {
            let channel = parse_channel(&args.channel)?;
            let payload = decode_frame(&channel, &args.input).ok_or_else(|| {
                CliError::new(
                    DATA_INVALID,
                    format!("decode: input is not a frame for channel {channel}"),
                )
            })?;
            print_frame(&channel, payload, &args.input, payload, format);
        }
        FrameCommand::Sentinel(args) => {
            let channel = parse_channel(&args.channel)?;
            let sentinel = ready_sentinel(&channel);
            print_record(
                &serde_json::json!({ "channel": channel.as_str(), "sentinel": sentinel }),
                &[("channel", channel.to_string()), ("sentinel", sentinel.clone())],
                &sentinel,
                format,
            );
        }
    }
    Ok(SUCCESS)
}

fn parse_channel(raw: &str) -> CliResult<ChannelId> {
    ChannelId::new(raw).map_err(|err| frame_error("channel", err))
}

fn print_frame(channel: &ChannelId, payload: &str, frame: &str, raw: &str, format: OutputFormat) {
    let output = FrameOutput {
        channel: channel.as_str(),
        payload,
        frame,
        wire_size: frame.len(),
    };
    print_record(
        &output,
        &[
            ("channel", channel.to_string()),
            ("payload", payload.to_string()),
            ("frame", frame.to_string()),
            ("wire_size", frame.len().to_string()),
        ],
        raw,
        format,
    );
}

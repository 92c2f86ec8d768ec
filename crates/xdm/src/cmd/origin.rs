use serde::Serialize;
use xdm_transport::{normalize_location, resolve_url};

use crate::cmd::OriginArgs;
use crate::exit::{transport_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct OriginOutput {
    url: String,
    origin: String,
}

pub fn run(args: OriginArgs, format: OutputFormat) -> CliResult<i32> {
    let url = match &args.base {
        Some(base) => resolve_url(&args.url, base).map_err(|err| transport_error("resolve", err))?,
        None => args.url.clone(),
    };
    let origin = normalize_location(&url).map_err(|err| transport_error("origin", err))?;

    print_record(
        &OriginOutput {
            url: url.clone(),
            origin: origin.clone(),
        },
        &[("url", url), ("origin", origin.clone())],
        &origin,
        format,
    );
    Ok(SUCCESS)
}

use serde::Serialize;
use xdm_peer::Acl;

use crate::cmd::AclArgs;
use crate::exit::{peer_error, CliResult, PERMISSION_DENIED, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct AclOutput<'a> {
    origin: &'a str,
    patterns: &'a [String],
    allowed: bool,
}

pub fn run(args: AclArgs, format: OutputFormat) -> CliResult<i32> {
    let acl = Acl::new(&args.patterns).map_err(|err| peer_error("acl", err))?;
    let allowed = acl.matches(&args.origin);
    tracing::debug!(origin = %args.origin, patterns = acl.len(), allowed, "acl checked");

    let output = AclOutput {
        origin: &args.origin,
        patterns: &args.patterns,
        allowed,
    };
    print_record(
        &output,
        &[
            ("origin", args.origin.clone()),
            ("patterns", args.patterns.join(", ")),
            ("allowed", allowed.to_string()),
        ],
        if allowed { "allowed" } else { "denied" },
        format,
    );

    Ok(if allowed { SUCCESS } else { PERMISSION_DENIED })
}

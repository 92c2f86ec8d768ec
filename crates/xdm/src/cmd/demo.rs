use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::Serialize;
use serde_json::{json, Value};
use xdm_peer::{Config, PeerError, Rpc};
use xdm_rpc::{ErrorObject, Interface, Outcome};
use xdm_transport::MemoryBrowser;

use crate::cmd::DemoArgs;
use crate::exit::{peer_error, rpc_error, transport_error, CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{print_rows, OutputFormat};

const HOST_PAGE: &str = "http://host.demo/index.html";
const GUEST_PAGE: &str = "http://guest.demo/provider.html";

type Slot = Rc<RefCell<Option<Result<Value, ErrorObject>>>>;

#[derive(Serialize)]
struct CallOutput {
    method: &'static str,
    params: Vec<Value>,
    status: &'static str,
    value: Value,
}

struct Planned {
    method: &'static str,
    params: Vec<Value>,
    notify: bool,
    slot: Slot,
}

/// Methods the in-memory provider page exposes.
fn guest_interface() -> Interface {
    Interface::new()
        .with_local("add", |params, _reply| {
            let numbers: Option<Vec<i64>> = params.iter().map(Value::as_i64).collect();
            match numbers {
                Some(numbers) => Outcome::Return(json!(numbers.iter().sum::<i64>())),
                None => Outcome::Threw("add expects integers".to_string()),
            }
        })
        .with_local("echo", |params, reply| {
            reply.success(params.into_iter().next().unwrap_or(Value::Null));
            Outcome::Deferred
        })
        .with_local("fail", |_params, _reply| {
            Outcome::Threw("intentional failure".to_string())
        })
        .with_local("log", |params, _reply| {
            tracing::info!(?params, "guest received notification");
            Outcome::Return(Value::Null)
        })
}

pub fn run(args: DemoArgs, format: OutputFormat) -> CliResult<i32> {
    let browser = MemoryBrowser::new();
    let guests: Rc<RefCell<Vec<Rpc>>> = Rc::new(RefCell::new(Vec::new()));
    let guest_error: Rc<RefCell<Option<PeerError>>> = Rc::new(RefCell::new(None));

    {
        let guests = Rc::clone(&guests);
        let guest_error = Rc::clone(&guest_error);
        let acl = args.acl.clone();
        browser.register_page(GUEST_PAGE, move |window| {
            match Rpc::new(&window, Config::new().with_acl(acl.clone()), guest_interface()) {
                Ok(rpc) => guests.borrow_mut().push(rpc),
                Err(err) => *guest_error.borrow_mut() = Some(err),
            }
        });
    }

    let host = browser
        .open_window(HOST_PAGE)
        .map_err(|err| transport_error("host", err))?;
    let ready = Rc::new(Cell::new(false));
    let ready_flag = Rc::clone(&ready);
    let mut config = Config::new()
        .with_remote(GUEST_PAGE)
        .with_container("body")
        .with_on_ready(move |ok| ready_flag.set(ok));
    if let Some(channel) = &args.channel {
        config = config.with_channel(channel.clone());
    }
    let interface = ["add", "echo", "fail", "missing", "log"]
        .into_iter()
        .fold(Interface::new(), |interface, name| interface.with_remote(name));
    let rpc = Rpc::new(&host, config, interface).map_err(|err| peer_error("host", err))?;
    tracing::info!(channel = %rpc.channel(), frame = ?rpc.frame_name(), "demo connection created");

    let plan = vec![
        planned("add", vec![json!(args.a), json!(args.b)], false),
        planned("echo", vec![json!(args.message)], false),
        planned("fail", vec![], false),
        planned("missing", vec![], false),
        planned("log", vec![json!("demo complete")], true),
    ];
    for call in &plan {
        let stub = rpc.proxy().stub(call.method).map_err(|err| rpc_error("stub", err))?;
        let sent = if call.notify {
            stub.notify(call.params.clone())
        } else {
            let on_ok = Rc::clone(&call.slot);
            let on_err = Rc::clone(&call.slot);
            stub.call_with_error(
                call.params.clone(),
                move |value| *on_ok.borrow_mut() = Some(Ok(value)),
                move |error| *on_err.borrow_mut() = Some(Err(error)),
            )
        };
        sent.map_err(|err| rpc_error(call.method, err))?;
    }

    let turns = browser.event_loop().run_until_idle();
    tracing::debug!(turns, "event loop idle");

    if let Some(err) = guest_error.borrow_mut().take() {
        return Err(peer_error("guest", err));
    }
    if !ready.get() {
        return Err(CliError::new(FAILURE, "handshake did not complete"));
    }

    let outputs: Vec<CallOutput> = plan.into_iter().map(into_output).collect();
    let rows: Vec<Vec<String>> = outputs
        .iter()
        .map(|out| {
            vec![
                out.method.to_string(),
                Value::from(out.params.clone()).to_string(),
                out.status.to_string(),
                out.value.to_string(),
            ]
        })
        .collect();
    print_rows(&outputs, &["METHOD", "PARAMS", "STATUS", "VALUE"], &rows, format);

    let unanswered = outputs.iter().any(|out| out.status == "pending");
    rpc.destroy();
    Ok(if unanswered { FAILURE } else { SUCCESS })
}

fn planned(method: &'static str, params: Vec<Value>, notify: bool) -> Planned {
    Planned {
        method,
        params,
        notify,
        slot: Rc::new(RefCell::new(None)),
    }
}

fn into_output(call: Planned) -> CallOutput {
    let outcome = call.slot.borrow_mut().take();
    let (status, value) = match (call.notify, outcome) {
        (true, _) => ("sent", Value::Null),
        (false, Some(Ok(value))) => ("ok", value),
        (false, Some(Err(error))) => ("error", Value::from(error)),
        (false, None) => ("pending", Value::Null),
    };
    CallOutput {
        method: call.method,
        params: call.params,
        status,
        value,
    }
}

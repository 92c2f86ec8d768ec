#![cfg(feature = "peer")]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::{json, Value};
use xdm::peer::PeerError;
use xdm::rpc::{Envelope, ErrorObject, RpcError, APPLICATION_ERROR, METHOD_NOT_FOUND};
use xdm::transport::{MemoryBrowser, MemoryWindow};
use xdm::{Config, Interface, Outcome, Rpc};

const HOST_PAGE: &str = "http://app.example.com/index.html";
const GUEST_PAGE: &str = "http://provider.test/rpc.html";

type Guests = Rc<RefCell<Vec<Rpc>>>;

/// Open the host page with a provider page whose guest side runs `guest()`.
fn connect(
    guest: impl Fn() -> Interface + 'static,
    host_interface: Interface,
) -> (MemoryBrowser, MemoryWindow, Rpc, Guests) {
    let browser = MemoryBrowser::new();
    let guests: Guests = Rc::new(RefCell::new(Vec::new()));
    let slot = Rc::clone(&guests);
    browser.register_page(GUEST_PAGE, move |window| {
        let rpc = Rpc::new(&window, Config::new(), guest()).expect("guest connects");
        slot.borrow_mut().push(rpc);
    });

    let host = browser.open_window(HOST_PAGE).expect("host window");
    let rpc = Rpc::new(
        &host,
        Config::new().with_remote(GUEST_PAGE).with_container("body"),
        host_interface,
    )
    .expect("host connects");
    (browser, host, rpc, guests)
}

fn collector<T: 'static>() -> (Rc<RefCell<Vec<T>>>, impl Fn(T) + Clone + 'static) {
    let store = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&store);
    (store, move |value| sink.borrow_mut().push(value))
}

#[test]
fn add_is_answered_exactly_once() {
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let (browser, _host, rpc, _guests) = connect(
        move || {
            let counter = Rc::clone(&counter);
            Interface::new().with_local("add", move |params, _reply| {
                counter.set(counter.get() + 1);
                let sum: i64 = params.iter().filter_map(Value::as_i64).sum();
                Outcome::Return(json!(sum))
            })
        },
        Interface::new().with_remote("add"),
    );

    let (results, push) = collector::<Value>();
    rpc.proxy()
        .call("add", vec![json!(2), json!(3)], push)
        .expect("call is sent");
    browser.event_loop().run_until_idle();

    assert_eq!(*results.borrow(), vec![json!(5)]);
    assert_eq!(calls.get(), 1);
}

#[test]
fn calls_made_before_ready_are_delivered_in_order() {
    let (browser, _host, rpc, _guests) = connect(
        || {
            Interface::new().with_local("echo", |params, _reply| {
                Outcome::Return(params.into_iter().next().unwrap_or(Value::Null))
            })
        },
        Interface::new().with_remote("echo"),
    );

    let (results, push) = collector::<Value>();
    for n in 0..5 {
        rpc.proxy()
            .call("echo", vec![json!(n)], push.clone())
            .expect("call is queued");
    }
    browser.event_loop().run_until_idle();

    assert_eq!(*results.borrow(), (0..5).map(|n| json!(n)).collect::<Vec<_>>());
}

#[test]
fn notification_carries_no_id() {
    let (seen, push) = collector::<Envelope>();
    let (browser, _host, rpc, _guests) = connect(
        move || {
            let push = push.clone();
            Interface::new().with_raw_hook(move |call, _sender| push(Envelope::Call(call.clone())))
        },
        Interface::new().with_remote("log"),
    );

    rpc.proxy()
        .notify("log", vec![json!("hello")])
        .expect("notification is sent");
    browser.event_loop().run_until_idle();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    match &seen[0] {
        Envelope::Call(call) => {
            assert_eq!(call.method, "log");
            assert!(call.is_notification());
            assert_eq!(call.params_list(), vec![json!("hello")]);
        }
        other => panic!("unexpected envelope: {other:?}"),
    }
}

#[test]
fn unknown_method_fails_with_method_not_found() {
    let (browser, _host, rpc, _guests) =
        connect(Interface::new, Interface::new().with_remote("missing"));

    let (errors, push) = collector::<ErrorObject>();
    rpc.proxy()
        .stub("missing")
        .expect("stub exists")
        .call_with_error(vec![], |_| panic!("no result expected"), push)
        .expect("call is sent");
    browser.event_loop().run_until_idle();

    let errors = errors.borrow();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, METHOD_NOT_FOUND);
    assert_eq!(errors[0].message, "Procedure not found.");
}

#[test]
fn throwing_handler_reports_application_error_and_channel_survives() {
    let (browser, _host, rpc, _guests) = connect(
        || {
            Interface::new()
                .with_local("boom", |_params, _reply| -> Outcome { panic!("exploded") })
                .with_local("ok", |_params, _reply| Outcome::Return(json!(true)))
        },
        Interface::new().with_remote("boom").with_remote("ok"),
    );

    let (errors, push_error) = collector::<ErrorObject>();
    let (results, push_result) = collector::<Value>();
    rpc.proxy()
        .stub("boom")
        .expect("stub exists")
        .call_with_error(vec![], |_| panic!("no result expected"), push_error)
        .expect("call is sent");
    rpc.proxy()
        .call("ok", vec![], push_result)
        .expect("call is sent");
    browser.event_loop().run_until_idle();

    let errors = errors.borrow();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, APPLICATION_ERROR);
    assert_eq!(errors[0].message, "exploded");
    assert_eq!(*results.borrow(), vec![json!(true)]);
}

#[test]
fn duplicate_reply_is_not_delivered() {
    let (reported, report) = collector::<String>();
    let (browser, _host, rpc, _guests) = connect(
        || {
            Interface::new().with_raw_hook(|call, sender| {
                let id = call.id.clone().unwrap_or(Value::Null);
                sender
                    .send(&Envelope::result(id.clone(), json!("first")))
                    .unwrap();
                sender.send(&Envelope::result(id, json!("second"))).unwrap();
            })
        },
        Interface::new()
            .with_remote("twice")
            .with_error_sink(move |err: &RpcError| report(err.to_string())),
    );

    let (results, push) = collector::<Value>();
    rpc.proxy()
        .call("twice", vec![], push)
        .expect("call is sent");
    browser.event_loop().run_until_idle();

    assert_eq!(*results.borrow(), vec![json!("first")]);
    assert_eq!(reported.borrow().len(), 1);
}

#[test]
fn teardown_rejects_calls_and_drops_continuations() {
    let (browser, host, rpc, guests) = connect(
        || Interface::new().with_local("slow", |_params, _reply| Outcome::Deferred),
        Interface::new().with_remote("slow"),
    );
    browser.event_loop().run_until_idle();
    assert_eq!(guests.borrow().len(), 1);

    let stub = rpc.proxy().stub("slow").expect("stub exists");
    let fired = Rc::new(Cell::new(false));
    let flag = Rc::clone(&fired);
    stub.call(vec![], move |_| flag.set(true)).expect("call is sent");

    rpc.destroy();
    browser.event_loop().run_until_idle();

    assert!(!fired.get());
    assert!(matches!(stub.call(vec![], |_| {}), Err(RpcError::Destroyed)));
    assert!(matches!(rpc.proxy().stub("slow"), Err(RpcError::Destroyed)));
    assert!(host.frames().is_empty());
    assert_eq!(host.listener_count(), 0);
}

#[test]
fn wildcard_acl_admits_matching_embedder_only() {
    let run = |host_page: &str| {
        let browser = MemoryBrowser::new();
        let outcome = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&outcome);
        browser.register_page(GUEST_PAGE, move |window| {
            let result = Rpc::new(
                &window,
                Config::new().with_acl(["*.example.com"]),
                Interface::new(),
            );
            *slot.borrow_mut() = Some(result.map(|rpc| rpc.origin().to_string()));
        });
        let host = browser.open_window(host_page).expect("host window");
        let _rpc = Rpc::new(
            &host,
            Config::new().with_remote(GUEST_PAGE).with_container("body"),
            Interface::new(),
        )
        .expect("host connects");
        browser.event_loop().run_until_idle();
        let result = outcome.borrow_mut().take().expect("guest page ran");
        result
    };

    assert_eq!(
        run("http://app.example.com/index.html").expect("allowed"),
        "http://app.example.com"
    );
    assert!(matches!(
        run("http://example.org/index.html"),
        Err(PeerError::AccessDenied(origin)) if origin == "http://example.org"
    ));
}

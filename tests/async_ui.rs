//! Async cells driving the UI through `when`.
//!
//! Futures are parked on oneshot channels and driven by a `LocalPool`, so
//! settle order is chosen by the test.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;

use futures::channel::oneshot;
use futures::executor::LocalPool;

use spark_web::{
    AsyncState, Document, HostNode, HostTree, View, WhenOptions, async_derived, component, element,
    mount, render_to_string, reset_config, set_spawner, signal, when,
};

type Reply = oneshot::Sender<Result<String, String>>;

fn client() -> (Rc<Document>, HostNode) {
    let doc = Rc::new(Document::new());
    let container = doc.create_element("body");
    doc.insert_child(doc.root(), container, 0);
    (doc, container)
}

fn profile_view(user: impl Fn() -> AsyncState<String, String> + 'static) -> View {
    element("div")
        .child(when(
            user,
            WhenOptions {
                pending: Some(|| "loading"),
                then_fn: |name: String| element("b").child(name),
                catch_fn: Some(|err: String| format!("failed: {err}")),
                _marker: PhantomData,
            },
        ))
        .into()
}

#[test]
fn test_latest_request_wins_in_the_document() {
    let mut pool = LocalPool::new();
    set_spawner(pool.spawner());

    let user_id = signal(1u32);
    let replies: Rc<RefCell<Vec<Reply>>> = Rc::new(RefCell::new(Vec::new()));
    let replies_clone = replies.clone();
    let user = async_derived(move || {
        user_id.get();
        let (tx, rx) = oneshot::channel();
        replies_clone.borrow_mut().push(tx);
        async move { rx.await.unwrap_or_else(|_| Err("cancelled".to_string())) }
    });

    let (doc, container) = client();
    let _handle = mount(doc.clone(), container, profile_view(move || user.get()));
    assert_eq!(doc.inner_html(container), "<div>loading<!--show--></div>");

    // Second request starts before the first settles
    user_id.set(2);
    let second = replies.borrow_mut().pop().unwrap();
    let first = replies.borrow_mut().pop().unwrap();

    second.send(Ok("Grace".into())).unwrap();
    pool.run_until_stalled();
    assert_eq!(doc.inner_html(container), "<div><b>Grace</b><!--show--></div>");

    first.send(Ok("Ada".into())).unwrap();
    pool.run_until_stalled();
    assert_eq!(
        doc.inner_html(container),
        "<div><b>Grace</b><!--show--></div>",
        "stale result ignored"
    );

    reset_config();
}

#[test]
fn test_rejection_renders_catch_branch() {
    let mut pool = LocalPool::new();
    set_spawner(pool.spawner());

    let replies: Rc<RefCell<Vec<Reply>>> = Rc::new(RefCell::new(Vec::new()));
    let replies_clone = replies.clone();
    let user = async_derived(move || {
        let (tx, rx) = oneshot::channel();
        replies_clone.borrow_mut().push(tx);
        async move { rx.await.unwrap_or_else(|_| Err("cancelled".to_string())) }
    });

    let (doc, container) = client();
    let _handle = mount(doc.clone(), container, profile_view(move || user.get()));

    let reply = replies.borrow_mut().remove(0);
    reply.send(Err("offline".into())).unwrap();
    pool.run_until_stalled();
    assert_eq!(doc.inner_html(container), "<div>failed: offline<!--show--></div>");

    // Refetch goes back to pending, then resolves
    user.refetch();
    assert_eq!(doc.inner_html(container), "<div>loading<!--show--></div>");
    let reply = replies.borrow_mut().remove(0);
    reply.send(Ok("Ada".into())).unwrap();
    pool.run_until_stalled();
    assert_eq!(doc.inner_html(container), "<div><b>Ada</b><!--show--></div>");

    reset_config();
}

#[test]
fn test_server_render_ships_pending_state() {
    let output = render_to_string(component(|| {
        let user = async_derived(|| async { Ok::<_, String>("never".to_string()) });
        profile_view(move || user.get())
    }));
    assert_eq!(output.html, "<div>loading<!--show--></div>");
}

//! End-to-end dispatch behavior through a recording adapter.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use herald_core::{Adapter, AdapterResult, Envelope, InboundMessage, User};
use herald_framework::{ErrorSink, ListenerOptions, Next, Response, Robot};

/// Records every adapter call as `(method, payload)` pairs.
#[derive(Default)]
struct RecordingAdapter {
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl RecordingAdapter {
    fn record(&self, method: &str, strings: &[String]) {
        self.calls.lock().push((method.to_owned(), strings.to_vec()));
    }
}

#[async_trait]
impl Adapter for RecordingAdapter {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, _envelope: &Envelope, strings: &[String]) -> AdapterResult<()> {
        self.record("send", strings);
        Ok(())
    }

    async fn reply(&self, _envelope: &Envelope, strings: &[String]) -> AdapterResult<()> {
        self.record("reply", strings);
        Ok(())
    }

    async fn topic(&self, _envelope: &Envelope, strings: &[String]) -> AdapterResult<()> {
        self.record("topic", strings);
        Ok(())
    }

    async fn play(&self, _envelope: &Envelope, strings: &[String]) -> AdapterResult<()> {
        self.record("play", strings);
        Ok(())
    }
}

#[derive(Default)]
struct VecSink(Mutex<Vec<String>>);

impl ErrorSink for VecSink {
    fn report(&self, error: anyhow::Error, _response: Option<&Response>) {
        self.0.lock().push(error.to_string());
    }
}

fn harness() -> (Robot, Arc<RecordingAdapter>, Arc<VecSink>) {
    let adapter = Arc::new(RecordingAdapter::default());
    let sink = Arc::new(VecSink::default());
    let robot = Robot::builder(SharedAdapter(Arc::clone(&adapter)))
        .name("herald")
        .error_sink(Arc::clone(&sink) as Arc<dyn ErrorSink>)
        .build();
    (robot, adapter, sink)
}

/// Lets the test keep a handle to the adapter the robot owns.
struct SharedAdapter(Arc<RecordingAdapter>);

#[async_trait]
impl Adapter for SharedAdapter {
    fn name(&self) -> &str {
        self.0.name()
    }

    async fn send(&self, envelope: &Envelope, strings: &[String]) -> AdapterResult<()> {
        self.0.send(envelope, strings).await
    }

    async fn reply(&self, envelope: &Envelope, strings: &[String]) -> AdapterResult<()> {
        self.0.reply(envelope, strings).await
    }

    async fn topic(&self, envelope: &Envelope, strings: &[String]) -> AdapterResult<()> {
        self.0.topic(envelope, strings).await
    }

    async fn play(&self, envelope: &Envelope, strings: &[String]) -> AdapterResult<()> {
        self.0.play(envelope, strings).await
    }
}

fn text(t: &str) -> InboundMessage {
    InboundMessage::text_message(User::new("1").with_name("alice").with_room("#test"), t, "msg-1")
}

// =============================================================================
// Matching and ordering
// =============================================================================

#[tokio::test]
async fn only_the_matching_listener_fires() {
    let (robot, adapter, _sink) = harness();

    robot
        .hear(r"^message123$", |res| async move {
            res.send(["heard it"]).await?;
            Ok(())
        })
        .unwrap();
    robot
        .hear(r"^something else$", |res| async move {
            res.send(["wrong one"]).await?;
            Ok(())
        })
        .unwrap();

    assert!(robot.receive(text("message123")).await);
    assert_eq!(
        *adapter.calls.lock(),
        vec![("send".to_owned(), vec!["heard it".to_owned()])]
    );
}

#[tokio::test]
async fn every_listener_gets_one_offer_in_registration_order() {
    let (robot, _adapter, _sink) = harness();
    let order = Arc::new(Mutex::new(Vec::new()));
    let offers = Arc::new(AtomicUsize::new(0));

    for name in ["first", "second", "third", "fourth"] {
        let order = Arc::clone(&order);
        let offers = Arc::clone(&offers);
        robot.listen(
            move |message| {
                offers.fetch_add(1, Ordering::SeqCst);
                message.text().map(|_| herald_framework::MatchData::default())
            },
            ListenerOptions::with_id(name),
            move |_res| {
                let order = Arc::clone(&order);
                async move {
                    order.lock().push(name);
                    Ok(())
                }
            },
        );
    }

    assert!(robot.receive(text("anything")).await);
    assert_eq!(offers.load(Ordering::SeqCst), 4);
    assert_eq!(*order.lock(), vec!["first", "second", "third", "fourth"]);
}

// =============================================================================
// Catch-all
// =============================================================================

#[tokio::test]
async fn unmatched_message_reaches_catch_all_exactly_once() {
    let (robot, _adapter, _sink) = harness();
    let hits = Arc::new(AtomicUsize::new(0));

    robot.hear(r"^message123$", |_res| async { Ok(()) }).unwrap();

    let hits2 = Arc::clone(&hits);
    robot.catch_all(move |res| {
        let hits2 = Arc::clone(&hits2);
        async move {
            hits2.fetch_add(1, Ordering::SeqCst);
            assert!(res.message().is_catch_all());
            assert_eq!(
                res.message().original().and_then(|m| m.text()),
                Some("nope")
            );
            Ok(())
        }
    });

    assert!(robot.receive(text("nope")).await);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // A matched message never reaches the fallback.
    assert!(robot.receive(text("message123")).await);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_catch_all_listener_terminates_the_dispatch() {
    let (robot, _adapter, _sink) = harness();
    robot.hear(r"^only this$", |_res| async { Ok(()) }).unwrap();

    // No fallback registered: the wrapper matches nothing and the
    // recursion bottoms out on the wrapper check.
    assert!(!robot.receive(text("anything else")).await);
}

// =============================================================================
// Addressed (respond) listeners
// =============================================================================

#[tokio::test]
async fn respond_fires_only_when_addressed() {
    let (robot, adapter, _sink) = harness();

    robot
        .respond(r"ping", |res| async move {
            res.reply(["pong"]).await?;
            Ok(())
        })
        .unwrap();

    assert!(robot.receive(text("herald ping")).await);
    assert!(!robot.receive(text("ping")).await);
    assert_eq!(
        *adapter.calls.lock(),
        vec![("reply".to_owned(), vec!["pong".to_owned()])]
    );
}

// =============================================================================
// Response middleware
// =============================================================================

#[tokio::test]
async fn response_middleware_rewrites_sequentially() {
    let (robot, adapter, _sink) = harness();

    robot.response_middleware(|ctx| async move {
        ctx.update_strings(|strings| {
            for s in strings.iter_mut() {
                *s = s.replace("foobar", "barfoo");
            }
        });
        Ok(Next::Continue)
    });
    robot.response_middleware(|ctx| async move {
        ctx.update_strings(|strings| {
            for s in strings.iter_mut() {
                *s = s.replace("barfoo", "replaced bar-foo");
            }
        });
        Ok(Next::Continue)
    });

    robot
        .hear(r"^rewrite me$", |res| async move {
            res.send(["foobar"]).await?;
            Ok(())
        })
        .unwrap();

    robot.receive(text("rewrite me")).await;
    assert_eq!(
        *adapter.calls.lock(),
        vec![("send".to_owned(), vec!["replaced bar-foo".to_owned()])]
    );
}

#[tokio::test]
async fn response_middleware_can_replace_the_payload_wholesale() {
    let (robot, adapter, _sink) = harness();

    robot.response_middleware(|ctx| async move {
        ctx.set_strings(vec!["whatever I want.".to_owned()]);
        Ok(Next::Continue)
    });

    robot
        .hear(r"^talk$", |res| async move {
            res.send(["original", "payload"]).await?;
            Ok(())
        })
        .unwrap();

    robot.receive(text("talk")).await;
    assert_eq!(
        *adapter.calls.lock(),
        vec![("send".to_owned(), vec!["whatever I want.".to_owned()])]
    );
}

#[tokio::test]
async fn response_middleware_done_suppresses_the_adapter_call() {
    let (robot, adapter, _sink) = harness();

    robot.response_middleware(|_ctx| async move { Ok(Next::Done) });

    robot
        .hear(r"^quiet$", |res| async move {
            // Suppressed delivery still reads as success to the callback.
            res.send(["should not appear"]).await?;
            Ok(())
        })
        .unwrap();

    assert!(robot.receive(text("quiet")).await);
    assert!(adapter.calls.lock().is_empty());
}

// =============================================================================
// Receive and listener middleware
// =============================================================================

#[tokio::test]
async fn receive_middleware_done_drops_the_message() {
    let (robot, _adapter, _sink) = harness();
    let fired = Arc::new(AtomicUsize::new(0));

    robot.receive_middleware(|_ctx| async move { Ok(Next::Done) });

    let f = Arc::clone(&fired);
    robot
        .hear(r".*", move |_res| {
            let f = Arc::clone(&f);
            async move {
                f.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .unwrap();

    assert!(!robot.receive(text("dropped")).await);
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn listener_middleware_done_vetoes_the_callback_but_counts_as_matched() {
    let (robot, _adapter, _sink) = harness();
    let fired = Arc::new(AtomicUsize::new(0));
    let fallback = Arc::new(AtomicUsize::new(0));

    robot.listener_middleware(|_ctx| async move { Ok(Next::Done) });

    let f = Arc::clone(&fired);
    robot
        .hear(r"^guarded$", move |_res| {
            let f = Arc::clone(&f);
            async move {
                f.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .unwrap();
    let fb = Arc::clone(&fallback);
    robot.catch_all(move |_res| {
        let fb = Arc::clone(&fb);
        async move {
            fb.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    });

    // Vetoed callback still counts as a match, so no catch-all either.
    assert!(robot.receive(text("guarded")).await);
    assert_eq!(fired.load(Ordering::SeqCst), 0);
    assert_eq!(fallback.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unwind_hooks_run_after_the_listener_pass() {
    let (robot, _adapter, _sink) = harness();
    let order = Arc::new(Mutex::new(Vec::new()));

    for label in ["outer", "inner"] {
        let order = Arc::clone(&order);
        robot.receive_middleware(move |_ctx| {
            let order = Arc::clone(&order);
            async move {
                order.lock().push(format!("{label} down"));
                let order = Arc::clone(&order);
                Ok(Next::after(move || async move {
                    order.lock().push(format!("{label} up"));
                }))
            }
        });
    }

    let o = Arc::clone(&order);
    robot
        .hear(r"^go$", move |_res| {
            let o = Arc::clone(&o);
            async move {
                o.lock().push("callback".to_owned());
                Ok(())
            }
        })
        .unwrap();

    robot.receive(text("go")).await;
    assert_eq!(
        *order.lock(),
        vec!["outer down", "inner down", "callback", "inner up", "outer up"]
    );
}

// =============================================================================
// Done flag and error containment
// =============================================================================

#[tokio::test]
async fn finish_skips_listeners_not_yet_offered() {
    let (robot, _adapter, _sink) = harness();
    let later = Arc::new(AtomicUsize::new(0));

    robot
        .hear(r"^stop here$", |res| async move {
            res.finish();
            Ok(())
        })
        .unwrap();
    let l = Arc::clone(&later);
    robot
        .hear(r"^stop here$", move |_res| {
            let l = Arc::clone(&l);
            async move {
                l.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .unwrap();

    assert!(robot.receive(text("stop here")).await);
    assert_eq!(later.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn callback_errors_reach_the_sink_and_still_count_as_matched() {
    let (robot, _adapter, sink) = harness();
    let fallback = Arc::new(AtomicUsize::new(0));

    robot
        .hear(r"^explode$", |_res| async move {
            anyhow::bail!("callback blew up")
        })
        .unwrap();
    let fb = Arc::clone(&fallback);
    robot.catch_all(move |_res| {
        let fb = Arc::clone(&fb);
        async move {
            fb.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    });

    assert!(robot.receive(text("explode")).await);
    assert_eq!(*sink.0.lock(), vec!["callback blew up"]);
    assert_eq!(fallback.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn middleware_errors_reach_the_sink() {
    let (robot, _adapter, sink) = harness();

    robot.receive_middleware(|_ctx| async move { Err(anyhow::anyhow!("gate failed")) });
    robot.hear(r".*", |_res| async { Ok(()) }).unwrap();

    assert!(!robot.receive(text("anything")).await);
    assert_eq!(*sink.0.lock(), vec!["gate failed"]);
}

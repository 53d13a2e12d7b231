mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::unbounded;
use sendlane::{
    Completion, Context, Destination, FnListener, InMemoryTransport, Message, SendError,
    SendResult,
};
use support::recorder::Recorder;
use support::scripted::{GatedTransport, ScriptedTransport};
use support::{context_with, LATENCY_MS};

fn slow(text: &str, latency_ms: i64) -> Message {
    let mut message = Message::text(text);
    message.set_property(LATENCY_MS, latency_ms).unwrap();
    message
}

// ============================================================================
// Drain
// ============================================================================

#[test]
fn drain_returns_after_every_notification() {
    let transport = ScriptedTransport::new();
    let context = context_with(Arc::new(transport), 3);
    let recorder = Arc::new(Recorder::new());
    let mut producer = context.create_producer().unwrap();
    producer.set_async(recorder.clone());

    for i in 0..25 {
        producer
            .send(&Destination::queue("q"), slow(&i.to_string(), (i % 4) as i64))
            .unwrap();
    }
    context.drain().unwrap();

    assert_eq!(recorder.len(), 25);
    assert_eq!(context.in_flight(), 0);
}

#[test]
fn drain_timeout_reports_pending_work() {
    let (transport, gate) = GatedTransport::new();
    let context = Context::new(transport).unwrap();
    let mut producer = context.create_producer().unwrap();
    producer.set_async(Arc::new(Recorder::new()));

    producer.send_text(&Destination::queue("q"), "held").unwrap();
    gate.wait_entered();

    assert!(!context.drain_timeout(Duration::from_millis(20)).unwrap());
    assert_eq!(context.in_flight(), 1);

    gate.release();
    assert!(context.drain_timeout(Duration::from_secs(5)).unwrap());
    assert_eq!(context.in_flight(), 0);
}

#[test]
fn unbounded_drain_timeout_waits_for_completion() {
    let transport = ScriptedTransport::new();
    let context = context_with(Arc::new(transport), 1);
    let recorder = Arc::new(Recorder::new());
    let mut producer = context.create_producer().unwrap();
    producer.set_async(recorder.clone());

    producer.send(&Destination::queue("q"), slow("a", 20)).unwrap();
    assert!(context.drain_timeout(Duration::MAX).unwrap());
    assert_eq!(recorder.len(), 1);
    assert_eq!(context.in_flight(), 0);
}

// ============================================================================
// Reentrancy from inside a notification
// ============================================================================

type Calls = Vec<(&'static str, SendResult<()>)>;

#[test]
fn lifecycle_calls_inside_a_listener_fail_fast() {
    let transport = InMemoryTransport::new();
    let context = Context::new(Arc::new(transport)).unwrap();
    let (tx, rx) = unbounded::<Calls>();

    let inner = context.clone();
    let listener = FnListener::new(
        move |_: Completion| {
            let calls: Calls = vec![
                ("drain", inner.drain()),
                ("drain_timeout", inner.drain_timeout(Duration::from_millis(1)).map(|_| ())),
                ("commit", inner.commit()),
                ("rollback", inner.rollback()),
                ("close", inner.close()),
            ];
            let _ = tx.send(calls);
        },
        |_: Completion, _: SendError| {},
    );

    let mut producer = context.create_producer().unwrap();
    producer.set_async(Arc::new(listener));
    producer.send_text(&Destination::queue("q"), "x").unwrap();

    let calls = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    for (name, result) in calls {
        assert!(
            matches!(result, Err(SendError::State(_))),
            "{} should fail with a state error, got {:?}",
            name,
            result
        );
    }

    context.drain().unwrap();
    assert!(!context.is_closed());
    context.close().unwrap();
}

#[test]
fn listener_may_send_again() {
    let transport = InMemoryTransport::new();
    let context = Context::new(Arc::new(transport.clone())).unwrap();
    let recorder = Arc::new(Recorder::new());

    let follow_up = {
        let context = context.clone();
        let recorder = recorder.clone();
        FnListener::new(
            move |done: Completion| {
                let mut producer = context.create_producer().unwrap();
                producer.set_async(recorder.clone());
                let text = format!("{}-reply", done.message.text_body().unwrap_or(""));
                producer.send_text(&Destination::queue("replies"), text).unwrap();
            },
            |_: Completion, _: SendError| {},
        )
    };

    let mut producer = context.create_producer().unwrap();
    producer.set_async(Arc::new(follow_up));
    producer.send_text(&Destination::queue("q"), "ping").unwrap();

    // The reply is admitted before the first notification completes, so one
    // drain covers both.
    context.drain().unwrap();
    assert_eq!(recorder.len(), 1);
    let replies = transport.find_by_destination(&Destination::queue("replies"));
    assert_eq!(replies[0].text_body(), Some("ping-reply"));
    context.close().unwrap();
}

// ============================================================================
// Close, commit, rollback
// ============================================================================

#[test]
fn close_waits_for_outstanding_sends() {
    let transport = ScriptedTransport::new();
    let context = context_with(Arc::new(transport.clone()), 2);
    let recorder = Arc::new(Recorder::new());
    let mut producer = context.create_producer().unwrap();
    producer.set_async(recorder.clone());

    for i in 0..5 {
        producer
            .send(&Destination::queue("q"), slow(&i.to_string(), 10))
            .unwrap();
    }
    context.close().unwrap();

    assert_eq!(recorder.len(), 5);
    assert_eq!(transport.len(), 5);
    let err = producer.send_text(&Destination::queue("q"), "late").unwrap_err();
    assert!(matches!(err, SendError::State(_)));
}

#[test]
fn commit_and_rollback_drain() {
    let transport = ScriptedTransport::new();
    let context = context_with(Arc::new(transport), 1);
    let recorder = Arc::new(Recorder::new());
    let mut producer = context.create_producer().unwrap();
    producer.set_async(recorder.clone());

    producer.send(&Destination::queue("q"), slow("a", 15)).unwrap();
    context.commit().unwrap();
    assert_eq!(recorder.len(), 1);

    producer.send(&Destination::queue("q"), slow("b", 15)).unwrap();
    context.rollback().unwrap();
    assert_eq!(recorder.len(), 2);
}

// ============================================================================
// Misbehaving listeners
// ============================================================================

#[test]
fn panicking_listener_does_not_stop_the_lane() {
    let transport = InMemoryTransport::new();
    let context = Context::new(Arc::new(transport)).unwrap();
    let delivered = Arc::new(AtomicUsize::new(0));

    let counter = delivered.clone();
    let listener = FnListener::new(
        move |done: Completion| {
            if done.message.text_body() == Some("boom") {
                panic!("listener failure");
            }
            counter.fetch_add(1, Ordering::SeqCst);
        },
        |_: Completion, _: SendError| {},
    );

    let mut producer = context.create_producer().unwrap();
    producer.set_async(Arc::new(listener));
    for text in ["a", "boom", "c"] {
        producer.send_text(&Destination::queue("q"), text).unwrap();
    }
    context.drain().unwrap();

    assert_eq!(delivered.load(Ordering::SeqCst), 2);
    assert_eq!(context.in_flight(), 0);
}

// ============================================================================
// EventEmitter bridge
// ============================================================================

#[cfg(feature = "emitter")]
#[test]
fn emitter_listener_publishes_summaries() {
    use sendlane::{CompletionSummary, EmitterListener, EventEmitter};

    let (tx, rx) = unbounded::<CompletionSummary>();
    let mut emitter = EventEmitter::new();
    emitter.on(EmitterListener::COMPLETED, move |summary: CompletionSummary| {
        let _ = tx.send(summary);
    });

    let context = Context::new(Arc::new(InMemoryTransport::new())).unwrap();
    let mut producer = context.create_producer().unwrap();
    producer.set_async(Arc::new(EmitterListener::new(emitter)));
    producer.send_text(&Destination::topic("news"), "x").unwrap();
    context.drain().unwrap();

    // EventEmitter is async, give it time
    let summary = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(summary.destination, "topic://news");
    assert!(summary.message_id.is_some());
    assert!(summary.error.is_none());
}

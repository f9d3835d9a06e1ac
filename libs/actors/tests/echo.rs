//! End-to-End Tests
//!
//! Small actor programs exercising the public surface together:
//! - echo round trip through `tell` and `reply`
//! - message log of the local driver
//! - systems built from TOML configuration
//! - context helpers and timers used from reactions
//! - replies sent on behalf of another actor

mod common;

use common::*;
use parking_lot::Mutex;
use reactor_actors::config::load_config;
use reactor_actors::mailbox;
use reactor_actors::{
    ActorConfig, ActorContext, ActorInit, ActorRef, ActorStop, ActorSystem, Reactions, SpawnError,
    SubscriptionPolicy, SystemConfig, TimerHandle, TypedSubscription,
};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

fn echo() -> Reactions {
    Reactions::builder()
        .react(|ctx: &ActorContext, text: &String| {
            ctx.reply(text.clone());
        })
        .build()
}

#[test]
fn test_echo_round_trip() {
    let system = system("echo");
    let (tx, rx) = mpsc::channel();

    let echo = system
        .spawn(echo(), ActorConfig::new("echo").with_mailbox(mailbox::unbounded()))
        .unwrap();
    let listener = system
        .spawn(
            Reactions::builder()
                .react(move |ctx: &ActorContext, text: &String| {
                    let _ = tx.send((text.clone(), ctx.sender()));
                })
                .build(),
            ActorConfig::new("listener"),
        )
        .unwrap();

    assert!(echo.tell(&listener, "X".to_string()).is_delivered());
    let (text, from) = collect(&rx, 1).remove(0);
    assert_eq!(text, "X");
    assert_eq!(from, echo);
    system.shutdown().unwrap();
}

#[test]
fn test_message_log_records_local_deliveries() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("messages.log");
    let system = ActorSystem::new(
        SystemConfig::new("logged").with_message_log(&log_path),
    )
    .unwrap();

    let (tx, rx) = mpsc::channel();
    let sink = system
        .spawn(
            Reactions::builder()
                .react(move |_: &ActorContext, value: &u64| {
                    let _ = tx.send(*value);
                })
                .build(),
            ActorConfig::new("sink"),
        )
        .unwrap();
    for value in 0..3u64 {
        sink.tell(&ActorRef::none(), value);
    }
    collect(&rx, 3);
    system.shutdown().unwrap();

    let log = std::fs::read_to_string(&log_path).unwrap();
    let deliveries: Vec<&str> = log.lines().filter(|line| line.contains("sink#")).collect();
    // Init plus three payloads
    assert_eq!(deliveries.len(), 4);
    assert!(deliveries[0].ends_with("ActorInit"));
    assert!(deliveries[1..].iter().all(|line| line.ends_with("u64")));
}

#[test]
fn test_system_from_toml_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
name = "from-file"
timer_threads = 1
ack_timeout_ms = 250

[[dispatchers]]
name = "io"
thread_count = 2
batch_size = 16

[[dispatchers]]
name = "compute"
thread_count = 1
batch_size = 128
"#
    )
    .unwrap();

    let config = load_config(Some(file.path())).unwrap();
    assert_eq!(config.ack_timeout(), Duration::from_millis(250));
    let system = ActorSystem::new(config).unwrap();

    let (tx, rx) = mpsc::channel();
    let reactions = Reactions::builder()
        .react(move |ctx: &ActorContext, _: &ActorInit| {
            let _ = tx.send(ctx.dispatcher_name().to_string());
        })
        .build();
    system
        .spawn(reactions, ActorConfig::new("cruncher").with_dispatcher("compute"))
        .unwrap();
    assert_eq!(collect(&rx, 1), vec!["compute".to_string()]);

    assert_eq!(
        system.spawn(Reactions::empty(), ActorConfig::new("lost").with_dispatcher("gpu")),
        Err(SpawnError::UnknownDispatcher { name: "gpu".into() })
    );
    system.shutdown().unwrap();
}

#[test]
fn test_self_tell_and_dynamic_subscriptions() {
    let system = system("helpers");
    let (tx, rx) = mpsc::channel();

    let listener_tx = tx.clone();
    let listener = Reactions::builder()
        .react(move |ctx: &ActorContext, _: &ActorInit| {
            ctx.self_tell("subscribe");
        })
        .react(move |ctx: &ActorContext, command: &&'static str| {
            if *command == "subscribe" {
                ctx.set_subscriptions(vec![TypedSubscription::new::<u32>(SubscriptionPolicy::Full)]);
                let _ = listener_tx.send(0);
            } else {
                ctx.set_subscriptions(Vec::new());
                let _ = listener_tx.send(1);
            }
        })
        .react(move |_: &ActorContext, value: &u32| {
            let _ = tx.send(*value);
        })
        .build();
    let listener = system.spawn(listener, ActorConfig::new("listener")).unwrap();
    assert_eq!(collect(&rx, 1), vec![0]);

    let target = system
        .spawn(
            Reactions::builder().react(|_: &ActorContext, _: &u32| {}).build(),
            ActorConfig::new("target"),
        )
        .unwrap();
    assert!(target.publish(&ActorRef::none(), 7u32).is_delivered());
    assert_eq!(collect(&rx, 1), vec![7]);

    listener.tell(&ActorRef::none(), "unsubscribe");
    assert_eq!(collect(&rx, 1), vec![1]);
    target.publish(&ActorRef::none(), 8u32);
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    system.shutdown().unwrap();
}

#[test]
fn test_periodic_timer_cancelled_on_stop() {
    let system = system("ticker");
    let ticks = Arc::new(AtomicUsize::new(0));
    let timer: Arc<Mutex<Option<TimerHandle>>> = Arc::new(Mutex::new(None));

    let counter = Arc::clone(&ticks);
    let start_timer = Arc::clone(&timer);
    let stop_timer = Arc::clone(&timer);
    let reactions = Reactions::builder()
        .react(move |ctx: &ActorContext, _: &ActorInit| {
            let me = ctx.self_ref().clone();
            if let Some(system) = ctx.system() {
                let handle = system.timer().schedule_at_fixed_rate(Duration::from_millis(10), move || {
                    let _ = me.tell(&ActorRef::none(), ());
                });
                *start_timer.lock() = Some(handle);
            }
        })
        .react(move |_: &ActorContext, _: &()| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .react(move |_: &ActorContext, _: &ActorStop| {
            if let Some(handle) = stop_timer.lock().take() {
                handle.cancel();
            }
        })
        .build();
    let ticker = system.spawn(reactions, ActorConfig::new("ticker")).unwrap();

    let deadline = std::time::Instant::now() + WAIT;
    while ticks.load(Ordering::SeqCst) < 3 && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(ticks.load(Ordering::SeqCst) >= 3);

    system.stop(ticker.id()).wait_timeout(WAIT).unwrap();
    let handle = timer.lock().take();
    assert!(handle.is_none());
    let after_stop = ticks.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(ticks.load(Ordering::SeqCst), after_stop);
    system.shutdown().unwrap();
}

#[tokio::test]
async fn test_areply_resolves_for_local_callers() {
    let system = system("areply");
    let (tx, rx) = mpsc::channel();

    let responder = Reactions::builder()
        .react(move |ctx: &ActorContext, text: &String| {
            let tx = tx.clone();
            ctx.areply(text.len()).on_complete(move |status| {
                let _ = tx.send(status.is_acknowledged());
            });
        })
        .build();
    let responder = system.spawn(responder, ActorConfig::new("responder")).unwrap();

    let reply: Result<usize, _> = responder
        .ask("four".to_string(), Duration::from_secs(1), "length")
        .await;
    assert_eq!(reply, Ok(4));
    assert_eq!(collect(&rx, 1), vec![true]);
    system.shutdown().unwrap();
}

#[test]
fn test_reply_on_behalf_of_another_actor() {
    let system = system("delegated");
    let (tx, rx) = mpsc::channel();

    let backend = system.spawn(Reactions::empty(), ActorConfig::new("backend")).unwrap();
    let front = {
        let backend = backend.clone();
        let tx = tx.clone();
        Reactions::builder()
            .react(move |ctx: &ActorContext, text: &String| {
                let _ = tx.send(format!("sync {}", ctx.reply_as(&backend, text.to_uppercase()).is_delivered()));
                let tx = tx.clone();
                ctx.areply_as(&backend, text.len()).on_complete(move |status| {
                    let _ = tx.send(format!("async {}", status.is_acknowledged()));
                });
            })
            .build()
    };
    let front = system.spawn(front, ActorConfig::new("front")).unwrap();

    let (reply_tx, reply_rx) = mpsc::channel();
    let client = system
        .spawn(
            Reactions::builder()
                .react(move |ctx: &ActorContext, text: &String| {
                    let _ = reply_tx.send((text.clone(), ctx.sender()));
                })
                .build(),
            ActorConfig::new("client"),
        )
        .unwrap();

    front.tell(&client, "hi".to_string());
    let (text, from) = collect(&reply_rx, 1).remove(0);
    assert_eq!(text, "HI");
    assert_eq!(from, backend);
    let mut statuses = collect(&rx, 2);
    statuses.sort();
    assert_eq!(statuses, vec!["async true".to_string(), "sync true".to_string()]);
    system.shutdown().unwrap();
}

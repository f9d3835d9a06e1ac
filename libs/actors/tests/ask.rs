//! Ask Tests
//!
//! Request/reply through ephemeral actors:
//! - successful replies and concurrent asks
//! - timeout accuracy
//! - unreachable targets fail without waiting
//! - wrong reply types
//! - cancellation by dropping the future

mod common;

use common::*;
use reactor_actors::{
    ActorConfig, ActorContext, ActorId, ActorRef, AskError, NotDeliveredReason, Reactions,
};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
struct Ping(u32);

#[derive(Debug, Clone, PartialEq)]
struct Pong(u32);

fn ponger() -> Reactions {
    Reactions::builder()
        .react(|ctx: &ActorContext, ping: &Ping| {
            ctx.reply(Pong(ping.0));
        })
        .react(|ctx: &ActorContext, _: &String| {
            ctx.reply(404u16);
        })
        .build()
}

#[tokio::test]
async fn test_ask_success() {
    let system = system("ask-success");
    let target = system.spawn(ponger(), ActorConfig::new("ponger")).unwrap();

    let reply: Result<Pong, AskError> = target.ask(Ping(7), Duration::from_secs(1), "ping").await;
    assert_eq!(reply, Ok(Pong(7)));

    // The ephemeral actor is gone once the future resolves
    assert_eq!(system.actor_count(), 2);
    system.shutdown().unwrap();
}

#[tokio::test]
async fn test_concurrent_asks_with_the_same_name() {
    let system = system("ask-concurrent");
    let target = system.spawn(ponger(), ActorConfig::new("ponger")).unwrap();

    let asks: Vec<_> = (0..20)
        .map(|i| target.ask::<Pong, _>(Ping(i), Duration::from_secs(2), "same-name"))
        .collect();
    let replies = futures::future::join_all(asks).await;

    for (i, reply) in replies.into_iter().enumerate() {
        assert_eq!(reply, Ok(Pong(i as u32)));
    }
    system.shutdown().unwrap();
}

#[tokio::test]
async fn test_ask_timeout_is_accurate() {
    let system = system("ask-timeout");
    let silent = system
        .spawn(Reactions::builder().react(|_: &ActorContext, _: &Ping| {}).build(), ActorConfig::new("silent"))
        .unwrap();

    let started = Instant::now();
    let reply = silent.ask::<Pong, _>(Ping(1), Duration::from_millis(100), "slow").await;
    let elapsed = started.elapsed();

    assert_eq!(reply, Err(AskError::Timeout { timeout_ms: 100 }));
    assert!(elapsed >= Duration::from_millis(100), "resolved after {:?}", elapsed);
    assert!(elapsed <= Duration::from_millis(150), "resolved after {:?}", elapsed);
    system.shutdown().unwrap();
}

#[tokio::test]
async fn test_ask_unreachable_fails_immediately() {
    let system = system("ask-unreachable");

    let started = Instant::now();
    let reply = ActorRef::none()
        .ask::<Pong, _>(Ping(1), Duration::from_secs(10), "nobody")
        .await;
    assert!(matches!(
        reply,
        Err(AskError::Delivery(NotDeliveredReason::NoRoute { .. }))
    ));

    let dead = system.spawn(ponger(), ActorConfig::new("dead")).unwrap();
    system.stop(dead.id()).await;
    let reply = dead.ask::<Pong, _>(Ping(1), Duration::from_secs(10), "dead").await;
    assert_eq!(
        reply,
        Err(AskError::Delivery(NotDeliveredReason::NoSuchActor {
            actor: dead.id().clone()
        }))
    );

    assert!(started.elapsed() < Duration::from_secs(1));
    system.shutdown().unwrap();
}

#[tokio::test]
async fn test_ask_type_mismatch() {
    let system = system("ask-mismatch");
    let target = system.spawn(ponger(), ActorConfig::new("ponger")).unwrap();

    let reply = target
        .ask::<Pong, _>("unknown".to_string(), Duration::from_secs(1), "mismatch")
        .await;
    assert_eq!(
        reply,
        Err(AskError::TypeMismatch {
            expected: std::any::type_name::<Pong>(),
            received: "u16",
        })
    );
    system.shutdown().unwrap();
}

#[test]
fn test_dropped_ask_stops_its_actor() {
    let system = system("ask-cancel");
    let silent = system
        .spawn(Reactions::builder().react(|_: &ActorContext, _: &Ping| {}).build(), ActorConfig::new("silent"))
        .unwrap();

    let ask = silent.ask::<Pong, _>(Ping(1), Duration::from_secs(30), "abandoned");
    let deadline = Instant::now() + WAIT;
    while system.actor_count() < 3 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(system.actor_count(), 3);

    drop(ask);
    let deadline = Instant::now() + WAIT;
    while system.actor_count() > 2 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(system.actor_count(), 2);
    assert!(system.is_alive(silent.id()));
    system.shutdown().unwrap();
}

#[test]
fn test_blocking_wait_outside_reactions() {
    let system = system("ask-blocking");
    let target = system.spawn(ponger(), ActorConfig::new("ponger")).unwrap();

    let ask = target.ask::<Pong, _>(Ping(3), Duration::from_secs(1), "blocking");
    assert_eq!(ask.wait_timeout(WAIT), Some(Ok(Pong(3))));
    assert!(ask.is_resolved());

    assert!(!system.is_alive(&ActorId::new("ghost", 999)));
    system.shutdown().unwrap();
}

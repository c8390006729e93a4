use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use ethwatch_sdk::{
    listen, spawn_listener, CancellationToken, ListenerError, StopReason, StreamError,
};
use ethwatch_test_utils::{init_logger, MockSubscription};
use tokio::sync::mpsc;

/// Handler that records every notification it sees.
fn recorder<T: Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl FnMut(T) -> Result<()> + Send) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |notification| {
        sink.lock().unwrap().push(notification);
        Ok(())
    })
}

#[tokio::test]
async fn test_stream_error_after_notifications() -> Result<()> {
    init_logger(false);

    let subscription = MockSubscription::scripted(
        vec!["A", "B"],
        Some(StreamError::Failed("connection reset".to_string())),
    );
    let unsubscribed = subscription.unsubscribe_counter();
    let (seen, handler) = recorder();

    let result = listen(subscription, handler, CancellationToken::new()).await;

    assert_eq!(*seen.lock().unwrap(), vec!["A", "B"]);
    match result {
        Err(ListenerError::Stream(e)) => {
            assert_eq!(e, StreamError::Failed("connection reset".to_string()));
            assert_eq!(e.to_string(), "connection reset");
        }
        other => panic!("Expected stream error, got {other:?}"),
    }
    assert_eq!(unsubscribed.get(), 1);
    Ok(())
}

#[tokio::test]
async fn test_every_notification_delivered_in_order() -> Result<()> {
    init_logger(false);

    let notifications: Vec<u32> = (0..100).collect();
    let subscription = MockSubscription::scripted(
        notifications.clone(),
        Some(StreamError::Failed("gone".to_string())),
    );
    let unsubscribed = subscription.unsubscribe_counter();
    let (seen, handler) = recorder();

    let result = listen(subscription, handler, CancellationToken::new()).await;

    assert!(matches!(result, Err(ListenerError::Stream(_))));
    assert_eq!(*seen.lock().unwrap(), notifications);
    assert_eq!(unsubscribed.get(), 1);
    Ok(())
}

#[tokio::test]
async fn test_cancel_before_any_notification() -> Result<()> {
    init_logger(false);

    let (subscription, _feed) = MockSubscription::<u32>::channel();
    let unsubscribed = subscription.unsubscribe_counter();
    let (seen, handler) = recorder();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let reason = listen(subscription, handler, cancel).await?;

    assert_eq!(reason, StopReason::Cancelled);
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(unsubscribed.get(), 1);
    Ok(())
}

#[tokio::test]
async fn test_fired_token_wins_over_queued_notifications() -> Result<()> {
    init_logger(false);

    let subscription = MockSubscription::scripted(vec![1, 2, 3], None);
    let unsubscribed = subscription.unsubscribe_counter();
    let (seen, handler) = recorder();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let reason = listen(subscription, handler, cancel).await?;

    assert_eq!(reason, StopReason::Cancelled);
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(unsubscribed.get(), 1);
    Ok(())
}

#[tokio::test]
async fn test_cancel_after_some_notifications() -> Result<()> {
    init_logger(false);

    const DELIVERED: usize = 3;
    let (subscription, feed) = MockSubscription::channel();
    let unsubscribed = subscription.unsubscribe_counter();
    let (delivered_tx, mut delivered_rx) = mpsc::unbounded_channel();
    let (seen, mut record) = recorder();

    let cancel = CancellationToken::new();
    let handle = spawn_listener(
        subscription,
        move |n: usize| {
            record(n)?;
            let _ = delivered_tx.send(n);
            Ok(())
        },
        cancel.clone(),
    );

    for n in 0..DELIVERED {
        assert!(feed.send(n));
        assert_eq!(delivered_rx.recv().await, Some(n));
    }
    handle.cancel();

    assert_eq!(handle.join().await?, StopReason::Cancelled);
    assert_eq!(seen.lock().unwrap().len(), DELIVERED);
    assert_eq!(unsubscribed.get(), 1);
    assert!(cancel.is_cancelled());
    Ok(())
}

#[tokio::test]
async fn test_clean_close_from_collaborator() -> Result<()> {
    init_logger(false);

    let subscription = MockSubscription::scripted(vec!["only"], None);
    let unsubscribed = subscription.unsubscribe_counter();
    let (seen, handler) = recorder();

    let reason = listen(subscription, handler, CancellationToken::new()).await?;

    assert_eq!(reason, StopReason::Closed);
    assert_eq!(*seen.lock().unwrap(), vec!["only"]);
    assert_eq!(unsubscribed.get(), 1);
    Ok(())
}

#[tokio::test]
async fn test_handler_error_stops_listener() -> Result<()> {
    init_logger(false);

    let subscription = MockSubscription::scripted(vec![1, 2, 3, 4], None);
    let unsubscribed = subscription.unsubscribe_counter();
    let mut calls = Vec::new();

    let result = listen(
        subscription,
        |n: i32| {
            calls.push(n);
            if n == 2 {
                anyhow::bail!("cannot handle {n}");
            }
            Ok(())
        },
        CancellationToken::new(),
    )
    .await;

    match result {
        Err(ListenerError::Handler(e)) => assert_eq!(e.to_string(), "cannot handle 2"),
        other => panic!("Expected handler error, got {other:?}"),
    }
    assert_eq!(calls, vec![1, 2]);
    assert_eq!(unsubscribed.get(), 1);
    Ok(())
}

#[tokio::test]
async fn test_panicking_handler_releases_subscription() -> Result<()> {
    init_logger(false);

    let subscription = MockSubscription::scripted(vec![1u8, 2], None);
    let unsubscribed = subscription.unsubscribe_counter();

    let handle = spawn_listener(
        subscription,
        |_| panic!("handler blew up"),
        CancellationToken::new(),
    );
    let result = tokio::time::timeout(Duration::from_secs(5), handle.join()).await?;

    match result {
        Err(ListenerError::Handler(e)) => assert!(e.to_string().contains("handler blew up")),
        other => panic!("Expected handler error, got {other:?}"),
    }
    assert_eq!(unsubscribed.get(), 1);
    Ok(())
}

#[tokio::test]
async fn test_lagged_subscription_is_a_stream_error() -> Result<()> {
    init_logger(false);

    let subscription = MockSubscription::scripted(vec![7], Some(StreamError::Lagged(12)));
    let unsubscribed = subscription.unsubscribe_counter();
    let (seen, handler) = recorder();

    let result = listen(subscription, handler, CancellationToken::new()).await;

    assert!(matches!(
        result,
        Err(ListenerError::Stream(StreamError::Lagged(12)))
    ));
    assert_eq!(*seen.lock().unwrap(), vec![7]);
    assert_eq!(unsubscribed.get(), 1);
    Ok(())
}

#[tokio::test]
async fn test_unsubscribe_failure_is_reported_after_clean_exit() -> Result<()> {
    init_logger(false);

    let (subscription, feed) = MockSubscription::<u8>::channel();
    let unsubscribed = subscription.unsubscribe_counter();
    feed.fail_unsubscribe("node went away");
    drop(feed);

    let result = listen(subscription, |_| Ok(()), CancellationToken::new()).await;

    match result {
        Err(ListenerError::Unsubscribe(message)) => assert_eq!(message, "node went away"),
        other => panic!("Expected unsubscribe error, got {other:?}"),
    }
    assert_eq!(unsubscribed.get(), 1);
    Ok(())
}

#[tokio::test]
async fn test_stream_error_wins_over_unsubscribe_failure() -> Result<()> {
    init_logger(false);

    let (subscription, feed) = MockSubscription::<u8>::channel();
    let unsubscribed = subscription.unsubscribe_counter();
    feed.fail_unsubscribe("node went away");
    feed.fail(StreamError::Failed("connection reset".to_string()));

    let result = listen(subscription, |_| Ok(()), CancellationToken::new()).await;

    assert!(matches!(
        result,
        Err(ListenerError::Stream(StreamError::Failed(ref m))) if m == "connection reset"
    ));
    assert_eq!(unsubscribed.get(), 1);
    Ok(())
}

#[tokio::test]
async fn test_cancel_after_deadline() -> Result<()> {
    init_logger(false);

    let (subscription, _feed) = MockSubscription::<u8>::channel();
    let unsubscribed = subscription.unsubscribe_counter();

    let handle = spawn_listener(subscription, |_| Ok(()), CancellationToken::new());
    handle.cancel_after(Duration::from_millis(20));

    let reason = tokio::time::timeout(Duration::from_secs(5), handle.join()).await??;
    assert_eq!(reason, StopReason::Cancelled);
    assert_eq!(unsubscribed.get(), 1);
    Ok(())
}

#[tokio::test]
async fn test_deadline_timer_ends_with_listener() -> Result<()> {
    init_logger(false);

    let subscription = MockSubscription::<u8>::scripted(vec![], None);
    let unsubscribed = subscription.unsubscribe_counter();

    let handle = spawn_listener(subscription, |_| Ok(()), CancellationToken::new());
    let token = handle.cancellation_token();
    let timer = handle.cancel_after(Duration::from_secs(3600));

    let reason = tokio::time::timeout(Duration::from_secs(5), handle.join()).await??;
    assert_eq!(reason, StopReason::Closed);

    tokio::time::timeout(Duration::from_secs(5), timer).await??;
    assert!(!token.is_cancelled());
    assert_eq!(unsubscribed.get(), 1);
    Ok(())
}

#[tokio::test]
async fn test_handle_reports_finished_listener() -> Result<()> {
    init_logger(false);

    let subscription = MockSubscription::scripted(
        vec![1u8],
        Some(StreamError::Failed("boom".to_string())),
    );
    let handle = spawn_listener(subscription, |_| Ok(()), CancellationToken::new());

    while !handle.is_finished() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let result = handle.join().await;
    assert!(matches!(result, Err(ListenerError::Stream(_))));
    Ok(())
}

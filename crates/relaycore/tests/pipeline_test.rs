//! End-to-end request handling with a recording transport.
//!
//! Run with: cargo test -p relaycore --test pipeline_test

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use std::sync::Arc;

use common::{
    backends, files_in, inbound, test_config, FixedProber, RecordingTransport, ScriptedEncoder, ScriptedExtractor,
    Sent, Step, MB,
};
use pretty_assertions::assert_eq;
use relaycore::core::messages;
use relaycore::core::stats::StatsSnapshot;
use relaycore::download::source::ExtractError;
use relaycore::{Outcome, Platform, Relay, RelayConfig};

const X_LINK: &str = "https://x.com/someone/status/1790000000000000000";
const IG_LINK: &str = "https://www.instagram.com/reel/C7abcdEFGH/";

fn relay(config: RelayConfig, steps: Vec<Step>, transport: Arc<RecordingTransport>) -> Relay {
    let extractor = Arc::new(ScriptedExtractor::new(steps));
    let encoder = Arc::new(ScriptedEncoder::new(vec![]));
    Relay::new(
        Arc::new(config),
        backends(extractor, encoder, FixedProber::sar("1:1")),
        transport,
    )
}

#[tokio::test]
async fn test_happy_path_delivers_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(RecordingTransport::default());
    let relay = relay(test_config(dir.path()), vec![Step::Size(12 * MB)], transport.clone());

    let outcome = relay.handle(inbound(42, X_LINK)).await;

    assert_eq!(
        outcome,
        Outcome::Delivered {
            platform: Platform::X,
            size: 12 * MB
        }
    );
    assert_eq!(
        relay.stats(),
        StatsSnapshot {
            total: 1,
            instagram: 0,
            x: 1,
            errors: 0,
            users: 1,
        }
    );
    assert_eq!(
        transport.log(),
        vec![
            Sent::Text {
                chat_id: 42,
                text: messages::DOWNLOADING.to_string()
            },
            Sent::Edit {
                message_id: 100,
                text: messages::SENDING.to_string()
            },
            Sent::Media {
                chat_id: 42,
                size: 12 * MB,
                animated: false,
                file_existed: true
            },
            Sent::Delete { message_id: 100 },
        ]
    );
    assert!(files_in(dir.path()).is_empty());
}

#[tokio::test]
async fn test_sixth_request_in_a_minute_is_rate_limited() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(RecordingTransport::default());
    let relay = relay(test_config(dir.path()), vec![Step::Size(MB)], transport.clone());

    for _ in 0..5 {
        let outcome = relay.handle(inbound(7, IG_LINK)).await;
        assert!(matches!(outcome, Outcome::Delivered { .. }));
    }
    let outcome = relay.handle(inbound(7, IG_LINK)).await;

    let Outcome::RateLimited { retry_after_secs } = outcome else {
        panic!("expected rate limit, got {:?}", outcome);
    };
    assert!(retry_after_secs > 0 && retry_after_secs <= 60);
    assert_eq!(
        transport.texts().last().cloned(),
        Some(messages::rate_limited(retry_after_secs))
    );
    // Rate limiting is not an error
    assert_eq!(relay.stats().errors, 0);
    assert_eq!(relay.stats().total, 5);

    // Another user is unaffected
    assert!(matches!(
        relay.handle(inbound(8, IG_LINK)).await,
        Outcome::Delivered { .. }
    ));
}

#[tokio::test]
async fn test_unsupported_text_is_ignored_silently() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(RecordingTransport::default());
    let relay = relay(test_config(dir.path()), vec![Step::Size(MB)], transport.clone());

    for text in ["hello", "https://youtube.com/watch?v=1", "ftp://x.com/a"] {
        assert_eq!(relay.handle(inbound(1, text)).await, Outcome::Ignored);
    }
    assert!(transport.log().is_empty());
    assert_eq!(relay.stats(), StatsSnapshot::default());
}

#[tokio::test]
async fn test_unsupported_text_gets_hint_when_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(RecordingTransport::default());
    let config = RelayConfig {
        reply_unsupported: true,
        ..test_config(dir.path())
    };
    let relay = relay(config, vec![Step::Size(MB)], transport.clone());

    assert_eq!(relay.handle(inbound(1, "hello")).await, Outcome::Ignored);
    assert_eq!(transport.texts(), vec![messages::UNSUPPORTED_HINT.to_string()]);
}

#[tokio::test]
async fn test_oversize_edits_status_and_counts_error() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(RecordingTransport::default());
    let config = RelayConfig {
        shrink_oversized: false,
        ..test_config(dir.path())
    };
    let relay = relay(config, vec![Step::Size(80 * MB)], transport.clone());

    let outcome = relay.handle(inbound(3, IG_LINK)).await;

    assert_eq!(outcome, Outcome::Failed { kind: "oversize" });
    assert_eq!(
        transport.log().last().cloned(),
        Some(Sent::Edit {
            message_id: 100,
            text: "Видео больше лимита Telegram (50 МБ)".to_string()
        })
    );
    assert_eq!(relay.stats().errors, 1);
    assert_eq!(relay.stats().total, 0);
    assert!(files_in(dir.path()).is_empty());
}

#[tokio::test]
async fn test_private_post_gets_specific_message() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(RecordingTransport::default());
    let relay = relay(
        test_config(dir.path()),
        vec![Step::Fail(ExtractError::Private("login required".into()))],
        transport.clone(),
    );

    let outcome = relay.handle(inbound(3, IG_LINK)).await;

    assert_eq!(outcome, Outcome::Failed { kind: "private" });
    assert_eq!(transport.texts().last().cloned(), Some(messages::PRIVATE_CONTENT.to_string()));
    assert!(files_in(dir.path()).is_empty());
}

#[tokio::test]
async fn test_failed_delivery_still_removes_file() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(RecordingTransport::failing_media());
    let relay = relay(test_config(dir.path()), vec![Step::Size(MB)], transport.clone());

    let outcome = relay.handle(inbound(9, X_LINK)).await;

    assert_eq!(outcome, Outcome::Failed { kind: "delivery" });
    assert!(transport
        .log()
        .iter()
        .any(|s| matches!(s, Sent::Media { file_existed: true, .. })));
    assert_eq!(transport.texts().last().cloned(), Some(messages::DELIVERY_FAILED.to_string()));
    assert_eq!(relay.stats().errors, 1);
    assert!(files_in(dir.path()).is_empty());
}

#[tokio::test]
async fn test_panic_is_contained() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(RecordingTransport::default());
    let relay = relay(test_config(dir.path()), vec![Step::Panic], transport.clone());

    let outcome = relay.handle(inbound(5, X_LINK)).await;

    assert_eq!(outcome, Outcome::Failed { kind: "unexpected" });
    assert_eq!(relay.stats().errors, 1);
    // The status message is not left on "downloading"
    assert_eq!(
        transport.log().last().cloned(),
        Some(Sent::Edit {
            message_id: 100,
            text: messages::GENERIC_FAILURE.to_string()
        })
    );
    // The permit held during the panic is released
    assert_eq!(relay.gate().available(), relay.gate().capacity());
}

#[tokio::test]
async fn test_silent_clip_is_sent_as_animation() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(RecordingTransport::default());
    let extractor = Arc::new(ScriptedExtractor::new(vec![Step::Size(MB)]).without_audio());
    let relay = Relay::new(
        Arc::new(test_config(dir.path())),
        backends(extractor, Arc::new(ScriptedEncoder::new(vec![])), FixedProber::Unavailable),
        transport.clone(),
    );

    relay.handle(inbound(2, X_LINK)).await;

    assert!(transport
        .log()
        .iter()
        .any(|s| matches!(s, Sent::Media { animated: true, .. })));
}

//! Property-based codec robustness tests.
//!
//! Uses proptest to verify:
//! 1. Random bytes never cause a panic in relay `decode` (returns `Err` or
//!    `None` gracefully).
//! 2. Random text never causes a panic in client event decoding.
//! 3. Any chat envelope survives encode → decode, whatever the message text.
//! 4. Envelopes with an unrecognized event name are always ignored.
//! 5. Room ids do not depend on argument order.

use proptest::prelude::*;
use pairchat_proto::event::{self, ClientEvent};
use pairchat_proto::relay::{self, RelayEnvelope};
use pairchat_proto::room::{RoomId, SessionId};

/// Strategy for generating session ids shaped like the transport's.
fn arb_session_id() -> impl Strategy<Value = SessionId> {
    "[0-9a-f]{8}-[0-9a-f]{4}-7[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}".prop_map(SessionId::new)
}

/// Strategy for event names this build does not know.
fn arb_unknown_event() -> impl Strategy<Value = String> {
    "[a-z][a-z-]{0,15}".prop_filter("must not be a known event", |name| {
        !relay::KNOWN_EVENTS.contains(&name.as_str())
    })
}

proptest! {
    /// Random bytes never panic the relay decoder.
    #[test]
    fn relay_decode_random_bytes_no_panic(data in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = relay::decode(&data);
    }

    /// Random text never panics the client event decoder.
    #[test]
    fn client_decode_random_text_no_panic(text in ".{0,256}") {
        let _ = event::decode_client(&text);
    }

    /// Chat envelopes carry arbitrary message text intact.
    #[test]
    fn chat_envelope_preserves_message(
        a in arb_session_id(),
        b in arb_session_id(),
        message in ".{0,1024}",
    ) {
        let envelope = RelayEnvelope::Chat {
            room: RoomId::for_pair(&a, &b),
            message,
        };
        let bytes = relay::encode(&envelope).expect("encode should succeed");
        let decoded = relay::decode(&bytes).expect("decode should succeed");
        prop_assert_eq!(Some(envelope), decoded);
    }

    /// Any well-formed envelope with an unknown event is ignored.
    #[test]
    fn unknown_events_are_ignored(name in arb_unknown_event(), payload in ".{0,64}") {
        let raw = serde_json::json!({ "event": name, "data": { "anything": payload } });
        let bytes = serde_json::to_vec(&raw).expect("json should serialize");
        prop_assert!(relay::decode(&bytes).expect("envelope is well-formed").is_none());
    }

    /// Send-message text survives the client codec unchanged.
    #[test]
    fn send_message_preserves_text(message in ".{0,1024}") {
        let sent = ClientEvent::SendMessage {
            room: RoomId::new("a:b"),
            message,
        };
        let text = event::encode_client(&sent).expect("encode should succeed");
        prop_assert_eq!(event::decode_client(&text).expect("decode should succeed"), sent);
    }

    /// Room ids are symmetric in their two sessions.
    #[test]
    fn room_id_symmetric(a in arb_session_id(), b in arb_session_id()) {
        prop_assert_eq!(RoomId::for_pair(&a, &b), RoomId::for_pair(&b, &a));
    }
}

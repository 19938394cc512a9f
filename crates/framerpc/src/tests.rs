use std::collections::HashMap;

use anyhow::Result;
use framepack::Decoder;
use framepack::Encoder;
use framepack::ErrorKind;
use framepack::Value;

use crate::*;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Protocol `abc` with an untyped `hello` call, plus `math` with typed methods.
fn test_registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register_protocol(
            "abc",
            HashMap::from([("hello".to_string(), MethodDescriptor::untyped(Invocation::Call))]),
        )
        .unwrap();
    registry
        .register(
            ProtocolDescriptor::new("math")
                .method("add", MethodDescriptor::call::<Vec<i64>>())
                .method("log", MethodDescriptor::notify::<String>()),
        )
        .unwrap();
    registry
}

fn encode_frame(values: &[Value]) -> Vec<u8> {
    let mut enc = Encoder::new();
    enc.array(values.len()).unwrap();
    for v in values {
        enc.value(v).unwrap();
    }
    enc.into_bytes().unwrap()
}

fn decode_bytes(bytes: &[u8], registry: &Registry, tracker: &Tracker) -> crate::Result<Message> {
    let mut dec = Decoder::new(bytes);
    decode_frame(&mut dec, registry, tracker)
}

fn run_message_test(values: &[Value]) -> crate::Result<Message> {
    init_tracing();
    let bytes = encode_frame(values);
    decode_bytes(&bytes, &test_registry(), &Tracker::new())
}

fn kind(kind: MessageKind) -> Value {
    Value::Int(kind.wire())
}

// ============================================================================
//  DECODE SCENARIOS
// ============================================================================

#[test]
fn test_message_decode_valid() -> Result<()> {
    let msg = run_message_test(&[kind(MessageKind::Call), 999.into(), "abc.hello".into(), Value::Nil])?;

    assert_eq!(msg.kind(), MessageKind::Call);
    assert_eq!(msg.seqno(), 999);
    assert_eq!(msg.name(), Some("abc.hello"));
    assert!(msg.arg().is_none());
    Ok(())
}

#[test]
fn test_message_decode_invalid_type() {
    let err = run_message_test(&["hello".into(), 0.into(), "invalid".into(), Value::Nil]).unwrap_err();

    assert_eq!(err.to_string(), "[pos 5]: type mismatch: expected integer, found string");
    let Error::Decode(inner) = &err else { panic!("expected decode error, got {:?}", err) };
    assert_eq!(inner.pos(), 5);
}

#[test]
fn test_message_decode_invalid_method_type() {
    let err = run_message_test(&[999.into(), 0.into(), "invalid".into(), Value::Nil]).unwrap_err();

    assert_eq!(err, Error::InvalidRpcType(999));
    assert_eq!(err.to_string(), "invalid RPC type");
}

#[test]
fn test_message_decode_kind_above_i64_range() {
    let err = run_message_test(&[Value::UInt(1u64 << 63), 0.into(), "abc.hello".into(), Value::Nil])
        .unwrap_err();

    assert_eq!(err, Error::InvalidRpcType(1i128 << 63));
    assert_eq!(err.to_string(), "invalid RPC type");
}

#[test]
fn test_message_decode_invalid_kind_ignores_later_fields() {
    let err = run_message_test(&[999.into(), "not-an-int".into(), 5.into(), Value::Nil]).unwrap_err();
    assert_eq!(err, Error::InvalidRpcType(999));
}

#[test]
fn test_message_decode_invalid_protocol() {
    let err = run_message_test(&[kind(MessageKind::Call), 0.into(), "nonexistent.broken".into(), Value::Nil])
        .unwrap_err();

    assert_eq!(err, Error::ProtocolNotFound("nonexistent".into()));
    assert_eq!(err.to_string(), "protocol not found: nonexistent");
}

#[test]
fn test_message_decode_invalid_method() {
    let err = run_message_test(&[kind(MessageKind::Call), 0.into(), "abc.invalid".into(), Value::Nil])
        .unwrap_err();

    assert_eq!(err.to_string(), "method 'invalid' not found in protocol 'abc'");
}

#[test]
fn test_message_decode_wrong_message_length() {
    let err = run_message_test(&[kind(MessageKind::Call), 0.into(), "abc.invalid".into()]).unwrap_err();

    assert_eq!(err, Error::WrongMessageLength { expected: 4, actual: 3 });
    assert_eq!(err.to_string(), "wrong message length");
}

#[test]
fn test_message_decode_response_nil_call() {
    let err = run_message_test(&[kind(MessageKind::Response), 0.into(), 32.into(), "hi".into()]).unwrap_err();

    assert_eq!(err, Error::CallNotFound(0));
    assert_eq!(err.to_string(), "Call not found for sequence number 0");
}

// ============================================================================
//  FRAME SHAPE
// ============================================================================

#[test]
fn test_short_frames_rejected_before_reading() {
    for values in [vec![], vec![kind(MessageKind::Call)]] {
        let err = run_message_test(&values).unwrap_err();
        assert_eq!(err, Error::WrongMessageLength { expected: MIN_FRAME_LEN, actual: values.len() });
    }
}

#[test]
fn test_invalid_kind_wins_over_bad_length() {
    let err = run_message_test(&[7.into(), 0.into()]).unwrap_err();
    assert_eq!(err, Error::InvalidRpcType(7));
}

#[test]
fn test_overlong_call_rejected() {
    let err = run_message_test(&[
        kind(MessageKind::Call),
        0.into(),
        "abc.hello".into(),
        Value::Nil,
        Value::Nil,
    ])
    .unwrap_err();
    assert_eq!(err, Error::WrongMessageLength { expected: 4, actual: 5 });
}

#[test]
fn test_negative_seqno_is_decode_error() {
    let err = run_message_test(&[kind(MessageKind::Call), (-1).into(), "abc.hello".into(), Value::Nil])
        .unwrap_err();
    let Error::Decode(inner) = err else { panic!("expected decode error") };
    assert_eq!(inner.kind(), &ErrorKind::IntegerOverflow { target: "u64" });
}

#[test]
fn test_name_must_be_string() {
    let err = run_message_test(&[kind(MessageKind::Call), 0.into(), 5.into(), Value::Nil]).unwrap_err();
    assert!(matches!(err, Error::Decode(_)));
    assert!(err.to_string().contains("expected string, found u8"));
}

#[test]
fn test_name_without_dot() {
    let err = run_message_test(&[kind(MessageKind::Call), 0.into(), "abc".into(), Value::Nil]).unwrap_err();
    assert_eq!(err.to_string(), "method '' not found in protocol 'abc'");
}

// ============================================================================
//  TYPED ARGUMENTS
// ============================================================================

#[test]
fn test_typed_call_argument() -> Result<()> {
    let registry = test_registry();
    let tracker = Tracker::new();
    let bytes = CallFrame::new(12, "math.add", &vec![2i64, 3]).to_bytes()?;

    let Message::Call(call) = decode_bytes(&bytes, &registry, &tracker)? else {
        panic!("expected call");
    };
    assert_eq!(call.seqno(), 12);
    assert_eq!(call.name(), "math.add");

    let arg = call.into_arg().expect("typed method yields an argument");
    assert_eq!(*arg.downcast::<Vec<i64>>().unwrap(), vec![2, 3]);
    Ok(())
}

#[test]
fn test_typed_argument_mismatch_propagates() -> Result<()> {
    let bytes = CallFrame::new(1, "math.add", "not a list").to_bytes()?;
    let err = decode_bytes(&bytes, &test_registry(), &Tracker::new()).unwrap_err();

    let Error::Decode(inner) = &err else { panic!("expected decode error") };
    assert_eq!(inner.kind(), &ErrorKind::TypeMismatch { expected: "array", found: framepack::Tag::String });
    Ok(())
}

#[test]
fn test_untyped_argument_is_skipped_whole() -> Result<()> {
    let registry = test_registry();
    let tracker = Tracker::new();
    let nested = Value::Array(vec![Value::Map(vec![("k".into(), 1.into())]), "x".into()]);

    let mut enc = Encoder::new();
    CallFrame::new(4, "abc.hello", &nested).encode(&mut enc)?;
    CancelFrame::new(4, "abc.hello").encode(&mut enc)?;
    let bytes = enc.into_bytes()?;

    let mut dec = Decoder::new(&bytes);
    let first = decode_frame(&mut dec, &registry, &tracker)?;
    assert!(first.arg().is_none());

    let second = decode_frame(&mut dec, &registry, &tracker)?;
    assert_eq!(second.kind(), MessageKind::Cancel);
    assert!(dec.is_empty());
    Ok(())
}

#[test]
fn test_notify_and_cancel() -> Result<()> {
    let registry = test_registry();
    let tracker = Tracker::new();

    let bytes = NotifyFrame::new(3, "math.log", "started").to_bytes()?;
    let Message::Notify(notify) = decode_bytes(&bytes, &registry, &tracker)? else {
        panic!("expected notify");
    };
    assert_eq!(notify.name(), "math.log");
    assert_eq!(notify.arg().and_then(|a| a.downcast_ref::<String>()).map(String::as_str), Some("started"));

    let bytes = CancelFrame::new(3, "math.add").to_bytes()?;
    let msg = decode_bytes(&bytes, &registry, &tracker)?;
    assert_eq!(msg.kind(), MessageKind::Cancel);
    assert_eq!(msg.seqno(), 3);
    assert_eq!(msg.name(), Some("math.add"));

    let bytes = CancelFrame::new(3, "math.nope").to_bytes()?;
    let err = decode_bytes(&bytes, &registry, &tracker).unwrap_err();
    assert_eq!(err.to_string(), "method 'nope' not found in protocol 'math'");
    Ok(())
}

#[test]
fn test_cancel_arity() {
    let err = run_message_test(&[kind(MessageKind::Cancel), 0.into(), "abc.hello".into(), Value::Nil])
        .unwrap_err();
    assert_eq!(err, Error::WrongMessageLength { expected: 3, actual: 4 });
}

// ============================================================================
//  RESPONSES
// ============================================================================

#[test]
fn test_response_delivers_typed_result() -> Result<()> {
    init_tracing();
    let registry = test_registry();
    let tracker = Tracker::new();
    let (seqno, mut rx) = tracker.begin("math.add", Some(typed::<i64>()));

    let bytes = ResponseFrame::ok(seqno, &5i64).to_bytes()?;
    let Message::Response(resp) = decode_bytes(&bytes, &registry, &tracker)? else {
        panic!("expected response");
    };
    assert_eq!(resp.seqno(), seqno);
    assert_eq!(resp.method(), "math.add");
    assert!(!resp.is_error());
    assert!(tracker.is_empty());

    assert!(resp.complete());
    let outcome = rx.try_recv()?;
    let result = outcome.map_err(|e| anyhow::anyhow!("{}", e))?.expect("typed result");
    assert_eq!(result.downcast_ref::<i64>(), Some(&5));
    Ok(())
}

#[test]
fn test_response_remote_error() -> Result<()> {
    let registry = test_registry();
    let tracker = Tracker::new();
    let (seqno, mut rx) = tracker.begin("math.add", Some(typed::<i64>()));

    let bytes = ResponseFrame::err(seqno, &Value::from("boom"), &()).to_bytes()?;
    let msg = decode_bytes(&bytes, &registry, &tracker)?;
    let Message::Response(resp) = msg else { panic!("expected response") };
    assert_eq!(resp.error().map(|e| e.to_string()), Some("boom".to_string()));
    assert!(resp.result().is_none());
    assert!(resp.complete());

    let err = rx.try_recv()?.unwrap_err();
    assert_eq!(err, RemoteError(Value::from("boom")));
    Ok(())
}

#[test]
fn test_response_error_keeps_typed_result() -> Result<()> {
    let registry = test_registry();
    let tracker = Tracker::new();
    let (seqno, _rx) = tracker.begin("math.add", Some(typed::<i64>()));

    let bytes = ResponseFrame::err(seqno, &Value::from("partial"), &7i64).to_bytes()?;
    let Message::Response(resp) = decode_bytes(&bytes, &registry, &tracker)? else {
        panic!("expected response");
    };
    assert!(resp.is_error());
    assert_eq!(resp.result().and_then(|r| r.downcast_ref::<i64>()), Some(&7));
    Ok(())
}

#[test]
fn test_response_error_result_still_type_checked() -> Result<()> {
    let registry = test_registry();
    let tracker = Tracker::new();
    let (seqno, _rx) = tracker.begin("math.add", Some(typed::<i64>()));

    let bytes = ResponseFrame::err(seqno, &Value::from("boom"), "oops").to_bytes()?;
    let err = decode_bytes(&bytes, &registry, &tracker).unwrap_err();
    assert!(matches!(err, Error::Decode(_)));
    Ok(())
}

#[test]
fn test_response_empty_error_is_success() -> Result<()> {
    let registry = test_registry();
    let tracker = Tracker::new();
    let (call, _rx) = PendingCall::new("abc.hello", None);
    tracker.reserve(0, call)?;

    let bytes = encode_frame(&[kind(MessageKind::Response), 0.into(), "".into(), "hi".into()]);
    let Message::Response(resp) = decode_bytes(&bytes, &registry, &tracker)? else {
        panic!("expected response");
    };
    assert!(resp.error().is_none());
    assert!(resp.result().is_none());
    Ok(())
}

#[test]
fn test_response_resolves_once() -> Result<()> {
    let registry = test_registry();
    let tracker = Tracker::new();
    let (seqno, _rx) = tracker.begin("abc.hello", None);
    let bytes = ResponseFrame::ok(seqno, &()).to_bytes()?;

    decode_bytes(&bytes, &registry, &tracker)?;
    let err = decode_bytes(&bytes, &registry, &tracker).unwrap_err();
    assert_eq!(err, Error::CallNotFound(seqno));
    Ok(())
}

#[test]
fn test_response_after_cancel_not_found() -> Result<()> {
    let registry = test_registry();
    let tracker = Tracker::new();
    let (seqno, _rx) = tracker.begin("abc.hello", None);
    tracker.cancel(seqno);

    let bytes = ResponseFrame::ok(seqno, &()).to_bytes()?;
    assert_eq!(decode_bytes(&bytes, &registry, &tracker).unwrap_err(), Error::CallNotFound(seqno));
    Ok(())
}

#[test]
fn test_failed_response_decode_drops_pending_call() -> Result<()> {
    let registry = test_registry();
    let tracker = Tracker::new();
    let (seqno, mut rx) = tracker.begin("math.add", Some(typed::<i64>()));

    let bytes = ResponseFrame::ok(seqno, "oops").to_bytes()?;
    let err = decode_bytes(&bytes, &registry, &tracker).unwrap_err();
    assert!(matches!(err, Error::Decode(_)));

    assert!(tracker.is_empty());
    assert!(matches!(rx.try_recv(), Err(tokio::sync::oneshot::error::TryRecvError::Closed)));
    Ok(())
}

// ============================================================================
//  REGISTRY
// ============================================================================

#[test]
fn test_registry_duplicate_protocol() {
    let mut registry = test_registry();
    let err = registry.register(ProtocolDescriptor::new("abc")).unwrap_err();
    assert_eq!(err, Error::DuplicateProtocol("abc".into()));
    assert_eq!(err.to_string(), "protocol already registered: abc");
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_registry_resolve() -> Result<()> {
    let registry = test_registry();

    let (protocol, method) = registry.resolve("math.log")?;
    assert_eq!(protocol.name(), "math");
    assert_eq!(method.invocation(), Invocation::Notify);
    assert!(method.is_typed());

    // Only the first dot separates.
    let err = registry.resolve("abc.hello.world").unwrap_err();
    assert_eq!(err, Error::MethodNotFound { method: "hello.world".into(), protocol: "abc".into() });

    let err = registry.resolve(".hello").unwrap_err();
    assert_eq!(err.to_string(), "protocol not found: ");
    Ok(())
}

use std::fmt;
use streamlat_common::{error_chain, StreamError};

#[derive(Debug)]
struct Refused;

impl fmt::Display for Refused {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Connection refused (os error 111)")
    }
}

impl std::error::Error for Refused {}

#[derive(Debug)]
struct SendFailed(Refused);

impl fmt::Display for SendFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error sending request")
    }
}

impl std::error::Error for SendFailed {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

#[test]
fn test_error_display() {
    let err = StreamError::NetworkError("connection refused".to_string());
    assert_eq!(err.to_string(), "Network error: connection refused");
}

#[test]
fn test_error_equality() {
    let err1 = StreamError::MissingField("t".to_string());
    let err2 = StreamError::MissingField("t".to_string());
    let err3 = StreamError::MissingField("k".to_string());

    assert_eq!(err1, err2);
    assert_ne!(err1, err3);
}

#[test]
fn test_http_error() {
    let err = StreamError::HttpError(503, "Broker returned status: 503".to_string());
    assert_eq!(err.to_string(), "HTTP 503: Broker returned status: 503");
}

#[test]
fn test_broker_error() {
    let err = StreamError::Broker { code: 40403, message: "Consumer instance not found.".to_string() };
    assert_eq!(err.to_string(), "Broker error 40403: Consumer instance not found.");
}

#[test]
fn test_partition_eof_display_and_predicate() {
    let err = StreamError::PartitionEof {
        topic: "/sample-stream:fast-messages".to_string(),
        partition: 0,
        offset: 42,
    };
    assert_eq!(
        err.to_string(),
        "End of partition: /sample-stream:fast-messages [0] at offset 42"
    );
    assert!(err.is_partition_eof());
}

#[test]
fn test_only_partition_eof_is_partition_eof() {
    let others = [
        StreamError::NetworkError("x".to_string()),
        StreamError::HttpError(500, "x".to_string()),
        StreamError::Broker { code: 50002, message: "x".to_string() },
        StreamError::MalformedMessage("x".to_string()),
        StreamError::ConsumerClosed,
    ];
    for err in others {
        assert!(!err.is_partition_eof(), "{err} must not count as end of partition");
    }
}

#[test]
fn test_consumer_closed() {
    assert_eq!(StreamError::ConsumerClosed.to_string(), "Consumer instance is closed");
}

#[test]
fn test_error_chain_joins_every_cause() {
    assert_eq!(
        error_chain(&SendFailed(Refused)),
        "error sending request: Connection refused (os error 111)"
    );
    assert_eq!(error_chain(&Refused), "Connection refused (os error 111)");
}

#[test]
fn test_network_error_keeps_root_cause() {
    let err = StreamError::network(&SendFailed(Refused));
    assert_eq!(
        err.to_string(),
        "Network error: error sending request: Connection refused (os error 111)"
    );
}

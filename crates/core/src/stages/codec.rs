//! Handoff codec for stage boundaries.
//!
//! A stage result crosses a boundary as a JSON envelope:
//!
//! ```json
//! {"stage": "download", "ok": true, "payload": {"encoding": "base64", "data": "JVBERi0..."}}
//! ```
//!
//! Binary payloads use standard base64 with padding, text payloads are
//! carried as UTF-8 strings.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::types::{StageError, StageName, StagePayload, StageResult};

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    stage: StageName,
    ok: bool,
    payload: EncodedPayload,
}

#[derive(Debug, Serialize, Deserialize)]
struct EncodedPayload {
    encoding: Encoding,
    data: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Encoding {
    Base64,
    Utf8,
}

/// Encode a stage result into its wire envelope.
pub fn encode(result: &StageResult) -> Result<String, StageError> {
    let payload = match &result.payload {
        StagePayload::Bytes(bytes) => EncodedPayload {
            encoding: Encoding::Base64,
            data: STANDARD.encode(bytes),
        },
        StagePayload::Text(text) => EncodedPayload {
            encoding: Encoding::Utf8,
            data: text.clone(),
        },
    };

    let envelope = Envelope {
        stage: result.stage,
        ok: result.ok,
        payload,
    };
    serde_json::to_string(&envelope).map_err(|e| StageError::Codec(e.to_string()))
}

/// Decode a wire envelope back into a stage result.
pub fn decode(wire: &str) -> Result<StageResult, StageError> {
    let envelope: Envelope =
        serde_json::from_str(wire).map_err(|e| StageError::Codec(e.to_string()))?;

    let payload = match envelope.payload.encoding {
        Encoding::Base64 => StagePayload::Bytes(
            STANDARD
                .decode(envelope.payload.data.as_bytes())
                .map_err(|e| StageError::Codec(format!("invalid base64 payload: {}", e)))?,
        ),
        Encoding::Utf8 => StagePayload::Text(envelope.payload.data),
    };

    Ok(StageResult {
        stage: envelope.stage,
        payload,
        ok: envelope.ok,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_payload_survives_handoff() {
        // Every byte value, including ones that are invalid UTF-8
        let bytes: Vec<u8> = (0..=255u8).chain([0xff, 0xfe, 0x00]).collect();
        let result = StageResult::ok(StageName::Download, StagePayload::Bytes(bytes.clone()));

        let decoded = decode(&encode(&result).unwrap()).unwrap();
        assert_eq!(decoded.stage, StageName::Download);
        assert!(decoded.ok);
        assert_eq!(decoded.payload, StagePayload::Bytes(bytes));
    }

    #[test]
    fn test_envelope_layout() {
        let result = StageResult::ok(StageName::Download, StagePayload::Bytes(b"%PDF".to_vec()));
        let json: serde_json::Value = serde_json::from_str(&encode(&result).unwrap()).unwrap();

        assert_eq!(json["stage"], "download");
        assert_eq!(json["ok"], true);
        assert_eq!(json["payload"]["encoding"], "base64");
        assert_eq!(json["payload"]["data"], "JVBERg==");

        let text = StageResult::ok(
            StageName::ConvertMarkdown,
            StagePayload::Text("# Title\n\nBody ünïcode".to_string()),
        );
        let json: serde_json::Value = serde_json::from_str(&encode(&text).unwrap()).unwrap();
        assert_eq!(json["stage"], "convert_markdown");
        assert_eq!(json["payload"]["encoding"], "utf8");
        assert_eq!(json["payload"]["data"], "# Title\n\nBody ünïcode");
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert!(matches!(decode("not json"), Err(StageError::Codec(_))));

        let bad_base64 =
            r#"{"stage":"download","ok":true,"payload":{"encoding":"base64","data":"@@@"}}"#;
        assert!(matches!(decode(bad_base64), Err(StageError::Codec(_))));

        let bad_stage =
            r#"{"stage":"upload","ok":true,"payload":{"encoding":"utf8","data":""}}"#;
        assert!(matches!(decode(bad_stage), Err(StageError::Codec(_))));
    }
}

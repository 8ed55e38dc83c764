//! Wire messages: `{"kind": "...", "payload": {...}}` JSON frames.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload")]
pub enum ObserverMessage {
    /// Client to observer: ask to run a test case
    #[serde(rename = "init:authorize")]
    InitAuthorize(InitAuthorize),

    /// Observer to client: go ahead
    #[serde(rename = "accept:authorize")]
    AcceptAuthorize(AcceptAuthorize),

    /// Observer to client: refused or broken
    #[serde(rename = "error")]
    Error(ErrorPayload),
}

impl ObserverMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InitAuthorize(_) => "init:authorize",
            Self::AcceptAuthorize(_) => "accept:authorize",
            Self::Error(_) => "error",
        }
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitAuthorize {
    pub test_case_id: String,

    /// The test case definition, forwarded as-is
    pub test_case: serde_json::Value,

    pub api_key: String,
}

impl std::fmt::Debug for InitAuthorize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitAuthorize")
            .field("test_case_id", &self.test_case_id)
            .field("test_case", &self.test_case)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptAuthorize {
    pub org_name: String,
    pub dashboard_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_uses_camel_case_payload() {
        let message = ObserverMessage::InitAuthorize(InitAuthorize {
            test_case_id: "checkout-1".into(),
            test_case: serde_json::json!({ "url": "https://shop.test", "steps": [] }),
            api_key: "wp-secret".into(),
        });
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["kind"], "init:authorize");
        assert_eq!(json["payload"]["testCaseId"], "checkout-1");
        assert_eq!(json["payload"]["apiKey"], "wp-secret");
        assert_eq!(json["payload"]["testCase"]["url"], "https://shop.test");
    }

    #[test]
    fn parses_observer_replies() {
        let accept: ObserverMessage = serde_json::from_str(
            r#"{
                "kind": "accept:authorize",
                "payload": {"orgName": "Acme", "dashboardUrl": "https://dash.test/runs/1"}
            }"#,
        )
        .unwrap();
        assert_eq!(
            accept,
            ObserverMessage::AcceptAuthorize(AcceptAuthorize {
                org_name: "Acme".into(),
                dashboard_url: "https://dash.test/runs/1".into(),
            })
        );

        let error: ObserverMessage =
            serde_json::from_str(r#"{"kind":"error","payload":{"message":"bad key"}}"#).unwrap();
        assert_eq!(error.kind(), "error");
    }

    #[test]
    fn unknown_kind_does_not_parse() {
        let ping = serde_json::from_str::<ObserverMessage>(r#"{"kind":"ping","payload":{}}"#);
        assert!(ping.is_err());
    }

    #[test]
    fn debug_hides_credential() {
        let init = InitAuthorize {
            test_case_id: "t".into(),
            test_case: serde_json::Value::Null,
            api_key: "wp-secret".into(),
        };
        assert!(!format!("{init:?}").contains("wp-secret"));
    }
}

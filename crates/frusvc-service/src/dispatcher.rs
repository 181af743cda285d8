//! [`Dispatcher`] – binds the externally visible verbs to tree operations.
//!
//! # Wire format
//!
//! One JSON object per call:
//!
//! ```json
//! {"id": "<optional uuid>", "call": {"verb": "removeFRU", "args": {"parentPath": "/system", "name": "slot1"}}}
//! ```
//!
//! | Verb | Args | Tree operation |
//! |---|---|---|
//! | `addFRU` | `parentPath`, `description` (string-encoded document) | parse, then attach beneath `parentPath` |
//! | `resetTree` | `path` | remove every child subtree of `path` |
//! | `removeFRU` | `parentPath`, `name` | remove `parentPath/name` and its subtree |
//! | `getObject` | `path` | read-only lookup |
//!
//! The arguments are the only source of the target path; how the call
//! reached the service plays no part in it.
//!
//! Every call produces exactly one [`Response`] carrying the request id (or
//! a fresh one) and either `"status": "ok"` or a fault with `kind` and
//! `message`.

use std::sync::Arc;

use frusvc_description::DescriptionParser;
use frusvc_types::{Fault, FruError, ObjectSnapshot, path};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

use crate::service::FruService;

/// A decoded call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verb", content = "args")]
pub enum Call {
    #[serde(rename = "addFRU", rename_all = "camelCase")]
    AddFru {
        parent_path: String,
        description: String,
    },
    #[serde(rename = "resetTree")]
    ResetTree { path: String },
    #[serde(rename = "removeFRU", rename_all = "camelCase")]
    RemoveFru { parent_path: String, name: String },
    #[serde(rename = "getObject")]
    GetObject { path: String },
}

impl Call {
    /// Wire name of the verb.
    pub fn verb(&self) -> &'static str {
        match self {
            Call::AddFru { .. } => "addFRU",
            Call::ResetTree { .. } => "resetTree",
            Call::RemoveFru { .. } => "removeFRU",
            Call::GetObject { .. } => "getObject",
        }
    }
}

/// Call envelope as received from a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub call: Call,
}

impl Request {
    pub fn new(call: Call) -> Self {
        Self {
            id: Some(Uuid::new_v4()),
            call,
        }
    }
}

/// Outcome of a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Reply {
    /// Acknowledgement; `object` is only present for `getObject`.
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        object: Option<ObjectSnapshot>,
    },
    Fault(Fault),
}

/// Reply envelope sent back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: Uuid,
    #[serde(flatten)]
    pub reply: Reply,
}

impl Response {
    pub fn fault(id: Option<Uuid>, err: &FruError) -> Self {
        Self {
            id: id.unwrap_or_else(Uuid::new_v4),
            reply: Reply::Fault(err.to_fault()),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.reply, Reply::Ok { .. })
    }

    /// Encode as a JSON text frame.
    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            serde_json::json!({
                "id": self.id,
                "status": "fault",
                "kind": "InternalError",
                "message": format!("reply encoding failed: {e}"),
            })
            .to_string()
        })
    }
}

/// Stateless call router. Each call runs to completion before
/// [`Dispatcher::handle`] returns.
pub struct Dispatcher {
    service: Arc<FruService>,
    parser: Arc<dyn DescriptionParser>,
}

impl Dispatcher {
    pub fn new(service: Arc<FruService>, parser: Arc<dyn DescriptionParser>) -> Self {
        Self { service, parser }
    }

    pub fn service(&self) -> &Arc<FruService> {
        &self.service
    }

    /// Execute `call` against the service.
    ///
    /// `addFRU` parses its description before the tree is touched, so a
    /// malformed document never takes the tree lock. A `removeFRU` whose
    /// parent is not a well-formed path, or whose name is not a single path
    /// segment, can never name a child and is reported as not found.
    ///
    /// # Errors
    ///
    /// The [`FruError`] of the failed step; the tree is unchanged.
    pub fn dispatch(&self, call: &Call) -> Result<Option<ObjectSnapshot>, FruError> {
        match call {
            Call::AddFru {
                parent_path,
                description,
            } => {
                let nodes = self.parser.parse(description)?;
                let created = self.service.add_subtree(parent_path, &nodes)?;
                info!(parent = %parent_path, created = created.len(), "FRU added");
                Ok(None)
            }
            Call::ResetTree { path } => {
                let removed = self.service.reset_subtree(path)?;
                info!(path = %path, removed = removed.len(), "tree reset");
                Ok(None)
            }
            Call::RemoveFru { parent_path, name } => {
                let target = path::join(parent_path, name);
                if path::validate_path(parent_path).is_err() || path::validate_name(name).is_err() {
                    return Err(FruError::NotFound(target));
                }
                let removed = self.service.delete_subtree(&target)?;
                info!(path = %target, removed = removed.len(), "FRU removed");
                Ok(None)
            }
            Call::GetObject { path } => self.service.get_object(path).map(Some),
        }
    }

    /// Execute a decoded request and build its response.
    pub fn handle(&self, request: Request) -> Response {
        let id = request.id.unwrap_or_else(Uuid::new_v4);
        let span = info_span!("call", %id, verb = request.call.verb());
        let _entered = span.enter();

        match self.dispatch(&request.call) {
            Ok(object) => Response {
                id,
                reply: Reply::Ok { object },
            },
            Err(err) => {
                if let FruError::Internal(_) = err {
                    error!(error = %err, "call aborted on invariant violation");
                } else {
                    warn!(error = %err, "call failed");
                }
                Response::fault(Some(id), &err)
            }
        }
    }

    /// Decode a JSON text frame, execute it, and encode the response.
    ///
    /// A frame that does not decode into a [`Request`] gets an
    /// `InvalidDescription` fault; its `id` is echoed when it can be read.
    pub fn handle_text(&self, text: &str) -> String {
        let response = match serde_json::from_str::<Value>(text) {
            Ok(value) => {
                let id = value
                    .get("id")
                    .and_then(Value::as_str)
                    .and_then(|s| Uuid::parse_str(s).ok());
                match serde_json::from_value::<Request>(value) {
                    Ok(request) => self.handle(request),
                    Err(e) => undecodable(id, &e.to_string()),
                }
            }
            Err(e) => undecodable(None, &e.to_string()),
        };
        response.to_text()
    }
}

fn undecodable(id: Option<Uuid>, reason: &str) -> Response {
    warn!(reason, "undecodable call");
    Response::fault(
        id,
        &FruError::InvalidDescription(format!("undecodable call: {reason}")),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use frusvc_description::JsonDescriptionParser;
    use frusvc_types::{FaultKind, NodeDescription};

    fn dispatcher() -> Dispatcher {
        let service = Arc::new(FruService::with_roots(["/system"]).unwrap());
        Dispatcher::new(service, Arc::new(JsonDescriptionParser::new()))
    }

    fn add_fru(parent: &str, description: &str) -> Call {
        Call::AddFru {
            parent_path: parent.into(),
            description: description.into(),
        }
    }

    fn remove_fru(parent: &str, name: &str) -> Call {
        Call::RemoveFru {
            parent_path: parent.into(),
            name: name.into(),
        }
    }

    fn fault_kind(result: Result<Option<ObjectSnapshot>, FruError>) -> Option<FaultKind> {
        result.err().map(|e| e.kind())
    }

    const SLOT1: &str = r#"{"name": "slot1", "children": [{"name": "dev0"}, {"name": "dev1"}]}"#;

    #[test]
    fn add_then_remove_slot_scenario() {
        let d = dispatcher();
        let before = d.service().node_count().unwrap();

        d.dispatch(&add_fru("/system", SLOT1)).unwrap();
        assert!(d.service().get_object("/system/slot1/dev0").is_ok());
        assert_eq!(d.service().node_count().unwrap(), before + 3);

        d.dispatch(&remove_fru("/system", "slot1")).unwrap();
        assert!(matches!(
            d.service().get_object("/system/slot1"),
            Err(FruError::NotFound(_))
        ));
        assert!(matches!(
            d.service().get_object("/system/slot1/dev0"),
            Err(FruError::NotFound(_))
        ));
        assert!(d.service().get_object("/system").is_ok());
    }

    #[test]
    fn reset_tree_empties_target_but_keeps_it() {
        let d = dispatcher();
        d.dispatch(&add_fru("/system", r#"[{"name": "a"}, {"name": "b", "children": [{"name": "c"}]}]"#))
            .unwrap();
        d.dispatch(&Call::ResetTree {
            path: "/system".into(),
        })
        .unwrap();

        let root = d.service().get_object("/system").unwrap();
        assert!(root.children.is_empty());
        assert_eq!(d.service().node_count().unwrap(), 1);
    }

    #[test]
    fn second_remove_is_not_found() {
        let d = dispatcher();
        d.dispatch(&add_fru("/system", SLOT1)).unwrap();
        d.dispatch(&remove_fru("/system", "slot1")).unwrap();
        let count = d.service().node_count().unwrap();

        assert_eq!(
            fault_kind(d.dispatch(&remove_fru("/system", "slot1"))),
            Some(FaultKind::NotFound)
        );
        assert_eq!(d.service().node_count().unwrap(), count);
    }

    #[test]
    fn add_to_missing_parent_creates_nothing() {
        let d = dispatcher();
        assert_eq!(
            fault_kind(d.dispatch(&add_fru("/chassis", SLOT1))),
            Some(FaultKind::NotFound)
        );
        assert_eq!(d.service().node_count().unwrap(), 1);
    }

    #[test]
    fn malformed_description_is_rejected_before_lookup() {
        let d = dispatcher();
        // Parent does not exist either; the document is checked first.
        assert_eq!(
            fault_kind(d.dispatch(&add_fru("/chassis", "{not json"))),
            Some(FaultKind::InvalidDescription)
        );
    }

    #[test]
    fn duplicate_add_conflicts() {
        let d = dispatcher();
        d.dispatch(&add_fru("/system", SLOT1)).unwrap();
        assert_eq!(
            fault_kind(d.dispatch(&add_fru("/system", SLOT1))),
            Some(FaultKind::Conflict)
        );
    }

    #[test]
    fn remove_with_nested_name_is_not_found() {
        let d = dispatcher();
        d.dispatch(&add_fru("/system", SLOT1)).unwrap();
        assert_eq!(
            fault_kind(d.dispatch(&remove_fru("/system", "slot1/dev0"))),
            Some(FaultKind::NotFound)
        );
        assert!(d.service().get_object("/system/slot1/dev0").is_ok());
    }

    #[test]
    fn remove_with_empty_parent_is_not_found() {
        let d = dispatcher();
        d.dispatch(&add_fru("/system", SLOT1)).unwrap();
        let count = d.service().node_count().unwrap();

        // "" + "/" + "system" would otherwise name the root itself.
        for parent in ["", "system", "/system/", "//"] {
            assert_eq!(
                fault_kind(d.dispatch(&remove_fru(parent, "system"))),
                Some(FaultKind::NotFound),
                "parent {parent:?}"
            );
        }
        assert_eq!(d.service().root_paths().unwrap(), vec!["/system"]);
        assert_eq!(d.service().node_count().unwrap(), count);
    }

    #[test]
    fn get_object_returns_snapshot() {
        let d = dispatcher();
        d.service()
            .add_subtree(
                "/system",
                &[NodeDescription::leaf("psu0").with_property("vendor", "acme")],
            )
            .unwrap();
        let snap = d
            .dispatch(&Call::GetObject {
                path: "/system/psu0".into(),
            })
            .unwrap()
            .unwrap();
        assert_eq!(snap.path, "/system/psu0");
        assert!(snap.properties.contains_key("vendor"));
    }

    // ── Wire encoding ────────────────────────────────────────────────────────

    #[test]
    fn call_uses_wire_verb_and_arg_names() {
        let json = serde_json::to_value(remove_fru("/system", "slot1")).unwrap();
        assert_eq!(json["verb"], "removeFRU");
        assert_eq!(json["args"]["parentPath"], "/system");
        assert_eq!(json["args"]["name"], "slot1");
    }

    #[test]
    fn handle_text_acknowledges_and_echoes_id() {
        let d = dispatcher();
        let id = Uuid::new_v4();
        let request = Request {
            id: Some(id),
            call: add_fru("/system", SLOT1),
        };
        let raw = d.handle_text(&serde_json::to_string(&request).unwrap());

        let reply: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(reply["status"], "ok");
        assert_eq!(reply["id"], id.to_string());
        assert!(reply.get("object").is_none());
    }

    #[test]
    fn handle_text_reports_fault_kind_and_message() {
        let d = dispatcher();
        let raw = d.handle_text(
            r#"{"call": {"verb": "resetTree", "args": {"path": "/nowhere"}}}"#,
        );
        let response: Response = serde_json::from_str(&raw).unwrap();
        match response.reply {
            Reply::Fault(fault) => {
                assert_eq!(fault.kind, FaultKind::NotFound);
                assert!(fault.message.contains("/nowhere"));
            }
            other => panic!("expected fault, got {other:?}"),
        }
    }

    #[test]
    fn handle_text_get_object_carries_snapshot() {
        let d = dispatcher();
        let raw = d.handle_text(
            r#"{"call": {"verb": "getObject", "args": {"path": "/system"}}}"#,
        );
        let response: Response = serde_json::from_str(&raw).unwrap();
        assert!(response.is_ok());
        match response.reply {
            Reply::Ok { object: Some(snap) } => assert_eq!(snap.path, "/system"),
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[test]
    fn handle_text_rejects_unknown_verb_and_keeps_id() {
        let d = dispatcher();
        let id = Uuid::new_v4();
        let raw = d.handle_text(&format!(
            r#"{{"id": "{id}", "call": {{"verb": "formatDisk", "args": {{}}}}}}"#
        ));
        let reply: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(reply["status"], "fault");
        assert_eq!(reply["kind"], "InvalidDescription");
        assert_eq!(reply["id"], id.to_string());
    }

    #[test]
    fn handle_text_rejects_garbage() {
        let d = dispatcher();
        let reply: Value = serde_json::from_str(&d.handle_text("not json at all")).unwrap();
        assert_eq!(reply["kind"], "InvalidDescription");
    }
}

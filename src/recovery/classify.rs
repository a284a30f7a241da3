//! Scan classifier — infer what a decoded visual code carries.
//!
//! Scanned codes have no type tag, so the role is read off the shape of the
//! decoded text.  Checks run in a fixed order and the first match wins:
//!
//! | Step | Shape | Result |
//! |------|-------|--------|
//! | 1 | not JSON | `TextHint` (verbatim) |
//! | 2 | array of absolute URLs, or exactly `["skip"]` | `TargetList` |
//! | 3 | object with integer `order` and string `base64`/`payload` | `Fragment` |
//! | — | anything else | `UnrecognizedPayload` |
//!
//! An object that has one of the fragment fields but not the other (or has it
//! with the wrong type) fails with `MissingField` rather than falling through.

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

use crate::codec::OrderedFragment;

/// Single-element target list meaning "no targets".
pub const SKIP_SENTINEL: &str = "skip";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("Scan payload missing {0}")]
    MissingField(&'static str),
    #[error("Unrecognized scan payload: {0}")]
    UnrecognizedPayload(&'static str),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    #[error("Invalid target address {address}: {source}")]
    Parse { address: String, source: url::ParseError },
    #[error("Target address {0} has no host")]
    NoHost(String),
}

// ── AuxiliaryTargets ─────────────────────────────────────────────────────────

/// Ordered destination addresses attached to a backup.  Empty means the
/// backup was created with `["skip"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuxiliaryTargets {
    targets: Vec<Url>,
}

impl AuxiliaryTargets {
    pub fn new(targets: Vec<Url>) -> Self {
        Self { targets }
    }

    /// Parse each string as an absolute URL with a host, the same test the
    /// classifier applies when the list is scanned back.
    pub fn parse<I, S>(targets: I) -> Result<Self, TargetError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let targets = targets
            .into_iter()
            .map(|t| {
                let address = t.as_ref();
                let url = Url::parse(address)
                    .map_err(|source| TargetError::Parse { address: address.to_owned(), source })?;
                if url.has_host() {
                    Ok(url)
                } else {
                    Err(TargetError::NoHost(address.to_owned()))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { targets })
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn as_slice(&self) -> &[Url] {
        &self.targets
    }

    /// JSON text carried by the target-list visual code.
    pub fn to_wire(&self) -> String {
        let items: Vec<Value> = if self.targets.is_empty() {
            vec![Value::from(SKIP_SENTINEL)]
        } else {
            self.targets.iter().map(|u| Value::from(u.as_str())).collect()
        };
        Value::Array(items).to_string()
    }
}

// ── ScanItem ─────────────────────────────────────────────────────────────────

/// What one scanned code turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanItem {
    Fragment(OrderedFragment),
    TargetList(AuxiliaryTargets),
    TextHint(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    Fragment,
    TargetList,
    TextHint,
}

impl ScanItem {
    pub fn kind(&self) -> ScanKind {
        match self {
            ScanItem::Fragment(_)   => ScanKind::Fragment,
            ScanItem::TargetList(_) => ScanKind::TargetList,
            ScanItem::TextHint(_)   => ScanKind::TextHint,
        }
    }
}

impl fmt::Display for ScanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScanKind::Fragment   => "fragment",
            ScanKind::TargetList => "target-list",
            ScanKind::TextHint   => "text-hint",
        })
    }
}

// ── Classifier ───────────────────────────────────────────────────────────────

/// Classify one decoded scan.
pub fn classify(decoded: &str) -> Result<ScanItem, ClassifyError> {
    let value: Value = match serde_json::from_str(decoded) {
        Ok(v) => v,
        Err(_) => return Ok(ScanItem::TextHint(decoded.to_owned())),
    };

    match value {
        Value::Array(items) => target_list(&items).map(ScanItem::TargetList),
        Value::Object(obj) => fragment(&obj).map(ScanItem::Fragment),
        _ => Err(ClassifyError::UnrecognizedPayload("neither a list nor an object")),
    }
}

/// Fail unless `hint` would classify back as a [`ScanItem::TextHint`] once
/// printed as its own code.
pub fn check_hint(hint: &str) -> Result<(), ClassifyError> {
    match classify(hint) {
        Ok(ScanItem::TextHint(_)) => Ok(()),
        _ => Err(ClassifyError::UnrecognizedPayload("hint reads as structured data")),
    }
}

fn absolute_address(item: &Value) -> Option<Url> {
    let url = Url::parse(item.as_str()?).ok()?;
    url.has_host().then_some(url)
}

fn target_list(items: &[Value]) -> Result<AuxiliaryTargets, ClassifyError> {
    if let [only] = items {
        if only.as_str() == Some(SKIP_SENTINEL) {
            return Ok(AuxiliaryTargets::default());
        }
    }
    if items.is_empty() {
        return Err(ClassifyError::UnrecognizedPayload("empty list"));
    }
    items
        .iter()
        .map(absolute_address)
        .collect::<Option<Vec<_>>>()
        .map(AuxiliaryTargets::new)
        .ok_or(ClassifyError::UnrecognizedPayload("list entry is not an absolute address"))
}

fn fragment(obj: &Map<String, Value>) -> Result<OrderedFragment, ClassifyError> {
    let has_payload = obj.contains_key("base64") || obj.contains_key("payload");
    if !obj.contains_key("order") && !has_payload {
        return Err(ClassifyError::UnrecognizedPayload("object is not a fragment"));
    }

    let order = obj
        .get("order")
        .and_then(Value::as_u64)
        .filter(|&o| o >= 1)
        .and_then(|o| u32::try_from(o).ok())
        .ok_or(ClassifyError::MissingField("order"))?;

    let payload = ["base64", "payload"]
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_str))
        .ok_or(ClassifyError::MissingField("payload"))?;

    Ok(OrderedFragment::new(order, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_hint() {
        assert_eq!(classify("hello").unwrap(), ScanItem::TextHint("hello".into()));
        assert_eq!(
            classify("my dog's name + year").unwrap(),
            ScanItem::TextHint("my dog's name + year".into())
        );
    }

    #[test]
    fn skip_sentinel_is_an_empty_target_list() {
        assert_eq!(
            classify(r#"["skip"]"#).unwrap(),
            ScanItem::TargetList(AuxiliaryTargets::default())
        );
    }

    #[test]
    fn url_list_is_a_target_list() {
        let item = classify(r#"["https://a.example/hook","http://b.example:8080/x"]"#).unwrap();
        match item {
            ScanItem::TargetList(t) => {
                assert_eq!(t.len(), 2);
                assert_eq!(t.as_slice()[0].host_str(), Some("a.example"));
            }
            other => panic!("expected TargetList, got {other:?}"),
        }
    }

    #[test]
    fn mixed_or_relative_lists_are_unrecognized() {
        for input in [r#"["skip","https://a.example"]"#, r#"["/relative"]"#, r#"["mailto:x@y.z"]"#, "[]", "[1]"] {
            assert!(
                matches!(classify(input), Err(ClassifyError::UnrecognizedPayload(_))),
                "{input} should be unrecognized"
            );
        }
    }

    #[test]
    fn fragment_with_base64_field() {
        assert_eq!(
            classify(r#"{"order":2,"base64":"QQ=="}"#).unwrap(),
            ScanItem::Fragment(OrderedFragment::new(2, "QQ=="))
        );
    }

    #[test]
    fn fragment_with_payload_field() {
        assert_eq!(
            classify(r#"{"payload":"QQ==","order":3}"#).unwrap(),
            ScanItem::Fragment(OrderedFragment::new(3, "QQ=="))
        );
    }

    #[test]
    fn near_fragments_name_the_missing_field() {
        assert_eq!(classify(r#"{"order":2}"#), Err(ClassifyError::MissingField("payload")));
        assert_eq!(classify(r#"{"base64":"QQ=="}"#), Err(ClassifyError::MissingField("order")));
        assert_eq!(classify(r#"{"order":"2","base64":"QQ=="}"#), Err(ClassifyError::MissingField("order")));
        assert_eq!(classify(r#"{"order":0,"base64":"QQ=="}"#), Err(ClassifyError::MissingField("order")));
        assert_eq!(classify(r#"{"order":1.5,"base64":"QQ=="}"#), Err(ClassifyError::MissingField("order")));
        assert_eq!(classify(r#"{"order":1,"base64":7}"#), Err(ClassifyError::MissingField("payload")));
    }

    #[test]
    fn other_json_is_unrecognized() {
        for input in [r#"{"salt":"x"}"#, "42", r#""quoted""#, "null", "true"] {
            assert!(
                matches!(classify(input), Err(ClassifyError::UnrecognizedPayload(_))),
                "{input} should be unrecognized"
            );
        }
    }

    #[test]
    fn fragment_wire_classifies_back() {
        let f = OrderedFragment::new(4, "abcd");
        assert_eq!(classify(&f.to_wire()).unwrap(), ScanItem::Fragment(f));
    }

    #[test]
    fn target_wire_classifies_back() {
        let t = AuxiliaryTargets::parse(["https://x.example/a"]).unwrap();
        assert_eq!(classify(&t.to_wire()).unwrap(), ScanItem::TargetList(t));
        assert_eq!(AuxiliaryTargets::default().to_wire(), r#"["skip"]"#);
    }

    #[test]
    fn parse_rejects_what_classify_would_reject() {
        assert!(matches!(
            AuxiliaryTargets::parse(["mailto:ops@example.com"]),
            Err(TargetError::NoHost(_))
        ));
        assert!(matches!(
            AuxiliaryTargets::parse(["https://ok.example", "not a url"]),
            Err(TargetError::Parse { .. })
        ));
        let t = AuxiliaryTargets::parse(["https://a.example", "ftp://b.example/x"]).unwrap();
        assert_eq!(classify(&t.to_wire()).unwrap(), ScanItem::TargetList(t));
    }

    #[test]
    fn json_looking_hints_are_refused() {
        for hint in ["1234", "true", r#""x""#, "null", r#"["skip"]"#] {
            assert!(check_hint(hint).is_err(), "{hint} should be refused");
        }
        assert!(check_hint("under the stairs").is_ok());
        assert!(check_hint("").is_ok());
    }
}

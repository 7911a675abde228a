use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{DataHubError, Result};

pub const PATH_KIND: &str = "path";
pub const ACL_KIND: &str = "acl";
pub const ROOT_NAME: &str = "ROOT";

const SEP: char = '/';

/// Identity of one segment: a caller-chosen name or an allocated serial.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SegmentId {
    Name(String),
    Serial(u64),
}

impl Display for SegmentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Serial(id) => write!(f, "__{id}__"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Segment {
    kind: String,
    id: SegmentId,
}

impl Segment {
    pub fn named(name: impl Into<String>) -> Result<Self> {
        Self::with_kind(PATH_KIND, name)
    }

    pub fn with_kind(kind: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let kind = kind.into();
        let name = name.into();
        validate_kind(&kind, &name)?;
        validate_name(&name)?;
        Ok(Self {
            kind,
            id: SegmentId::Name(name),
        })
    }

    #[must_use]
    pub fn serial(id: u64) -> Self {
        Self {
            kind: PATH_KIND.to_string(),
            id: SegmentId::Serial(id),
        }
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[must_use]
    pub const fn id(&self) -> &SegmentId {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match &self.id {
            SegmentId::Name(name) => Some(name),
            SegmentId::Serial(_) => None,
        }
    }

    fn parse(raw: &str) -> Result<Self> {
        let malformed = || DataHubError::MalformedPath(format!("bad segment({raw})"));
        let (kind, body) = match raw.strip_suffix(')').and_then(|head| head.split_once('(')) {
            Some((kind, body)) => (kind, body),
            None => (PATH_KIND, raw),
        };
        if body.is_empty() {
            return Err(malformed());
        }
        validate_kind(kind, raw)?;

        if let Some(digits) = body
            .strip_prefix("__")
            .and_then(|rest| rest.strip_suffix("__"))
            && !digits.is_empty()
            && digits.bytes().all(|b| b.is_ascii_digit())
        {
            let id = digits.parse::<u64>().map_err(|_| malformed())?;
            if id == 0 {
                return Err(malformed());
            }
            return Ok(Self {
                kind: kind.to_string(),
                id: SegmentId::Serial(id),
            });
        }

        validate_name(body)?;
        Ok(Self {
            kind: kind.to_string(),
            id: SegmentId::Name(body.to_string()),
        })
    }
}

impl Display for Segment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.kind == PATH_KIND {
            write!(f, "{}", self.id)
        } else {
            write!(f, "{}({})", self.kind, self.id)
        }
    }
}

fn validate_kind(kind: &str, context: &str) -> Result<()> {
    if kind.is_empty() || !kind.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(DataHubError::MalformedPath(format!(
            "bad kind({kind}) in segment({context})"
        )));
    }
    if kind == ACL_KIND {
        return Err(DataHubError::MalformedPath(format!(
            "kind({ACL_KIND}) is reserved: {context}"
        )));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['/', '#', '(', ')']) {
        return Err(DataHubError::MalformedPath(format!("bad name({name})")));
    }
    Ok(())
}

/// Hierarchical address. The empty segment list is ROOT.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    #[must_use]
    pub const fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Parses `/a/b/c`. Surrounding whitespace and at most one leading and
    /// one trailing `/` are ignored; `#` anywhere is rejected.
    pub fn parse(value: &str) -> Result<Self> {
        if value.contains('#') {
            return Err(DataHubError::MalformedPath(format!(
                "path may not contain #: {value}"
            )));
        }
        let trimmed = value.trim();
        let trimmed = trimmed.strip_prefix(SEP).unwrap_or(trimmed);
        let trimmed = trimmed.strip_suffix(SEP).unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Ok(Self::root());
        }

        let segments = trimmed
            .split(SEP)
            .map(Segment::parse)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { segments })
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    #[must_use]
    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// Display form of the last segment; empty for ROOT.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.last().map(ToString::to_string).unwrap_or_default()
    }

    /// Drops the last segment. ROOT is its own parent.
    #[must_use]
    pub fn parent(&self) -> Self {
        let mut segments = self.segments.clone();
        segments.pop();
        Self { segments }
    }

    #[must_use]
    pub fn child(&self, segment: Segment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }

    pub fn join(&self, name: &str) -> Result<Self> {
        Ok(self.child(Segment::parse(name)?))
    }

    /// Strict ancestor test: `self` is a proper prefix of `other`.
    #[must_use]
    pub fn is_parent_of(&self, other: &Self) -> bool {
        self.segments.len() < other.segments.len() && other.segments.starts_with(&self.segments)
    }

    /// This path followed by each ancestor, ending with ROOT.
    #[must_use]
    pub fn lineage(&self) -> Vec<Self> {
        (0..=self.segments.len())
            .rev()
            .map(|len| Self {
                segments: self.segments[..len].to_vec(),
            })
            .collect()
    }

    /// Serial segments and names of the form `__name__` are reserved.
    #[must_use]
    pub fn is_special(&self) -> bool {
        match self.last().map(Segment::id) {
            Some(SegmentId::Serial(_)) => true,
            Some(SegmentId::Name(name)) => {
                name.len() > 4 && name.starts_with("__") && name.ends_with("__")
            }
            None => false,
        }
    }

    #[must_use]
    pub fn is_special_serial(&self) -> bool {
        matches!(self.last().map(Segment::id), Some(SegmentId::Serial(_)))
    }

    /// Search-safe token: the rendered path with its leading `/` replaced by
    /// `ROOT`, form-url-encoded, then with `_ % . - * +` spelled as
    /// `_U _P _D _M _S _L`.
    #[must_use]
    pub fn to_doc_id(&self) -> String {
        let rendered = self.to_string();
        let rooted = format!("{ROOT_NAME}{}", &rendered[SEP.len_utf8()..]);
        let mut out = String::with_capacity(rooted.len() + 8);
        for chunk in url::form_urlencoded::byte_serialize(rooted.as_bytes()) {
            for ch in chunk.chars() {
                match escape_for(ch) {
                    Some(mnemonic) => {
                        out.push('_');
                        out.push(mnemonic);
                    }
                    None => out.push(ch),
                }
            }
        }
        out
    }

    pub fn from_doc_id(doc_id: &str) -> Result<Self> {
        let malformed = || DataHubError::MalformedPath(format!("bad doc id({doc_id})"));
        if doc_id.contains(['&', '=']) {
            return Err(malformed());
        }

        let mut encoded = String::with_capacity(doc_id.len());
        let mut chars = doc_id.chars();
        while let Some(ch) = chars.next() {
            if ch == '_' {
                let mnemonic = chars.next().ok_or_else(malformed)?;
                encoded.push(unescape_for(mnemonic).ok_or_else(malformed)?);
            } else {
                encoded.push(ch);
            }
        }

        let decoded = url::form_urlencoded::parse(encoded.as_bytes())
            .next()
            .map(|(key, _)| key.into_owned())
            .ok_or_else(malformed)?;
        let tail = decoded.strip_prefix(ROOT_NAME).ok_or_else(malformed)?;
        Self::parse(&format!("{SEP}{tail}"))
    }

    #[must_use]
    pub fn to_key(&self) -> Key {
        let mut elements = Vec::with_capacity(self.segments.len() + 1);
        elements.push(KeyElement::root());
        elements.extend(self.segments.iter().map(|segment| KeyElement {
            kind: segment.kind.clone(),
            id: Some(segment.id.clone()),
        }));
        Key { elements }
    }

    pub fn from_key(key: &Key) -> Result<Self> {
        let Some((head, tail)) = key.elements.split_first() else {
            return Err(DataHubError::IncompleteKey("empty key".to_string()));
        };
        if head.id != Some(SegmentId::Name(ROOT_NAME.to_string())) {
            return Err(DataHubError::IncompleteKey(format!(
                "key is not rooted: {}",
                key.describe()
            )));
        }
        let segments = tail
            .iter()
            .map(|element| {
                let id = element
                    .id
                    .clone()
                    .ok_or_else(|| DataHubError::IncompleteKey(key.describe()))?;
                Ok(Segment {
                    kind: element.kind.clone(),
                    id,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { segments })
    }
}

const ESCAPES: [(char, char); 6] = [
    ('_', 'U'),
    ('%', 'P'),
    ('.', 'D'),
    ('-', 'M'),
    ('*', 'S'),
    ('+', 'L'),
];

fn escape_for(ch: char) -> Option<char> {
    ESCAPES
        .iter()
        .find(|(raw, _)| *raw == ch)
        .map(|(_, mnemonic)| *mnemonic)
}

fn unescape_for(mnemonic: char) -> Option<char> {
    ESCAPES
        .iter()
        .find(|(_, m)| *m == mnemonic)
        .map(|(raw, _)| *raw)
}

/// Doc-ids of `path` and every ancestor up to ROOT, space separated.
#[must_use]
pub fn ancestor_tokens(path: &Path) -> String {
    path.lineage()
        .iter()
        .map(Path::to_doc_id)
        .collect::<Vec<_>>()
        .join(" ")
}

impl Display for Path {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "{SEP}{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = DataHubError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyElement {
    pub kind: String,
    pub id: Option<SegmentId>,
}

impl KeyElement {
    fn root() -> Self {
        Self {
            kind: PATH_KIND.to_string(),
            id: Some(SegmentId::Name(ROOT_NAME.to_string())),
        }
    }
}

/// Storage identity: a chain of (kind, id) elements rooted at `path(ROOT)`.
/// The last element may lack an id until the store allocates a serial.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    elements: Vec<KeyElement>,
}

impl Key {
    #[must_use]
    pub fn root() -> Self {
        Self {
            elements: vec![KeyElement::root()],
        }
    }

    #[must_use]
    pub fn elements(&self) -> &[KeyElement] {
        &self.elements
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        self.elements.last().map_or(PATH_KIND, |e| e.kind.as_str())
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.elements.iter().all(|element| element.id.is_some())
    }

    /// A child whose id is left for the store to allocate.
    #[must_use]
    pub fn incomplete_child(&self) -> Self {
        let mut elements = self.elements.clone();
        elements.push(KeyElement {
            kind: PATH_KIND.to_string(),
            id: None,
        });
        Self { elements }
    }

    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.elements.len() <= 1 {
            return None;
        }
        let mut elements = self.elements.clone();
        elements.pop();
        Some(Self { elements })
    }

    /// Same position in the tree under a different kind. ACL records live at
    /// `with_kind(ACL_KIND)` of the governed key.
    #[must_use]
    pub fn with_kind(&self, kind: &str) -> Self {
        let mut elements = self.elements.clone();
        if let Some(last) = elements.last_mut() {
            last.kind = kind.to_string();
        }
        Self { elements }
    }

    #[must_use]
    pub fn with_serial(&self, id: u64) -> Self {
        let mut elements = self.elements.clone();
        if let Some(last) = elements.last_mut() {
            last.id = Some(SegmentId::Serial(id));
        }
        Self { elements }
    }

    /// Stable text form `kind(name)/kind(#serial)/...` used as the storage key.
    pub fn encode(&self) -> Result<String> {
        if !self.is_complete() {
            return Err(DataHubError::IncompleteKey(self.describe()));
        }
        Ok(self.describe())
    }

    pub fn decode(raw: &str) -> Result<Self> {
        let malformed = || DataHubError::MalformedPath(format!("bad key({raw})"));
        let elements = raw
            .split(SEP)
            .map(|part| {
                let (kind, body) = part
                    .strip_suffix(')')
                    .and_then(|head| head.split_once('('))
                    .ok_or_else(malformed)?;
                let id = match body.strip_prefix('#') {
                    Some(digits) => SegmentId::Serial(digits.parse().map_err(|_| malformed())?),
                    None => SegmentId::Name(body.to_string()),
                };
                Ok(KeyElement {
                    kind: kind.to_string(),
                    id: Some(id),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if elements.is_empty() {
            return Err(malformed());
        }
        Ok(Self { elements })
    }

    fn describe(&self) -> String {
        self.elements
            .iter()
            .map(|element| match &element.id {
                Some(SegmentId::Name(name)) => format!("{}({name})", element.kind),
                Some(SegmentId::Serial(id)) => format!("{}(#{id})", element.kind),
                None => format!("{}(?)", element.kind),
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn normalize(raw: &str) -> String {
        let trimmed = raw.trim();
        let trimmed = trimmed.strip_prefix('/').unwrap_or(trimmed);
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
        format!("/{trimmed}")
    }

    #[test]
    fn parse_root_forms() {
        for raw in ["", "/", " / ", "//"] {
            let path = Path::parse(raw).expect("parse root");
            assert!(path.is_root(), "{raw:?}");
            assert_eq!(path.to_string(), "/");
        }
    }

    #[test]
    fn parse_strips_single_slashes_and_renders() {
        let path = Path::parse("/foo/bar/").expect("parse");
        assert_eq!(path.len(), 2);
        assert_eq!(path.to_string(), "/foo/bar");
        assert_eq!(Path::parse("foo/bar").expect("parse"), path);
    }

    #[test]
    fn parse_rejects_hash_and_empty_segments() {
        let err = Path::parse("/a#b").expect_err("must fail");
        assert!(matches!(err, DataHubError::MalformedPath(_)));
        let err = Path::parse("/a//b").expect_err("must fail");
        assert!(matches!(err, DataHubError::MalformedPath(_)));
    }

    #[test]
    fn parse_serial_and_kind_segments() {
        let path = Path::parse("/__12__/doc(readme)").expect("parse");
        assert_eq!(path.segments()[0].id(), &SegmentId::Serial(12));
        assert_eq!(path.segments()[1].kind(), "doc");
        assert_eq!(path.segments()[1].name(), Some("readme"));
        assert_eq!(path.to_string(), "/__12__/doc(readme)");
        assert!(path.parent().is_special_serial());
        assert_eq!(Path::parse("/path(x)").expect("parse"), Path::parse("/x").expect("parse"));
    }

    #[test]
    fn parse_rejects_zero_serial_reserved_kind_and_stray_parens() {
        for raw in ["/__0__", "/acl(x)", "/a(b", "/a)b", "/(x)", "/k()"] {
            let err = Path::parse(raw).expect_err("must fail");
            assert!(matches!(err, DataHubError::MalformedPath(_)), "{raw}");
        }
    }

    #[test]
    fn special_names() {
        assert!(Path::parse("/a/__acl__").expect("parse").is_special());
        assert!(Path::parse("/a/__7__").expect("parse").is_special());
        assert!(!Path::parse("/a/__").expect("parse").is_special());
        assert!(!Path::parse("/a/b").expect("parse").is_special());
    }

    #[test]
    fn parent_of_root_is_root() {
        assert_eq!(Path::root().parent(), Path::root());
        let path = Path::parse("/a/b").expect("parse");
        assert_eq!(path.parent().parent(), Path::root());
        assert_eq!(path.parent().parent().parent(), Path::root());
    }

    #[test]
    fn is_parent_of_is_strict_prefix() {
        let a = Path::parse("/a").expect("parse");
        let ab = Path::parse("/a/b").expect("parse");
        let ax = Path::parse("/ax/b").expect("parse");
        assert!(Path::root().is_parent_of(&a));
        assert!(a.is_parent_of(&ab));
        assert!(!a.is_parent_of(&a));
        assert!(!ab.is_parent_of(&a));
        assert!(!a.is_parent_of(&ax));
        assert!(!Path::root().is_parent_of(&Path::root()));
    }

    #[test]
    fn lineage_is_closest_first_and_ends_at_root() {
        let lineage = Path::parse("/a/b").expect("parse").lineage();
        let rendered = lineage.iter().map(ToString::to_string).collect::<Vec<_>>();
        assert_eq!(rendered, vec!["/a/b", "/a", "/"]);
    }

    #[test]
    fn doc_id_table() {
        let cases = [
            ("/", "ROOT"),
            ("/foo", "ROOTfoo"),
            ("/foo/bar", "ROOTfoo_P2Fbar"),
            ("/foo/bar/", "ROOTfoo_P2Fbar"),
            ("/_", "ROOT_U"),
            ("_", "ROOT_U"),
            ("_/", "ROOT_U"),
            ("/a/_foo", "ROOTa_P2F_Ufoo"),
            ("/a_/foo", "ROOTa_U_P2Ffoo"),
            ("/_U/U__U_P__D/", "ROOT_UU_P2FU_U_UU_UP_U_UD"),
        ];
        for (raw, expected) in cases {
            let path = Path::parse(raw).expect("parse");
            let doc_id = path.to_doc_id();
            assert_eq!(doc_id, expected, "{raw}");
            let back = Path::from_doc_id(&doc_id).expect("decode");
            assert_eq!(back.to_string(), normalize(raw), "{raw}");
        }
    }

    #[test]
    fn doc_id_escapes_punctuation_and_spaces() {
        let path = Path::parse("/a b/c.d-e*f+g%h").expect("parse");
        let doc_id = path.to_doc_id();
        assert!(doc_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
        assert_eq!(Path::from_doc_id(&doc_id).expect("decode"), path);
    }

    #[test]
    fn trailing_slash_shares_doc_id() {
        let with_slash = Path::parse("/foo/bar/").expect("parse").to_doc_id();
        let without = Path::parse("/foo/bar").expect("parse").to_doc_id();
        assert_eq!(with_slash, without);
        assert_eq!(
            Path::from_doc_id(&with_slash).expect("decode").to_string(),
            "/foo/bar"
        );
    }

    #[test]
    fn from_doc_id_rejects_garbage() {
        for raw in ["", "foo", "ROOT_X", "ROOTa_", "ROOT&x", "ROOT=x"] {
            let err = Path::from_doc_id(raw).expect_err("must fail");
            assert!(matches!(err, DataHubError::MalformedPath(_)), "{raw}");
        }
    }

    #[test]
    fn ancestor_tokens_include_root() {
        assert_eq!(ancestor_tokens(&Path::root()), "ROOT");
        assert_eq!(
            ancestor_tokens(&Path::parse("/a").expect("parse")),
            "ROOTa ROOT"
        );
        assert_eq!(
            ancestor_tokens(&Path::parse("/a/b").expect("parse")),
            "ROOTa_P2Fb ROOTa ROOT"
        );
    }

    #[test]
    fn key_round_trip_and_encoding() {
        let path = Path::parse("/a/__3__/doc(x)").expect("parse");
        let key = path.to_key();
        assert!(key.is_complete());
        assert_eq!(
            key.encode().expect("encode"),
            "path(ROOT)/path(a)/path(#3)/doc(x)"
        );
        let decoded = Key::decode(&key.encode().expect("encode")).expect("decode");
        assert_eq!(decoded, key);
        assert_eq!(Path::from_key(&decoded).expect("from key"), path);
        assert_eq!(Path::from_key(&Key::root()).expect("root"), Path::root());
    }

    #[test]
    fn incomplete_key_cannot_encode_or_convert() {
        let key = Path::parse("/a").expect("parse").to_key().incomplete_child();
        assert!(!key.is_complete());
        let err = key.encode().expect_err("must fail");
        assert!(matches!(err, DataHubError::IncompleteKey(_)));
        let err = Path::from_key(&key).expect_err("must fail");
        assert!(matches!(err, DataHubError::IncompleteKey(_)));
        let completed = key.with_serial(9);
        assert_eq!(
            Path::from_key(&completed).expect("complete").to_string(),
            "/a/__9__"
        );
    }

    #[test]
    fn acl_key_shares_position_with_resource() {
        let key = Path::parse("/a/b").expect("parse").to_key();
        let acl = key.with_kind(ACL_KIND);
        assert_eq!(acl.kind(), ACL_KIND);
        assert_eq!(acl.parent(), key.parent());
        assert_eq!(Key::root().with_kind(ACL_KIND).encode().expect("encode"), "acl(ROOT)");
    }

    #[test]
    fn serde_uses_string_form() {
        let path = Path::parse("/a/__2__").expect("parse");
        let json = serde_json::to_string(&path).expect("serialize");
        assert_eq!(json, "\"/a/__2__\"");
        let back: Path = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, path);
    }

    fn segment_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-zA-Z0-9_.*+%~é-]{1,8}",
            (1_u64..10_000).prop_map(|id| format!("__{id}__")),
            ("[a-z]{1,4}", "[a-zA-Z0-9_.]{1,6}").prop_map(|(kind, name)| format!("{kind}({name})")),
        ]
    }

    proptest! {
        #[test]
        fn doc_id_round_trip(
            segments in prop::collection::vec(segment_strategy(), 0..5),
            leading in any::<bool>(),
            trailing in any::<bool>(),
        ) {
            let mut raw = segments.join("/");
            if leading {
                raw.insert(0, '/');
            }
            if trailing {
                raw.push('/');
            }
            let parsed = Path::parse(&raw);
            prop_assume!(parsed.is_ok());
            let path = parsed.expect("checked above");
            let doc_id = path.to_doc_id();
            prop_assert!(doc_id.chars().all(|c| c.is_alphanumeric() || c == '_'));
            let back = Path::from_doc_id(&doc_id).expect("decode");
            prop_assert_eq!(back.to_string(), path.to_string());
            prop_assert_eq!(back, path);
        }
    }
}

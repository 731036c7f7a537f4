//! Decoder for Android binary XML documents (`AndroidManifest.xml` and
//! compiled layout resources).
//!
//! The chunk stream is materialized as a flat element list in document
//! order plus serialized text; attribute values that reference the
//! resource table can be resolved against it during decoding.

use log::debug;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;

use crate::arsc::error::{DecodeError, DecodeResult};
use crate::arsc::string_pool::StringPool;
use crate::arsc::table::ResourceTable;
use crate::arsc::value::{TypedValue, TYPE_REFERENCE, TYPE_STRING};
use crate::arsc::{
    chunk_name, BinReader, ChunkHeader, RES_STRING_POOL_TYPE, RES_XML_CDATA_TYPE,
    RES_XML_END_ELEMENT_TYPE, RES_XML_END_NAMESPACE_TYPE, RES_XML_RESOURCE_MAP_TYPE,
    RES_XML_START_ELEMENT_TYPE, RES_XML_START_NAMESPACE_TYPE, RES_XML_TYPE,
};

/// A single attribute with its fully rendered textual value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XmlAttribute {
    pub namespace_prefix: Option<String>,
    pub name: String,
    pub value: String,
}

/// One element of the decoded document, in document order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XmlElement {
    pub line: u32,
    pub comment: Option<String>,
    pub namespace_prefix: Option<String>,
    pub name: String,
    pub attributes: Vec<XmlAttribute>,
    pub is_root: bool,
}

impl XmlElement {
    /// Look up an attribute value by `name` or `prefix:name`.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        let (prefix, local) = match name.split_once(':') {
            Some((prefix, local)) => (Some(prefix), local),
            None => (None, name),
        };
        self.attributes
            .iter()
            .find(|attr| attr.name == local && attr.namespace_prefix.as_deref() == prefix)
            .map(|attr| attr.value.as_str())
    }

    fn qualified_name(&self) -> String {
        qualified(self.namespace_prefix.as_deref(), &self.name)
    }
}

#[derive(Debug)]
enum XmlNode {
    Start(usize),
    End { prefix: Option<String>, name: String },
    CData(String),
}

/// A decoded binary XML document: serialized text, the element list in
/// document order, and the ids from the resource map chunk (if any).
pub struct XmlDocument {
    pub text: String,
    pub elements: Vec<XmlElement>,
    pub resource_map: Vec<u32>,
    nodes: Vec<XmlNode>,
    namespace_decls: Vec<(String, String)>,
}

impl XmlDocument {
    /// The document's root element.
    pub fn root(&self) -> Option<&XmlElement> {
        self.elements.first()
    }

    /// Re-serialize the decoded document in either textual form.
    pub fn to_text(&self, pretty: bool) -> DecodeResult<String> {
        if pretty {
            Ok(serialize_pretty(
                &self.elements,
                &self.nodes,
                &self.namespace_decls,
            ))
        } else {
            serialize_compact(&self.elements, &self.nodes, &self.namespace_decls)
        }
    }
}

#[derive(Clone, Debug)]
struct NamespaceFrame {
    prefix: Option<String>,
    uri: Option<String>,
}

/// Decoder for one binary XML chunk stream.
///
/// A decoder borrows the resource table for the duration of a call, so
/// concurrent decodings against the same table are safe as long as each
/// has its own decoder.
pub struct XmlDecoder<'a> {
    table: Option<&'a ResourceTable>,
    resolve_references: bool,
}

impl Default for XmlDecoder<'_> {
    fn default() -> Self {
        XmlDecoder::new()
    }
}

impl<'a> XmlDecoder<'a> {
    /// A decoder with no resource table; references render as raw ids.
    pub fn new() -> Self {
        XmlDecoder {
            table: None,
            resolve_references: false,
        }
    }

    /// A decoder that renders references through `table`.
    pub fn with_table(table: &'a ResourceTable) -> Self {
        XmlDecoder {
            table: Some(table),
            resolve_references: false,
        }
    }

    /// When enabled, a reference whose default table entry exists renders
    /// as that entry's value instead of its `@type/key` form.
    pub fn resolve_references(mut self, enabled: bool) -> Self {
        self.resolve_references = enabled;
        self
    }

    /// Decode a complete binary XML buffer into an [`XmlDocument`],
    /// serializing its text in the requested form.
    pub fn decode(&self, data: &[u8], pretty: bool) -> DecodeResult<XmlDocument> {
        let reader = BinReader::new(data);
        let file_header = ChunkHeader::parse(&reader, 0)?;
        if file_header.chunk_type != RES_XML_TYPE {
            return Err(DecodeError::UnexpectedChunk {
                expected: RES_XML_TYPE,
                found: file_header.chunk_type,
            });
        }

        let mut pool: Option<StringPool> = None;
        let mut resource_map: Vec<u32> = Vec::new();
        let mut namespaces: Vec<NamespaceFrame> = Vec::new();
        let mut namespace_decls: Vec<(String, String)> = Vec::new();
        let mut elements: Vec<XmlElement> = Vec::new();
        let mut nodes: Vec<XmlNode> = Vec::new();
        let mut open: Vec<usize> = Vec::new();
        let mut seen_root = false;

        let mut cursor = file_header.body();
        while cursor < file_header.end() {
            let chunk = ChunkHeader::parse(&reader, cursor)?;
            match chunk.chunk_type {
                RES_STRING_POOL_TYPE => {
                    pool = Some(StringPool::parse(&reader, &chunk)?);
                }
                RES_XML_RESOURCE_MAP_TYPE => {
                    let count = (chunk.chunk_size as usize - chunk.header_size as usize) / 4;
                    let base = chunk.body();
                    resource_map = (0..count).map(|i| reader.u32_le(base + 4 * i)).collect();
                }
                RES_XML_START_NAMESPACE_TYPE => {
                    let pool = require_pool(&pool)?;
                    let body = chunk.body();
                    let prefix = pool.get(reader.u32_le(body)).map(str::to_string);
                    let uri = pool.get(reader.u32_le(body + 4)).map(str::to_string);
                    if !seen_root {
                        if let (Some(prefix), Some(uri)) = (&prefix, &uri) {
                            namespace_decls.push((prefix.clone(), uri.clone()));
                        }
                    }
                    namespaces.push(NamespaceFrame { prefix, uri });
                }
                RES_XML_END_NAMESPACE_TYPE => {
                    if namespaces.pop().is_none() {
                        return Err(DecodeError::Malformed(
                            "namespace end without matching start".to_string(),
                        ));
                    }
                }
                RES_XML_START_ELEMENT_TYPE => {
                    let pool = require_pool(&pool)?;
                    let element =
                        self.parse_element(&reader, &chunk, pool, &namespaces, !seen_root)?;
                    seen_root = true;
                    let idx = elements.len();
                    elements.push(element);
                    open.push(idx);
                    nodes.push(XmlNode::Start(idx));
                }
                RES_XML_END_ELEMENT_TYPE => {
                    let pool = require_pool(&pool)?;
                    let name_idx = reader.u32_le(chunk.body() + 4);
                    let name = pool.get(name_idx).unwrap_or_default().to_string();
                    let idx = open.pop().ok_or_else(|| {
                        DecodeError::Malformed(format!(
                            "end element </{name}> without matching start"
                        ))
                    })?;
                    if elements[idx].name != name {
                        return Err(DecodeError::Malformed(format!(
                            "mismatched end element </{name}>, expected </{}>",
                            elements[idx].name
                        )));
                    }
                    nodes.push(XmlNode::End {
                        prefix: elements[idx].namespace_prefix.clone(),
                        name,
                    });
                }
                RES_XML_CDATA_TYPE => {
                    let pool = require_pool(&pool)?;
                    let body = chunk.body();
                    let data_idx = reader.u32_le(body);
                    let data_type = reader.u8(body + 7);
                    let data = reader.u32_le(body + 8);
                    let text = pool.get(data_idx).map(str::to_string).or_else(|| {
                        if data_type == TYPE_STRING {
                            pool.get(data).map(str::to_string)
                        } else {
                            None
                        }
                    });
                    if let Some(text) = text {
                        nodes.push(XmlNode::CData(text));
                    }
                }
                other => {
                    debug!(
                        "skipping {} chunk (0x{other:04x}) in XML stream",
                        chunk_name(other)
                    );
                }
            }
            cursor = chunk.end();
        }

        if !open.is_empty() {
            return Err(DecodeError::Malformed(
                "unclosed elements at end of document".to_string(),
            ));
        }

        let text = if pretty {
            serialize_pretty(&elements, &nodes, &namespace_decls)
        } else {
            serialize_compact(&elements, &nodes, &namespace_decls)?
        };

        Ok(XmlDocument {
            text,
            elements,
            resource_map,
            nodes,
            namespace_decls,
        })
    }

    fn parse_element(
        &self,
        reader: &BinReader<'_>,
        chunk: &ChunkHeader,
        pool: &StringPool,
        namespaces: &[NamespaceFrame],
        is_root: bool,
    ) -> DecodeResult<XmlElement> {
        let at = chunk.start;
        let line = reader.u32_le(at + 8);
        let comment = pool.get(reader.u32_le(at + 12)).map(str::to_string);

        let body = chunk.body();
        let ns_idx = reader.u32_le(body);
        let name_idx = reader.u32_le(body + 4);
        let attr_start = reader.u16_le(body + 8) as usize;
        let attr_size = reader.u16_le(body + 10) as usize;
        let attr_count = reader.u16_le(body + 12) as usize;
        // id/class/style attribute indices at +14/+16/+18 are not consulted

        let name = pool
            .get(name_idx)
            .ok_or_else(|| {
                DecodeError::Malformed(
                    "element name references an invalid string index".to_string(),
                )
            })?
            .to_string();
        let namespace_prefix = resolve_prefix(namespaces, pool.get(ns_idx));

        if attr_count > 0 && (attr_size < 20 || body + attr_start + attr_count * attr_size > chunk.end())
        {
            return Err(DecodeError::Malformed(format!(
                "attribute records of element <{name}> exceed chunk bounds"
            )));
        }

        let mut attributes = Vec::with_capacity(attr_count);
        for i in 0..attr_count {
            let a = body + attr_start + i * attr_size;
            let attr_ns_idx = reader.u32_le(a);
            let attr_name_idx = reader.u32_le(a + 4);
            let raw_value_idx = reader.u32_le(a + 8);
            let data_type = reader.u8(a + 15);
            let data = reader.u32_le(a + 16);

            let attr_name = pool
                .get(attr_name_idx)
                .ok_or_else(|| {
                    DecodeError::Malformed(format!(
                        "attribute of element <{name}> references an invalid string index"
                    ))
                })?
                .to_string();
            let attr_prefix = resolve_prefix(namespaces, pool.get(attr_ns_idx));
            let value = self.attribute_value(pool, raw_value_idx, data_type, data);
            attributes.push(XmlAttribute {
                namespace_prefix: attr_prefix,
                name: attr_name,
                value,
            });
        }

        Ok(XmlElement {
            line,
            comment,
            namespace_prefix,
            name,
            attributes,
            is_root,
        })
    }

    /// The textual value of an attribute: its raw string when interned,
    /// otherwise a reference resolved through the resource table, otherwise
    /// the typed constant rendered the same way table entries are.
    fn attribute_value(
        &self,
        pool: &StringPool,
        raw_value_idx: u32,
        data_type: u8,
        data: u32,
    ) -> String {
        if let Some(raw) = pool.get(raw_value_idx) {
            return raw.to_string();
        }
        if data_type == TYPE_REFERENCE {
            if let Some(table) = self.table {
                if self.resolve_references {
                    if let Some(entry) = table.default_value(data) {
                        return entry.value.render(table.strings()).unwrap_or_default();
                    }
                }
                if let Some(key) = table.key_for(data, true) {
                    return key;
                }
            }
            return format!("res:0x{data:x}");
        }
        match TypedValue::decode(data_type, data) {
            TypedValue::Opaque(_, raw) => format!("0x{raw:x}"),
            value => value.render(pool).unwrap_or_default(),
        }
    }
}

fn require_pool<'p>(pool: &'p Option<StringPool>) -> DecodeResult<&'p StringPool> {
    pool.as_ref().ok_or_else(|| {
        DecodeError::Malformed("chunk encountered before the string pool".to_string())
    })
}

fn resolve_prefix(namespaces: &[NamespaceFrame], uri: Option<&str>) -> Option<String> {
    uri.and_then(|target| {
        namespaces
            .iter()
            .rev()
            .find(|frame| frame.uri.as_deref() == Some(target))
            .and_then(|frame| frame.prefix.clone())
    })
}

fn qualified(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}:{local}"),
        None => local.to_string(),
    }
}

fn element_attributes(
    element: &XmlElement,
    namespace_decls: &[(String, String)],
) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    if element.is_root {
        for (prefix, uri) in namespace_decls {
            attrs.push((format!("xmlns:{prefix}"), uri.clone()));
        }
    }
    for attr in &element.attributes {
        attrs.push((
            qualified(attr.namespace_prefix.as_deref(), &attr.name),
            attr.value.clone(),
        ));
    }
    attrs
}

fn serialize_compact(
    elements: &[XmlElement],
    nodes: &[XmlNode],
    namespace_decls: &[(String, String)],
) -> DecodeResult<String> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    for node in nodes {
        match node {
            XmlNode::Start(idx) => {
                let element = &elements[*idx];
                let name = element.qualified_name();
                let attrs = element_attributes(element, namespace_decls);
                let mut start = BytesStart::new(name.as_str());
                for (key, value) in &attrs {
                    start.push_attribute((key.as_str(), value.as_str()));
                }
                writer.write_event(Event::Start(start))?;
            }
            XmlNode::End { prefix, name } => {
                let name = qualified(prefix.as_deref(), name);
                writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
            }
            XmlNode::CData(text) => {
                writer.write_event(Event::CData(BytesCData::new(text.as_str())))?;
            }
        }
    }
    String::from_utf8(writer.into_inner()).map_err(|err| DecodeError::Xml(err.to_string()))
}

/// Pretty serialization: element starts on their own line at `depth*2`
/// spaces, one attribute per line two spaces deeper, end tags at the start
/// indent, CDATA one section per non-empty line of the decoded text.
fn serialize_pretty(
    elements: &[XmlElement],
    nodes: &[XmlNode],
    namespace_decls: &[(String, String)],
) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>");
    let mut depth = 0usize;
    for node in nodes {
        match node {
            XmlNode::Start(idx) => {
                let element = &elements[*idx];
                out.push('\n');
                out.push_str(&"  ".repeat(depth));
                out.push('<');
                out.push_str(&element.qualified_name());
                let attrs = element_attributes(element, namespace_decls);
                if attrs.is_empty() {
                    out.push('>');
                } else {
                    let indent = "  ".repeat(depth + 1);
                    for (key, value) in &attrs {
                        out.push('\n');
                        out.push_str(&indent);
                        out.push_str(key);
                        out.push_str("=\"");
                        out.push_str(&escape_xml(value));
                        out.push('"');
                    }
                    out.push('>');
                }
                depth += 1;
            }
            XmlNode::End { prefix, name } => {
                depth = depth.saturating_sub(1);
                out.push('\n');
                out.push_str(&"  ".repeat(depth));
                out.push_str("</");
                out.push_str(&qualified(prefix.as_deref(), name));
                out.push('>');
            }
            XmlNode::CData(text) => {
                let indent = "  ".repeat(depth);
                for line in text.lines() {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    out.push('\n');
                    out.push_str(&indent);
                    out.push_str("<![CDATA[");
                    out.push_str(line);
                    out.push_str("]]>");
                }
            }
        }
    }
    out
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_names() {
        assert_eq!(qualified(Some("android"), "name"), "android:name");
        assert_eq!(qualified(None, "manifest"), "manifest");
    }

    #[test]
    fn innermost_namespace_wins() {
        let namespaces = vec![
            NamespaceFrame {
                prefix: Some("a".to_string()),
                uri: Some("urn:x".to_string()),
            },
            NamespaceFrame {
                prefix: Some("b".to_string()),
                uri: Some("urn:x".to_string()),
            },
        ];
        assert_eq!(
            resolve_prefix(&namespaces, Some("urn:x")),
            Some("b".to_string())
        );
        assert_eq!(resolve_prefix(&namespaces, Some("urn:y")), None);
        assert_eq!(resolve_prefix(&namespaces, None), None);
    }

    #[test]
    fn escapes_xml_entities() {
        assert_eq!(
            escape_xml("a & <b> \"c\""),
            "a &amp; &lt;b&gt; &quot;c&quot;"
        );
    }
}

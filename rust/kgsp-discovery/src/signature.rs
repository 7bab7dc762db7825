// kgsp-discovery: Datatype inference and durable signatures
// Promotion materializes a cache-aligned record; adaptation replaces
// the whole record atomically

use kgsp_rdf::{StringRef, Vocab};

/// XSD datatypes the discovery engine infers from literal forms.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum XsdType {
    #[default]
    String = 0,
    Integer = 1,
    Decimal = 2,
    Boolean = 3,
    DateTime = 4,
}

impl XsdType {
    /// Infer a datatype from a literal's lexical form.
    pub fn infer(bytes: &[u8]) -> Self {
        let Ok(text) = std::str::from_utf8(bytes) else {
            return XsdType::String;
        };
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return XsdType::String;
        }
        if is_integer(trimmed) {
            return XsdType::Integer;
        }
        if is_decimal(trimmed) {
            return XsdType::Decimal;
        }
        if trimmed == "true" || trimmed == "false" {
            return XsdType::Boolean;
        }
        if trimmed.contains('T') && trimmed.contains(':') {
            return XsdType::DateTime;
        }
        XsdType::String
    }

    /// The interned XSD datatype IRI for this type.
    pub fn vocab_ref(self, vocab: &Vocab) -> StringRef {
        match self {
            XsdType::String => vocab.xsd_string,
            XsdType::Integer => vocab.xsd_integer,
            XsdType::Decimal => vocab.xsd_decimal,
            XsdType::Boolean => vocab.xsd_boolean,
            XsdType::DateTime => vocab.xsd_date_time,
        }
    }
}

fn is_integer(text: &str) -> bool {
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn is_decimal(text: &str) -> bool {
    text.contains('.') && text.parse::<f64>().is_ok()
}

/// Maximum fields per signature.
pub const MAX_FIELDS: usize = 16;

/// One typed field of a durable signature.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub predicate: StringRef,
    pub is_input: bool,
    pub datatype: XsdType,
}

impl Default for Field {
    fn default() -> Self {
        Self {
            predicate: StringRef::NULL,
            is_input: false,
            datatype: XsdType::String,
        }
    }
}

/// A promoted input/output schema, cache-aligned for hot lookups.
/// Never mutated in place; adaptation swaps the whole record.
#[repr(C, align(64))]
#[derive(Debug, Clone, Copy)]
pub struct DurableSignature {
    pub id: u64,
    pub owl_class_hash: u32,
    pub field_count: u32,
    pub fields: [Field; MAX_FIELDS],
    /// The SHACL shape backing this signature.
    pub shape: StringRef,
    pub field_hashes: [u32; MAX_FIELDS],
}

impl DurableSignature {
    pub fn new(id: u64, owl_class_hash: u32, shape: StringRef, fields: &[Field]) -> Self {
        let mut stored = [Field::default(); MAX_FIELDS];
        let mut hashes = [0u32; MAX_FIELDS];
        let count = fields.len().min(MAX_FIELDS);
        for (i, field) in fields.iter().take(count).enumerate() {
            stored[i] = *field;
            hashes[i] = field.predicate.hash;
        }
        Self {
            id,
            owl_class_hash,
            field_count: count as u32,
            fields: stored,
            shape,
            field_hashes: hashes,
        }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields[..self.field_count as usize]
    }

    pub fn input_count(&self) -> usize {
        self.fields().iter().filter(|f| f.is_input).count()
    }

    pub fn output_count(&self) -> usize {
        self.fields().iter().filter(|f| !f.is_input).count()
    }
}

/// Registry of promoted signatures.
#[derive(Debug, Default)]
pub struct SignatureStore {
    signatures: Vec<DurableSignature>,
    next_id: u64,
}

impl SignatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn insert(&mut self, signature: DurableSignature) {
        self.signatures.push(signature);
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&DurableSignature> {
        self.signatures.iter().find(|s| s.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DurableSignature> {
        self.signatures.iter()
    }

    /// Replace a signature wholesale. The record swap is the only
    /// mutation durable signatures support.
    pub fn replace(&mut self, signature: DurableSignature) -> bool {
        match self.signatures.iter_mut().find(|s| s.id == signature.id) {
            Some(slot) => {
                *slot = signature;
                true
            }
            None => false,
        }
    }
}

// kgsp-rdf: Well-known vocabulary terms
// Interned once at engine startup; everything downstream compares hashes

use crate::intern::{InternError, Interner, StringRef};

pub const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDFS_NS: &str = "http://www.w3.org/2000/01/rdf-schema#";
pub const OWL_NS: &str = "http://www.w3.org/2002/07/owl#";
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema#";

/// The RDF/RDFS/XSD terms the pipeline special-cases.
#[derive(Debug, Clone, Copy)]
pub struct Vocab {
    pub rdf_type: StringRef,
    pub rdfs_label: StringRef,
    pub rdfs_sub_class_of: StringRef,
    pub rdfs_sub_property_of: StringRef,
    pub rdfs_domain: StringRef,
    pub rdfs_range: StringRef,
    pub xsd_string: StringRef,
    pub xsd_integer: StringRef,
    pub xsd_decimal: StringRef,
    pub xsd_boolean: StringRef,
    pub xsd_date_time: StringRef,
}

impl Vocab {
    /// Intern the vocabulary into `interner`.
    pub fn intern(interner: &Interner) -> Result<Self, InternError> {
        Ok(Self {
            rdf_type: interner.intern_iri(concat_ns(RDF_NS, "type").as_bytes())?,
            rdfs_label: interner.intern_iri(concat_ns(RDFS_NS, "label").as_bytes())?,
            rdfs_sub_class_of: interner.intern_iri(concat_ns(RDFS_NS, "subClassOf").as_bytes())?,
            rdfs_sub_property_of: interner
                .intern_iri(concat_ns(RDFS_NS, "subPropertyOf").as_bytes())?,
            rdfs_domain: interner.intern_iri(concat_ns(RDFS_NS, "domain").as_bytes())?,
            rdfs_range: interner.intern_iri(concat_ns(RDFS_NS, "range").as_bytes())?,
            xsd_string: interner.intern_iri(concat_ns(XSD_NS, "string").as_bytes())?,
            xsd_integer: interner.intern_iri(concat_ns(XSD_NS, "integer").as_bytes())?,
            xsd_decimal: interner.intern_iri(concat_ns(XSD_NS, "decimal").as_bytes())?,
            xsd_boolean: interner.intern_iri(concat_ns(XSD_NS, "boolean").as_bytes())?,
            xsd_date_time: interner.intern_iri(concat_ns(XSD_NS, "dateTime").as_bytes())?,
        })
    }
}

/// Whether an IRI lives in one of the system namespaces (rdf/rdfs/owl).
pub fn is_system_iri(bytes: &[u8]) -> bool {
    bytes.starts_with(RDF_NS.as_bytes())
        || bytes.starts_with(RDFS_NS.as_bytes())
        || bytes.starts_with(OWL_NS.as_bytes())
}

fn concat_ns(ns: &str, local: &str) -> String {
    let mut iri = String::with_capacity(ns.len() + local.len());
    iri.push_str(ns);
    iri.push_str(local);
    iri
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocab_interns_distinct_terms() {
        let interner = Interner::new();
        let vocab = Vocab::intern(&interner).unwrap();
        assert_ne!(vocab.rdf_type, vocab.rdfs_label);
        assert_ne!(vocab.rdfs_sub_class_of, vocab.rdfs_sub_property_of);
        assert_ne!(vocab.xsd_integer, vocab.xsd_decimal);
    }

    #[test]
    fn test_vocab_stable_across_calls() {
        let interner = Interner::new();
        let a = Vocab::intern(&interner).unwrap();
        let b = Vocab::intern(&interner).unwrap();
        assert_eq!(a.rdf_type, b.rdf_type);
        assert_eq!(a.xsd_date_time, b.xsd_date_time);
    }

    #[test]
    fn test_is_system_iri() {
        assert!(is_system_iri(b"http://www.w3.org/1999/02/22-rdf-syntax-ns#type"));
        assert!(is_system_iri(b"http://www.w3.org/2002/07/owl#Class"));
        assert!(!is_system_iri(b"http://example.org/hasQuestion"));
    }
}

//! Per-kind field tables: canonical names, accepted aliases, normalisation
//! and the fields a result must contain to be usable.

use docintake_core::DocumentKind;

/// How a field's value is cleaned after whitespace collapsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalize {
    Text,
    /// Identifiers: upper-cased.
    Upper,
    /// `M` or `F` when recognisable.
    Sex,
}

#[derive(Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub normalize: Normalize,
}

const fn field(name: &'static str) -> FieldSpec {
    FieldSpec { name, aliases: &[], normalize: Normalize::Text }
}

#[derive(Debug)]
pub struct KindSchema {
    pub fields: &'static [FieldSpec],
    pub required: &'static [&'static str],
}

impl KindSchema {
    /// The canonical field a model-written key refers to, if any.
    pub fn lookup(&self, key: &str) -> Option<&FieldSpec> {
        let key = canonical_key(key);
        self.fields.iter().find(|spec| {
            canonical_key(spec.name) == key || spec.aliases.iter().any(|a| canonical_key(a) == key)
        })
    }
}

/// Lower-case, single-spaced, no spaces around `/`, no trailing period.
pub fn canonical_key(key: &str) -> String {
    key.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .replace(" /", "/")
        .replace("/ ", "/")
        .trim_end_matches('.')
        .to_string()
}

static IDENTITY_CARD: KindSchema = KindSchema {
    fields: &[
        FieldSpec { name: "Name", aliases: &["Full Name"], normalize: Normalize::Text },
        field("Race"),
        FieldSpec { name: "Date of birth", aliases: &["DOB", "Birth Date"], normalize: Normalize::Text },
        FieldSpec { name: "Sex", aliases: &["Gender"], normalize: Normalize::Sex },
        FieldSpec {
            name: "Country/Place of birth",
            aliases: &["Country of birth", "Place of birth"],
            normalize: Normalize::Text,
        },
    ],
    required: &["Name", "Date of birth"],
};

static DRIVERS_LICENSE: KindSchema = KindSchema {
    fields: &[
        FieldSpec { name: "Name", aliases: &["Full Name"], normalize: Normalize::Text },
        FieldSpec {
            name: "License Number",
            aliases: &["Licence Number", "License No", "Licence No", "Driving Licence No"],
            normalize: Normalize::Upper,
        },
        FieldSpec { name: "Date of birth", aliases: &["DOB", "Birth Date"], normalize: Normalize::Text },
        FieldSpec { name: "Issue Date", aliases: &["Date of Issue"], normalize: Normalize::Text },
        field("Valid From"),
        FieldSpec { name: "Valid To", aliases: &["Valid Till", "Expiry Date"], normalize: Normalize::Text },
        FieldSpec { name: "Classes", aliases: &["Class", "Licence Classes", "License Classes"], normalize: Normalize::Upper },
    ],
    required: &["Name", "License Number"],
};

static LOG_CARD: KindSchema = KindSchema {
    fields: &[
        FieldSpec {
            name: "Vehicle No",
            aliases: &["Vehicle Number", "Registration No", "Vehicle Registration No"],
            normalize: Normalize::Upper,
        },
        FieldSpec { name: "Make/Model", aliases: &["Make and Model"], normalize: Normalize::Text },
        field("Vehicle Type"),
        field("Vehicle Attachment 1"),
        field("Vehicle Scheme"),
        FieldSpec { name: "Chassis No", aliases: &["Chassis Number"], normalize: Normalize::Upper },
        field("Propellant"),
        FieldSpec { name: "Engine No", aliases: &["Engine Number"], normalize: Normalize::Upper },
        FieldSpec { name: "Motor No", aliases: &["Motor Number"], normalize: Normalize::Upper },
        field("Engine Capacity"),
        field("Power Rating"),
        field("Maximum Power Output"),
        field("Maximum Laden Weight"),
        field("Unladen Weight"),
        field("Year Of Manufacture"),
        field("Original Registration Date"),
        field("Lifespan Expiry Date"),
        field("COE Category"),
        field("PQP Paid"),
        field("COE Expiry Date"),
        field("Road Tax Expiry Date"),
        field("PARF Eligibility Expiry Date"),
        field("Inspection Due Date"),
        field("Intended Transfer Date"),
    ],
    required: &["Vehicle No", "Make/Model"],
};

pub fn schema_for(kind: DocumentKind) -> &'static KindSchema {
    match kind {
        DocumentKind::IdentityCard => &IDENTITY_CARD,
        DocumentKind::DriversLicense => &DRIVERS_LICENSE,
        DocumentKind::LogCard => &LOG_CARD,
    }
}

/// Whether a value is a "nothing here" answer or an unfilled template slot.
pub fn is_placeholder(value: &str) -> bool {
    let v = value.trim();
    if v.is_empty() || (v.starts_with('[') && v.ends_with(']')) {
        return true;
    }
    matches!(
        v.to_ascii_lowercase().trim_end_matches('.'),
        "not found" | "n/a" | "na" | "-" | "none" | "nil" | "unknown" | "not visible" | "not available"
    )
}

pub fn normalize_value(value: &str, normalize: Normalize) -> String {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    match normalize {
        Normalize::Text => collapsed,
        Normalize::Upper => collapsed.to_uppercase(),
        Normalize::Sex => match collapsed.to_ascii_uppercase().as_str() {
            "M" | "MALE" => "M".to_string(),
            "F" | "FEMALE" => "F".to_string(),
            other => other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_alias_and_spacing() {
        let log_card = schema_for(DocumentKind::LogCard);
        assert_eq!(log_card.lookup("Vehicle No.").unwrap().name, "Vehicle No");
        assert_eq!(log_card.lookup("make / model").unwrap().name, "Make/Model");
        assert!(log_card.lookup("Owner").is_none());

        let id = schema_for(DocumentKind::IdentityCard);
        assert_eq!(id.lookup("DOB").unwrap().name, "Date of birth");
    }

    #[test]
    fn required_fields_are_in_table() {
        for kind in DocumentKind::ALL {
            let schema = schema_for(kind);
            for name in schema.required {
                assert!(schema.lookup(name).is_some(), "{kind}: {name}");
            }
        }
    }

    #[test]
    fn placeholders() {
        assert!(is_placeholder("Not found"));
        assert!(is_placeholder("[Full name including Chinese name if present]"));
        assert!(is_placeholder(" N/A "));
        assert!(!is_placeholder("No Attachment"));
    }

    #[test]
    fn normalisation() {
        assert_eq!(normalize_value(" female ", Normalize::Sex), "F");
        assert_eq!(normalize_value("sba  1234 a", Normalize::Upper), "SBA 1234 A");
        assert_eq!(normalize_value("TAN   AH\tKOW", Normalize::Text), "TAN AH KOW");
    }
}

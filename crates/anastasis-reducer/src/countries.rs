//! embedded continent/country resource table.
//!
//! the source loads this from on-disk `redux.*.json` resource files
//! at startup and treats it as the one legitimate process-wide datum
//! (§9 design notes). a compiled-in table serves the same purpose
//! without a runtime asset directory, and is what `continent_selecting`
//! and `country_selecting` list from. each country also carries its
//! identity-attribute schema (field name, human label, widget type,
//! optional named validator id), mirroring the original's
//! `redux/<country>.json` (SPEC_FULL.md "Supplemented features" #1);
//! the validators themselves stay out of scope (spec.md §1), so only
//! the validator's name is tracked, never its logic.

/// one identity-attribute field a country's schema asks for.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct AttributeSpec {
    /// the key under which the value is stored in `identity_attributes`.
    pub name: &'static str,
    /// human-readable label for the entry form.
    pub label: &'static str,
    /// `"string"` | `"date"`, matching the original's widget kinds.
    pub widget: &'static str,
    /// name of the validator that checks this field's format, if any;
    /// `None` for free-text fields like full name or birthplace.
    pub validator: Option<&'static str>,
    /// whether a backup/recovery session can proceed without it.
    pub optional: bool,
}

const FULL_NAME: AttributeSpec = AttributeSpec { name: "full_name", label: "Full name", widget: "string", validator: None, optional: false };
const BIRTHDATE: AttributeSpec = AttributeSpec { name: "birthdate", label: "Birthdate", widget: "date", validator: None, optional: false };
const BIRTHPLACE: AttributeSpec = AttributeSpec { name: "birthplace", label: "Birthplace", widget: "string", validator: None, optional: true };

const DE_ATTRS: &[AttributeSpec] = &[
    FULL_NAME,
    BIRTHDATE,
    AttributeSpec { name: "tax_number", label: "Steuer-Identifikationsnummer", widget: "string", validator: Some("DE_TAX_ID"), optional: false },
];
const CH_ATTRS: &[AttributeSpec] = &[
    FULL_NAME,
    BIRTHDATE,
    AttributeSpec { name: "social_security_number", label: "AHV-Nummer", widget: "string", validator: Some("CH_AHV"), optional: false },
];
const FR_ATTRS: &[AttributeSpec] = &[
    FULL_NAME,
    BIRTHDATE,
    BIRTHPLACE,
    AttributeSpec { name: "social_security_number", label: "Numéro de sécurité sociale", widget: "string", validator: Some("FR_INSEE"), optional: false },
];
const AT_ATTRS: &[AttributeSpec] = &[
    FULL_NAME,
    BIRTHDATE,
    AttributeSpec { name: "social_security_number", label: "Sozialversicherungsnummer", widget: "string", validator: Some("AT_SVNR"), optional: false },
];
const IT_ATTRS: &[AttributeSpec] = &[
    FULL_NAME,
    BIRTHDATE,
    AttributeSpec { name: "tax_number", label: "Codice Fiscale", widget: "string", validator: Some("IT_CODICE_FISCALE"), optional: false },
];
const US_ATTRS: &[AttributeSpec] = &[
    FULL_NAME,
    BIRTHDATE,
    AttributeSpec { name: "social_security_number", label: "Social Security Number", widget: "string", validator: Some("US_SSN"), optional: false },
];
const CA_ATTRS: &[AttributeSpec] = &[
    FULL_NAME,
    BIRTHDATE,
    AttributeSpec { name: "social_insurance_number", label: "Social Insurance Number", widget: "string", validator: Some("CA_SIN"), optional: false },
];
const BR_ATTRS: &[AttributeSpec] = &[
    FULL_NAME,
    BIRTHDATE,
    AttributeSpec { name: "tax_number", label: "CPF", widget: "string", validator: Some("BR_CPF"), optional: false },
];
const JP_ATTRS: &[AttributeSpec] = &[
    FULL_NAME,
    BIRTHDATE,
    AttributeSpec { name: "my_number", label: "My Number", widget: "string", validator: Some("JP_MY_NUMBER"), optional: false },
];
const IN_ATTRS: &[AttributeSpec] = &[
    FULL_NAME,
    BIRTHDATE,
    AttributeSpec { name: "aadhaar_number", label: "Aadhaar Number", widget: "string", validator: Some("IN_AADHAAR"), optional: false },
];
const NG_ATTRS: &[AttributeSpec] = &[
    FULL_NAME,
    BIRTHDATE,
    AttributeSpec { name: "national_identification_number", label: "National Identification Number", widget: "string", validator: Some("NG_NIN"), optional: false },
];
const AU_ATTRS: &[AttributeSpec] = &[
    FULL_NAME,
    BIRTHDATE,
    AttributeSpec { name: "tax_file_number", label: "Tax File Number", widget: "string", validator: Some("AU_TFN"), optional: false },
];

/// `(continent, country name, ISO 3166-1 alpha-2 code, attribute schema)`.
pub const COUNTRIES: &[(&str, &str, &str, &[AttributeSpec])] = &[
    ("Europe", "Germany", "de", DE_ATTRS),
    ("Europe", "Switzerland", "ch", CH_ATTRS),
    ("Europe", "France", "fr", FR_ATTRS),
    ("Europe", "Austria", "at", AT_ATTRS),
    ("Europe", "Italy", "it", IT_ATTRS),
    ("North America", "United States", "us", US_ATTRS),
    ("North America", "Canada", "ca", CA_ATTRS),
    ("South America", "Brazil", "br", BR_ATTRS),
    ("Asia", "Japan", "jp", JP_ATTRS),
    ("Asia", "India", "in", IN_ATTRS),
    ("Africa", "Nigeria", "ng", NG_ATTRS),
    ("Oceania", "Australia", "au", AU_ATTRS),
];

pub fn continents() -> Vec<&'static str> {
    let mut seen = Vec::new();
    for (continent, _, _, _) in COUNTRIES {
        if !seen.contains(continent) {
            seen.push(*continent);
        }
    }
    seen
}

pub fn countries_in(continent: &str) -> Vec<(&'static str, &'static str)> {
    COUNTRIES
        .iter()
        .filter(|(c, _, _, _)| *c == continent)
        .map(|(_, name, code, _)| (*name, *code))
        .collect()
}

pub fn is_known_country_code(code: &str) -> bool {
    COUNTRIES.iter().any(|(_, _, c, _)| *c == code)
}

/// the attribute schema for `code`, or `None` for an unknown country
/// code (§3: "collected per country-specific schema").
pub fn required_attributes(code: &str) -> Option<&'static [AttributeSpec]> {
    COUNTRIES.iter().find(|(_, _, c, _)| *c == code).map(|(_, _, _, attrs)| *attrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_country_has_a_known_continent() {
        for (continent, _, _, _) in COUNTRIES {
            assert!(continents().contains(continent));
        }
    }

    #[test]
    fn looks_up_known_and_unknown_codes() {
        assert!(is_known_country_code("de"));
        assert!(!is_known_country_code("zz"));
    }

    #[test]
    fn every_country_has_a_full_name_attribute() {
        for (_, _, code, _) in COUNTRIES {
            let attrs = required_attributes(code).unwrap();
            assert!(attrs.iter().any(|a| a.name == "full_name"));
        }
    }

    #[test]
    fn unknown_country_has_no_schema() {
        assert!(required_attributes("zz").is_none());
    }
}

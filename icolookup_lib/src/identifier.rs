//! IČO format rules and extraction of identifiers from registry records.

use rpo_api::types::RegistryRecord;

use crate::model::ApiCandidate;

/// Identifier type labels the registry uses for IČO.
const ICO_TYPE_LABELS: &[&str] = &["ico", "ičo", "ico_sk"];

/// Weights applied to the first seven digits, left to right.
const WEIGHTS: [u32; 7] = [8, 7, 6, 5, 4, 3, 2];

/// Strips everything but digits and keeps the result only if it is 8 digits long.
///
/// `"35 763 469"` becomes `"35763469"`; `"123"` is rejected.
pub fn normalize_identifier(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    (digits.len() == 8).then_some(digits)
}

/// Checks the IČO control digit.
///
/// `r = (Σ dᵢ·wᵢ) mod 11` over the first seven digits with weights 8..2; the
/// eighth digit must equal `(11 - r) mod 10`, i.e. remainder 0 gives 1,
/// remainder 1 gives 0, anything else gives `11 - r`.
pub fn is_valid_ico(identifier: &str) -> bool {
    let bytes = identifier.as_bytes();
    if bytes.len() != 8 || !bytes.iter().all(u8::is_ascii_digit) {
        return false;
    }
    let digits: Vec<u32> = bytes.iter().map(|b| u32::from(b - b'0')).collect();
    let sum: u32 = digits[..7].iter().zip(WEIGHTS).map(|(d, w)| d * w).sum();
    let check = (11 - sum % 11) % 10;
    digits[7] == check
}

/// Picks the identifier to report for a record.
///
/// Preference: an entry typed as IČO with 8 digits, then any entry with 8
/// digits, then the first non-empty raw value as-is.
pub fn extract_identifier(record: &RegistryRecord) -> Option<String> {
    let typed = record.identifiers.iter().find_map(|ident| {
        let label = ident.kind_label()?.trim().to_lowercase();
        if !ICO_TYPE_LABELS.contains(&label.as_str()) {
            return None;
        }
        normalize_identifier(ident.value.as_deref()?)
    });
    if typed.is_some() {
        return typed;
    }

    let eight_digit = record
        .identifiers
        .iter()
        .find_map(|ident| normalize_identifier(ident.value.as_deref()?));
    if eight_digit.is_some() {
        return eight_digit;
    }

    record
        .identifiers
        .iter()
        .filter_map(|ident| ident.value.as_deref())
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

/// Converts a registry record into a candidate. Records without any
/// identifier or name cannot be reported and are dropped.
pub fn candidate_from_record(record: &RegistryRecord) -> Option<ApiCandidate> {
    let identifier = extract_identifier(record)?;
    let full_name = record.current_full_name()?.to_string();
    Some(ApiCandidate {
        identifier,
        full_name,
        is_active: record.is_active(),
        terminated_on: record.termination_date(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpo_api::types::{CodelistValue, FullName, Identifier};

    fn ident(value: &str, kind: Option<&str>) -> Identifier {
        Identifier {
            value: Some(value.to_string()),
            kind: kind.map(|k| CodelistValue {
                value: Some(k.to_string()),
                code: None,
            }),
            ..Default::default()
        }
    }

    fn record(identifiers: Vec<Identifier>, name: &str) -> RegistryRecord {
        RegistryRecord {
            identifiers,
            full_names: vec![FullName {
                value: Some(name.to_string()),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn known_valid_icos() {
        assert!(is_valid_ico("31322832")); // Slovnaft
        assert!(is_valid_ico("35763469")); // Slovak Telekom
        // sum = 125, r = 4 -> check 7
        assert!(is_valid_ico("36252417"));
    }

    #[test]
    fn altered_check_digit_is_invalid() {
        assert!(!is_valid_ico("31322833"));
        assert!(!is_valid_ico("35763460"));
        assert!(!is_valid_ico("36252418"));
    }

    #[test]
    fn remainder_edge_cases() {
        // 0000001x: sum = 2, r = 2 -> check 9
        assert!(is_valid_ico("00000019"));
        // 0000010x: sum = 3 -> check 8
        assert!(is_valid_ico("00000108"));
        // 1000000x: sum = 8, r = 8 -> check 3
        assert!(is_valid_ico("10000003"));
        // 0000005x: sum = 10, r = 10 -> check 1
        assert!(is_valid_ico("00000051"));
        // 0000000x: sum = 0, r = 0 -> check 1
        assert!(is_valid_ico("00000001"));
        assert!(!is_valid_ico("00000000"));
        // 0000100x: sum = 4 -> check 7
        assert!(is_valid_ico("00001007"));
        // sum = 12, r = 1 -> check 0: digits 0000006 -> 6*2 = 12
        assert!(is_valid_ico("00000060"));
    }

    #[test]
    fn malformed_identifiers_are_invalid() {
        assert!(!is_valid_ico(""));
        assert!(!is_valid_ico("3132283"));
        assert!(!is_valid_ico("313228321"));
        assert!(!is_valid_ico("3132283a"));
        assert!(!is_valid_ico("31 322 832"));
    }

    #[test]
    fn normalize_strips_separators() {
        assert_eq!(normalize_identifier("35 763 469").as_deref(), Some("35763469"));
        assert_eq!(normalize_identifier("IČO: 31322832").as_deref(), Some("31322832"));
        assert_eq!(normalize_identifier("123"), None);
        assert_eq!(normalize_identifier(""), None);
    }

    #[test]
    fn prefers_typed_ico_over_other_numbers() {
        let r = record(
            vec![
                ident("12345678", Some("DIČ")),
                ident("35 763 469", Some("IČO")),
            ],
            "Slovak Telekom, a.s.",
        );
        assert_eq!(extract_identifier(&r).as_deref(), Some("35763469"));
    }

    #[test]
    fn falls_back_to_any_eight_digit_value() {
        let r = record(vec![ident("x", None), ident("31322832", None)], "SLOVNAFT, a.s.");
        assert_eq!(extract_identifier(&r).as_deref(), Some("31322832"));
    }

    #[test]
    fn falls_back_to_raw_value() {
        let r = record(vec![ident(" SK2020372640 ", Some("DIČ"))], "Firma");
        assert_eq!(extract_identifier(&r).as_deref(), Some("SK2020372640"));
    }

    #[test]
    fn record_without_identifiers_is_dropped() {
        let r = record(vec![], "Telekom Klub, o.z.");
        assert!(candidate_from_record(&r).is_none());
    }

    #[test]
    fn candidate_carries_name_and_status() {
        let mut r = record(vec![ident("31322832", None)], "SLOVNAFT, a.s.");
        r.termination = Some("2020-01-01".to_string());
        let c = candidate_from_record(&r).unwrap();
        assert_eq!(c.identifier, "31322832");
        assert_eq!(c.full_name, "SLOVNAFT, a.s.");
        assert!(!c.is_active);
        assert_eq!(c.terminated_on, chrono::NaiveDate::from_ymd_opt(2020, 1, 1));
    }
}

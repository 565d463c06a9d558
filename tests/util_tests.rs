use anc_notify_service::utils::sanitize_phone_number;

/// Test: A local 08-prefixed number gains the country code
#[test]
fn test_local_prefix_is_rewritten() {
    assert_eq!(sanitize_phone_number("081234567890"), "6281234567890");
}

/// Test: A bare 8-prefixed number gains the country code
#[test]
fn test_bare_prefix_is_rewritten() {
    assert_eq!(sanitize_phone_number("81234567890"), "6281234567890");
}

/// Test: A number already carrying the country code passes through
#[test]
fn test_country_code_passes_through() {
    assert_eq!(sanitize_phone_number("6281234567890"), "6281234567890");
}

/// Test: Formatting characters are stripped before the rewrite
#[test]
fn test_formatting_is_stripped() {
    assert_eq!(sanitize_phone_number("+62 812-3456-7890"), "6281234567890");
    assert_eq!(sanitize_phone_number("(0812) 3456.7890"), "6281234567890");
}

/// Test: Digits with an unexpected prefix are kept as-is
#[test]
fn test_unexpected_prefix_is_kept() {
    assert_eq!(sanitize_phone_number("12345"), "12345");
}

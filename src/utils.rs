/// Normalizes an Indonesian mobile number to the `62`-prefixed digit form
/// the broadcast provider expects.
///
/// Formatting characters (spaces, dashes, dots, parentheses, a leading `+`)
/// are stripped first, then the local prefix is rewritten:
/// `0812...` and `812...` both become `62812...`, while numbers already
/// starting with `62` pass through unchanged.
pub fn sanitize_phone_number(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.starts_with("62") {
        digits
    } else if let Some(rest) = digits.strip_prefix('0') {
        format!("62{}", rest)
    } else if digits.starts_with('8') {
        format!("62{}", digits)
    } else {
        digits
    }
}

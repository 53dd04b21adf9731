/// Locate the first top-level JSON array in `raw`.
///
/// Scans from the first `[` to its matching `]`, ignoring brackets that
/// appear inside JSON strings. Returns `None` when there is no `[` or it is
/// never closed.
pub fn extract_json_array(raw: &str) -> Option<&str> {
    let start = raw.find('[')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, byte) in raw.as_bytes()[start..].iter().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

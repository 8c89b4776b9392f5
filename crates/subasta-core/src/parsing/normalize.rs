/// Values the source tables use for an empty cell.
const NULL_MARKERS: [&str; 5] = ["", "NAN", "NONE", "NULL", "-"];

fn is_null_marker(s: &str) -> bool {
    NULL_MARKERS.contains(&s)
}

/// Normalize a place name to a canonical grouping key.
///
/// Steps:
/// 1. Uppercase
/// 2. Fold accented vowels to their base letter (Ñ is kept)
/// 3. Drop characters other than letters, digits, space, `-`, `.`, `/`
/// 4. Collapse whitespace
pub fn normalize_origin(raw: &str) -> Option<String> {
    let mut folded = String::with_capacity(raw.len());
    for c in raw.trim().to_uppercase().chars() {
        match c {
            'Á' | 'À' | 'Ä' | 'Â' => folded.push('A'),
            'É' | 'È' | 'Ë' | 'Ê' => folded.push('E'),
            'Í' | 'Ì' | 'Ï' | 'Î' => folded.push('I'),
            'Ó' | 'Ò' | 'Ö' | 'Ô' => folded.push('O'),
            'Ú' | 'Ù' | 'Ü' | 'Û' => folded.push('U'),
            'A'..='Z' | '0'..='9' | 'Ñ' | '-' | '.' | '/' => folded.push(c),
            c if c.is_whitespace() => folded.push(' '),
            _ => {}
        }
    }

    let collapsed = collapse_whitespace(&folded);
    if is_null_marker(&collapsed) {
        None
    } else {
        Some(collapsed)
    }
}

/// Uppercase and trim a category code.
pub fn normalize_category(raw: &str) -> Option<String> {
    let code = raw.trim().to_uppercase();
    if is_null_marker(&code) {
        None
    } else {
        Some(code)
    }
}

/// Trim free text, keeping it only if something meaningful remains.
pub fn normalize_free_text(raw: &str) -> Option<String> {
    let text = collapse_whitespace(raw.trim()).to_uppercase();
    if is_null_marker(&text) {
        None
    } else {
        Some(text)
    }
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// JSON syntax repair for JavaScript-flavoured object literals
//
// A single pass over the input that understands string boundaries, so the
// contents of strings are never rewritten. Handles:
// - `//` and `/* */` comments (removed)
// - single-quoted strings (re-quoted with double quotes)
// - bare object keys (quoted)
// - `undefined`, `NaN`, `Infinity` values (replaced with null)
// - trailing commas before `}` / `]` (removed)

/// Rewrite `input` into something `serde_json` has a chance of parsing
pub fn repair_json(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 16);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' => i = copy_double_quoted(&chars, i, &mut out),
            '\'' => i = convert_single_quoted(&chars, i, &mut out),
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i = (i + 2).min(chars.len());
            }
            ',' => {
                if !closes_next(&chars, i + 1) {
                    out.push(',');
                }
                i += 1;
            }
            c if c.is_ascii_digit() => i = copy_number(&chars, i, &mut out),
            c if is_ident_start(c) => i = rewrite_identifier(&chars, i, &mut out),
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Index of the next character that is not whitespace or a comment
fn skip_insignificant(chars: &[char], mut i: usize) -> usize {
    loop {
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        if chars.get(i) == Some(&'/') && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }
        if chars.get(i) == Some(&'/') && chars.get(i + 1) == Some(&'*') {
            i += 2;
            while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                i += 1;
            }
            i = (i + 2).min(chars.len());
            continue;
        }
        return i;
    }
}

/// True when a comma at `i - 1` is trailing
fn closes_next(chars: &[char], i: usize) -> bool {
    match chars.get(skip_insignificant(chars, i)) {
        Some('}') | Some(']') | None => true,
        _ => false,
    }
}

fn copy_double_quoted(chars: &[char], start: usize, out: &mut String) -> usize {
    out.push('"');
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        out.push(c);
        i += 1;
        match c {
            '\\' => {
                if let Some(&next) = chars.get(i) {
                    out.push(next);
                    i += 1;
                }
            }
            '"' => return i,
            _ => {}
        }
    }
    i
}

fn convert_single_quoted(chars: &[char], start: usize, out: &mut String) -> usize {
    out.push('"');
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        i += 1;
        match c {
            '\\' => match chars.get(i) {
                Some('\'') => {
                    out.push('\'');
                    i += 1;
                }
                Some(&next) => {
                    out.push('\\');
                    out.push(next);
                    i += 1;
                }
                None => {}
            },
            '"' => out.push_str("\\\""),
            '\'' => {
                out.push('"');
                return i;
            }
            _ => out.push(c),
        }
    }
    // Unterminated, close it so the error surfaces later instead of here
    out.push('"');
    i
}

fn copy_number(chars: &[char], start: usize, out: &mut String) -> usize {
    let mut i = start;
    while i < chars.len() {
        let c = chars[i];
        let exponent_sign = (c == '+' || c == '-') && matches!(chars.get(i.wrapping_sub(1)), Some('e') | Some('E'));
        if c.is_ascii_alphanumeric() || c == '.' || exponent_sign {
            out.push(c);
            i += 1;
        } else {
            break;
        }
    }
    i
}

fn rewrite_identifier(chars: &[char], start: usize, out: &mut String) -> usize {
    let mut end = start;
    while end < chars.len() && is_ident_char(chars[end]) {
        end += 1;
    }
    let ident: String = chars[start..end].iter().collect();

    if chars.get(skip_insignificant(chars, end)) == Some(&':') {
        out.push('"');
        out.push_str(&ident);
        out.push('"');
        return end;
    }

    match ident.as_str() {
        "undefined" | "NaN" => out.push_str("null"),
        "Infinity" => {
            if out.ends_with('-') {
                out.pop();
            }
            out.push_str("null");
        }
        _ => out.push_str(&ident),
    }
    end
}

use crate::value::Value;

/// Inline `bindings` into `sql` for display.
///
/// Each `?` is replaced left to right: numeric values unquoted, everything
/// else wrapped in single quotes (no escaping). Text introduced by a binding
/// is never rescanned, so a bound `?` does not consume the next binding.
/// Placeholders beyond the last binding are left as `?`.
///
/// The output is for logs and debugging only. It is not injection-safe.
pub fn render_inline(sql: &str, bindings: &[Value]) -> String {
    let mut out = String::with_capacity(sql.len() + bindings.len() * 8);
    let mut values = bindings.iter();
    for ch in sql.chars() {
        if ch != '?' {
            out.push(ch);
            continue;
        }
        match values.next() {
            Some(value) => push_literal(&mut out, value),
            None => out.push('?'),
        }
    }
    out
}

fn push_literal(out: &mut String, value: &Value) {
    if value.is_null() || value.is_numeric() {
        out.push_str(&value.display_text());
    } else {
        out.push('\'');
        out.push_str(&value.display_text());
        out.push('\'');
    }
}

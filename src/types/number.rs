use super::value::LuaValue;

// decimal int/float, or 0x/0X hex int/float (0x1.8p3 style)
pub fn parse_number(s: &str) -> Option<LuaValue> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (neg, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let lower = rest.to_ascii_lowercase();
    if lower == "inf" || lower == "infinity" || lower == "nan" {
        // no inf/nan literal in the numeral grammar
        return None;
    }

    if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        return parse_hex(hex, neg);
    }

    if let Ok(i) = rest.parse::<i64>() {
        return Some(LuaValue::Integer(if neg { -i } else { i }));
    }

    if is_decimal_numeral(rest) {
        if let Ok(f) = rest.parse::<f64>() {
            return Some(LuaValue::Float(if neg { -f } else { f }));
        }
    }

    None
}

fn is_decimal_numeral(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
}

fn parse_hex(hex: &str, neg: bool) -> Option<LuaValue> {
    if hex.is_empty() {
        return None;
    }

    if let Some(p_pos) = hex.find(['p', 'P']) {
        let (mantissa, exp) = hex.split_at(p_pos);
        let exp = &exp[1..];
        let exponent: i32 = exp.parse().ok()?;
        let value = parse_hex_mantissa(mantissa)?;
        let value = value * 2f64.powi(exponent);
        return Some(LuaValue::Float(if neg { -value } else { value }));
    }

    if hex.contains('.') {
        let value = parse_hex_mantissa(hex)?;
        return Some(LuaValue::Float(if neg { -value } else { value }));
    }

    // plain hex integer, wraps on overflow
    let mut acc: u64 = 0;
    for c in hex.chars() {
        let digit = c.to_digit(16)?;
        acc = acc.wrapping_mul(16).wrapping_add(digit as u64);
    }
    let i = acc as i64;
    Some(LuaValue::Integer(if neg { i.wrapping_neg() } else { i }))
}

fn parse_hex_mantissa(s: &str) -> Option<f64> {
    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => (s, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }

    let mut value = 0f64;
    for c in int_part.chars() {
        value = value * 16.0 + c.to_digit(16)? as f64;
    }

    let mut scale = 1.0 / 16.0;
    for c in frac_part.chars() {
        value += c.to_digit(16)? as f64 * scale;
        scale /= 16.0;
    }

    Some(value)
}

pub fn to_number(v: &LuaValue) -> Option<LuaValue> {
    match v {
        LuaValue::Integer(_) | LuaValue::Float(_) => Some(v.clone()),
        LuaValue::String(s) => parse_number(std::str::from_utf8(s).ok()?),
        _ => None,
    }
}

pub fn to_integer(v: &LuaValue) -> Option<i64> {
    match v {
        LuaValue::Integer(i) => Some(*i),
        LuaValue::Float(f) => float_to_integer(*f),
        LuaValue::String(s) => match parse_number(std::str::from_utf8(s).ok()?)? {
            LuaValue::Integer(i) => Some(i),
            LuaValue::Float(f) => float_to_integer(f),
            _ => None,
        },
        _ => None,
    }
}

pub fn float_to_integer(f: f64) -> Option<i64> {
    if !f.is_finite() {
        return None;
    }
    let i = f as i64;
    if i as f64 == f { Some(i) } else { None }
}

pub fn to_float(v: &LuaValue) -> Option<f64> {
    match v {
        LuaValue::Integer(i) => Some(*i as f64),
        LuaValue::Float(f) => Some(*f),
        LuaValue::String(s) => match parse_number(std::str::from_utf8(s).ok()?)? {
            LuaValue::Integer(i) => Some(i as f64),
            LuaValue::Float(f) => Some(f),
            _ => None,
        },
        _ => None,
    }
}

pub fn to_lua_string(v: &LuaValue) -> Option<Vec<u8>> {
    match v {
        LuaValue::Integer(i) => Some(i.to_string().into_bytes()),
        LuaValue::Float(f) => Some(format_float(*f).into_bytes()),
        LuaValue::String(s) => Some(s.to_vec()),
        _ => None,
    }
}

// trailing .0 for integral values so 1.0 doesn't print as 1
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf".to_string() } else { "-inf".to_string() };
    }
    let s = format!("{f}");
    if s.contains('.') || s.contains('e') || s.contains('E') {
        s
    } else {
        format!("{s}.0")
    }
}

pub fn to_boolean(v: &LuaValue) -> bool {
    !matches!(v, LuaValue::Nil | LuaValue::None)
}

//! printf-style formatting for argument templates.
//!
//! External tools parse numbers the way C prints them, so templates such as
//! `--convergence [%d,%g]` or `POSTERIOR_%02d.nii.gz` are rendered with C
//! semantics: `%g` keeps 6 significant digits and switches to an exponent
//! below `1e-4`, `%f` prints 6 decimals.

use crate::value::Value;
use once_cell::sync::Lazy;
use regex::Regex;

static CONVERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"%(?P<flags>[-0 +]*)(?P<width>\d+)?(?:\.(?P<prec>\d+))?(?P<conv>[sdifgeG%])")
        .expect("conversion pattern is valid")
});

/// Error from template formatting
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// Template has more placeholders than arguments
    #[error("not enough arguments for template '{template}'")]
    TooFewArguments {
        /// Offending template
        template: String,
    },

    /// Template has fewer placeholders than arguments
    #[error("not all arguments converted by template '{template}'")]
    TooManyArguments {
        /// Offending template
        template: String,
    },

    /// Conversion does not accept the value's type
    #[error("%{conversion} format requires a number, got {kind}")]
    TypeMismatch {
        /// Conversion character
        conversion: char,
        /// Kind of the offending value
        kind: String,
    },
}

/// Count the value placeholders in a template (`%%` excluded)
#[must_use]
pub fn placeholder_count(template: &str) -> usize {
    CONVERSION
        .captures_iter(template)
        .filter(|c| &c["conv"] != "%")
        .count()
}

/// Format `args` into `template`
///
/// # Errors
///
/// Returns error if the argument count does not match the template or a
/// numeric conversion receives a non-numeric value
pub fn sprintf(template: &str, args: &[Value]) -> Result<String, FormatError> {
    let mut out = String::with_capacity(template.len() + 16);
    let mut last = 0;
    let mut next_arg = args.iter();

    for caps in CONVERSION.captures_iter(template) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        out.push_str(&template[last..whole.start]);
        last = whole.end;

        let conv = caps["conv"].chars().next().unwrap_or('s');
        if conv == '%' {
            out.push('%');
            continue;
        }

        let arg = next_arg.next().ok_or_else(|| FormatError::TooFewArguments {
            template: template.to_string(),
        })?;
        let flags = caps.name("flags").map_or("", |m| m.as_str());
        let width = caps
            .name("width")
            .and_then(|m| m.as_str().parse::<usize>().ok())
            .unwrap_or(0);
        let precision = caps.name("prec").and_then(|m| m.as_str().parse::<usize>().ok());

        let body = convert(conv, precision, arg)?;
        out.push_str(&pad(&body, flags, width, conv));
    }

    if next_arg.next().is_some() {
        return Err(FormatError::TooManyArguments {
            template: template.to_string(),
        });
    }

    out.push_str(&template[last..]);
    Ok(out)
}

fn convert(conv: char, precision: Option<usize>, arg: &Value) -> Result<String, FormatError> {
    let mismatch = || FormatError::TypeMismatch {
        conversion: conv,
        kind: arg.kind_name().to_string(),
    };

    match conv {
        's' => Ok(arg.to_string()),
        'd' | 'i' => {
            let n = match arg {
                Value::Float(x) => x.trunc() as i64,
                other => other.as_int().ok_or_else(mismatch)?,
            };
            Ok(n.to_string())
        }
        'f' => {
            let x = number(arg).ok_or_else(mismatch)?;
            Ok(format!("{:.*}", precision.unwrap_or(6), x))
        }
        'e' => {
            let x = number(arg).ok_or_else(mismatch)?;
            Ok(format_e(x, precision.unwrap_or(6)))
        }
        'g' | 'G' => {
            let x = number(arg).ok_or_else(mismatch)?;
            let s = format_g_prec(x, precision.unwrap_or(6));
            Ok(if conv == 'G' { s.to_uppercase() } else { s })
        }
        _ => Err(mismatch()),
    }
}

fn number(arg: &Value) -> Option<f64> {
    match arg {
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        other => other.as_float(),
    }
}

fn pad(body: &str, flags: &str, width: usize, conv: char) -> String {
    let len = body.chars().count();
    if len >= width {
        return body.to_string();
    }
    let fill = width - len;
    if flags.contains('-') {
        return format!("{}{}", body, " ".repeat(fill));
    }
    if flags.contains('0') && conv != 's' {
        // zeros go between the sign and the digits
        let (sign, digits) = match body.strip_prefix('-') {
            Some(rest) => ("-", rest),
            None => ("", body),
        };
        return format!("{}{}{}", sign, "0".repeat(fill), digits);
    }
    format!("{}{}", " ".repeat(fill), body)
}

fn non_finite(x: f64) -> Option<String> {
    if x.is_nan() {
        Some("nan".to_string())
    } else if x.is_infinite() {
        Some(if x > 0.0 { "inf" } else { "-inf" }.to_string())
    } else {
        None
    }
}

fn split_exponent(sci: &str) -> (&str, i32) {
    match sci.split_once('e') {
        Some((mantissa, exp)) => (mantissa, exp.parse().unwrap_or(0)),
        None => (sci, 0),
    }
}

fn strip_trailing_zeros(s: &str) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s.to_string()
    }
}

fn format_e(x: f64, precision: usize) -> String {
    if let Some(s) = non_finite(x) {
        return s;
    }
    let sci = format!("{:.*e}", precision, x);
    let (mantissa, exp) = split_exponent(&sci);
    let sign = if exp < 0 { '-' } else { '+' };
    format!("{}e{}{:02}", mantissa, sign, exp.abs())
}

fn format_g_prec(x: f64, precision: usize) -> String {
    if let Some(s) = non_finite(x) {
        return s;
    }
    if x == 0.0 {
        return if x.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let p = precision.max(1);
    let sci = format!("{:.*e}", p - 1, x);
    let (mantissa, exp) = split_exponent(&sci);

    if exp < -4 || exp >= p as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", strip_trailing_zeros(mantissa), sign, exp.abs())
    } else {
        let decimals = (p as i32 - 1 - exp).max(0) as usize;
        strip_trailing_zeros(&format!("{:.*}", decimals, x))
    }
}

/// Format a number like C's `%g`
#[must_use]
pub fn format_g(x: f64) -> String {
    format_g_prec(x, 6)
}

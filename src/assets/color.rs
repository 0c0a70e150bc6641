use crate::foundation::core::Rgba8;
use crate::foundation::error::{PointreelError, PointreelResult};

/// Parse one palette entry.
///
/// Accepts `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(r, g, b)`, `rgba(r, g, b, a)` (alpha as a
/// fraction or a percentage) and the keywords `white` / `black`.
pub fn parse_color(s: &str) -> PointreelResult<Rgba8> {
    let s = s.trim();
    match s.to_ascii_lowercase().as_str() {
        "white" => return Ok(Rgba8::WHITE),
        "black" => return Ok(Rgba8::BLACK),
        _ => {}
    }
    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex).map_err(PointreelError::validation);
    }
    if let Some(args) = functional_args(s, "rgba").or_else(|| functional_args(s, "rgb")) {
        return parse_functional(args).map_err(PointreelError::validation);
    }
    Err(PointreelError::validation(format!(
        "unrecognized color \"{s}\""
    )))
}

/// Parse a whole palette, index-aligned with class ids.
pub fn parse_palette<S: AsRef<str>>(colors: &[S]) -> PointreelResult<Vec<Rgba8>> {
    colors.iter().map(|c| parse_color(c.as_ref())).collect()
}

/// Palette with every entry's alpha set from an opacity percentage.
pub fn with_opacity(palette: &[Rgba8], opacity_percent: f32) -> Vec<Rgba8> {
    let alpha = opacity_percent / 100.0;
    palette.iter().map(|c| c.with_alpha(alpha)).collect()
}

fn functional_args<'a>(s: &'a str, name: &str) -> Option<&'a str> {
    let rest = s.get(..name.len())?;
    if !rest.eq_ignore_ascii_case(name) {
        return None;
    }
    s[name.len()..]
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
}

fn parse_functional(args: &str) -> Result<Rgba8, String> {
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    if parts.len() != 3 && parts.len() != 4 {
        return Err(format!("expected 3 or 4 color components, got {}", parts.len()));
    }

    fn channel(p: &str) -> Result<u8, String> {
        let v: f64 = p
            .parse()
            .map_err(|_| format!("invalid color component \"{p}\""))?;
        Ok(v.round().clamp(0.0, 255.0) as u8)
    }

    let r = channel(parts[0])?;
    let g = channel(parts[1])?;
    let b = channel(parts[2])?;
    let a = match parts.get(3) {
        None => 1.0,
        Some(p) => match p.strip_suffix('%') {
            Some(pct) => {
                pct.trim()
                    .parse::<f32>()
                    .map_err(|_| format!("invalid alpha \"{p}\""))?
                    / 100.0
            }
            None => p.parse::<f32>().map_err(|_| format!("invalid alpha \"{p}\""))?,
        },
    };
    Ok(Rgba8::opaque(r, g, b).with_alpha(a))
}

fn parse_hex(s: &str) -> Result<Rgba8, String> {
    fn hex_byte(pair: &str) -> Result<u8, String> {
        u8::from_str_radix(pair, 16).map_err(|_| format!("invalid hex byte \"{pair}\""))
    }
    fn hex_nibble(c: &str) -> Result<u8, String> {
        let v = u8::from_str_radix(c, 16).map_err(|_| format!("invalid hex digit \"{c}\""))?;
        Ok(v * 17)
    }

    if !s.is_ascii() {
        return Err("hex color must be ascii".to_owned());
    }

    match s.len() {
        3 => Ok(Rgba8::opaque(
            hex_nibble(&s[0..1])?,
            hex_nibble(&s[1..2])?,
            hex_nibble(&s[2..3])?,
        )),
        6 => Ok(Rgba8::opaque(
            hex_byte(&s[0..2])?,
            hex_byte(&s[2..4])?,
            hex_byte(&s[4..6])?,
        )),
        8 => Ok(Rgba8::new(
            hex_byte(&s[0..2])?,
            hex_byte(&s[2..4])?,
            hex_byte(&s[4..6])?,
            hex_byte(&s[6..8])?,
        )),
        _ => Err("hex color must be #RGB, #RRGGBB or #RRGGBBAA (case-insensitive)".to_owned()),
    }
}

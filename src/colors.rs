pub const DARK_MODE_MAX_LIGHTNESS: f64 = 0.25;
pub const LIGHT_MODE_MIN_LIGHTNESS: f64 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsl {
    pub hue: f64,
    pub saturation: f64,
    pub lightness: f64,
}

pub fn parse_hex(color: &str) -> Option<(u8, u8, u8)> {
    let digits = color.strip_prefix('#')?;
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).ok();
    Some((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

pub fn to_hex(red: u8, green: u8, blue: u8) -> String {
    format!("#{red:02x}{green:02x}{blue:02x}")
}

pub fn rgb_to_hsl(red: u8, green: u8, blue: u8) -> Hsl {
    let r = f64::from(red) / 255.0;
    let g = f64::from(green) / 255.0;
    let b = f64::from(blue) / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let spread = max - min;
    let lightness = (max + min) / 2.0;

    if spread == 0.0 {
        return Hsl {
            hue: 0.0,
            saturation: 0.0,
            lightness,
        };
    }

    let sector = if max == r {
        (g - b) / spread
    } else if max == g {
        2.0 + (b - r) / spread
    } else {
        4.0 + (r - g) / spread
    };
    let hue = (sector * 60.0).rem_euclid(360.0);
    let saturation = spread / (1.0 - (2.0 * lightness - 1.0).abs());

    Hsl {
        hue,
        saturation,
        lightness,
    }
}

pub fn hsl_to_rgb(hsl: Hsl) -> (u8, u8, u8) {
    let Hsl {
        hue,
        saturation,
        lightness,
    } = hsl;
    let chroma = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let x = chroma * (1.0 - ((hue / 60.0) % 2.0 - 1.0).abs());
    let m = lightness - chroma / 2.0;

    let (r, g, b) = if hue < 60.0 {
        (chroma, x, 0.0)
    } else if hue < 120.0 {
        (x, chroma, 0.0)
    } else if hue < 180.0 {
        (0.0, chroma, x)
    } else if hue < 240.0 {
        (0.0, x, chroma)
    } else if hue < 300.0 {
        (x, 0.0, chroma)
    } else {
        (chroma, 0.0, x)
    };

    let scale = |value: f64| ((value + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    (scale(r), scale(g), scale(b))
}

pub fn secondary_color(color: &str, dark_mode: bool, dark_max: f64, light_min: f64) -> Option<String> {
    let (red, green, blue) = parse_hex(color)?;
    let mut hsl = rgb_to_hsl(red, green, blue);
    hsl.lightness = if dark_mode {
        hsl.lightness.min(dark_max)
    } else {
        hsl.lightness.max(light_min)
    };
    let (red, green, blue) = hsl_to_rgb(hsl);
    Some(to_hex(red, green, blue))
}

pub fn default_secondary_color(color: &str, dark_mode: bool) -> Option<String> {
    secondary_color(color, dark_mode, DARK_MODE_MAX_LIGHTNESS, LIGHT_MODE_MIN_LIGHTNESS)
}

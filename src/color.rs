use std::sync::LazyLock;

use regex::Regex;

static RGB_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})\s*$").expect("valid regex")
});

const PALETTE: &[(&str, &str)] = &[
    ("Aqua", "00FFFF"),
    ("Black", "000000"),
    ("Blue", "0000FF"),
    ("BlueGray", "666699"),
    ("BrightGreen", "00FF00"),
    ("Brown", "993300"),
    ("DarkBlue", "000080"),
    ("DarkGreen", "003300"),
    ("DarkRed", "800000"),
    ("DarkYellow", "808000"),
    ("DarkTeal", "003366"),
    ("Gold", "FFC000"),
    ("Green", "008000"),
    ("Gray25", "C0C0C0"),
    ("Gray40", "969696"),
    ("Gray50", "808080"),
    ("Gray80", "333333"),
    ("Grey", "808080"),
    ("Gray", "808080"),
    ("Indigo", "333399"),
    ("Lavender", "CC99FF"),
    ("LightBlue", "3366FF"),
    ("LightGray", "C0C0C0"),
    ("LightGreen", "CCFFCC"),
    ("LightOrange", "FF9900"),
    ("LightTurquoise", "CCFFFF"),
    ("LightYellow", "FFFF99"),
    ("Lime", "99CC00"),
    ("OliveGreen", "333300"),
    ("Orange", "FF6600"),
    ("PaleBlue", "99CCFF"),
    ("Pink", "FF00FF"),
    ("Plum", "993366"),
    ("Red", "FF0000"),
    ("Rose", "FF99CC"),
    ("SeaGreen", "339966"),
    ("SkyBlue", "00CCFF"),
    ("Tan", "FFCC99"),
    ("Teal", "008080"),
    ("Turquoise", "00FFFF"),
    ("Violet", "800080"),
    ("White", "FFFFFF"),
    ("Yellow", "FFFF00"),
];

/// "255,0,0" -> "FF0000"，允许单引号包裹。
pub fn parse_rgb(rgb: &str) -> Option<String> {
    let cleaned = rgb.replace('\'', "");
    let caps = RGB_RE.captures(&cleaned)?;

    let mut hex = String::with_capacity(6);
    for i in 1..=3 {
        let channel: u8 = caps[i].parse().ok()?;
        hex.push_str(&format!("{channel:02X}"));
    }
    Some(hex)
}

pub fn color_name_to_hex(name: &str) -> Option<&'static str> {
    PALETTE
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, hex)| *hex)
}

/// RGB 列优先；颜色名为空、"RGB" 或 "NoColor" 时视为未设置。
pub fn resolve_color(name: &str, rgb: &str) -> Option<String> {
    if !rgb.trim().is_empty() {
        if let Some(hex) = parse_rgb(rgb) {
            return Some(hex);
        }
    }

    let name = name.trim();
    if name.is_empty() || name == "RGB" || name == "NoColor" {
        return None;
    }
    color_name_to_hex(name).map(str::to_string)
}

/// umya 的 set_argb() 遇到与内置索引色相同的值会写成 indexed="n"，
/// 用小写避免命中该映射，保证写入 rgb="..."。
pub fn to_argb(hex: &str) -> String {
    format!("ff{}", hex.to_ascii_lowercase())
}

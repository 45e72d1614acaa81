//! Cyrillic to Latin transliteration for character displays.
//!
//! HD44780 and 5x7 OLED fonts only carry ASCII, so every string headed for
//! the display passes through [`transliterate`] first.

/// Replacement for any character the display cannot show.
pub const FALLBACK: char = '?';

/// Transliterate `text` to display-safe ASCII.
///
/// ASCII passes through untouched. Russian Cyrillic letters map to their
/// Latin spelling, which can be longer (`Щ` → `Sch`) or empty (`Ъ`, `Ь`).
/// Anything else becomes [`FALLBACK`]. Never fails.
///
/// # Examples
/// ```
/// use karaoke::transliterate;
///
/// assert_eq!(transliterate("Демоны"), "Demony");
/// assert_eq!(transliterate("щука"), "schuka");
/// assert_eq!(transliterate("plain ASCII!"), "plain ASCII!");
/// assert_eq!(transliterate("naïve"), "na?ve");
/// ```
pub fn transliterate(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_ascii() {
            out.push(ch);
        } else if let Some(latin) = cyrillic(ch) {
            out.push_str(latin);
        } else {
            out.push(FALLBACK);
        }
    }
    out
}

fn cyrillic(ch: char) -> Option<&'static str> {
    let latin = match ch {
        'А' => "A",
        'Б' => "B",
        'В' => "V",
        'Г' => "G",
        'Д' => "D",
        'Е' => "E",
        'Ё' => "Yo",
        'Ж' => "Zh",
        'З' => "Z",
        'И' => "I",
        'Й' => "Y",
        'К' => "K",
        'Л' => "L",
        'М' => "M",
        'Н' => "N",
        'О' => "O",
        'П' => "P",
        'Р' => "R",
        'С' => "S",
        'Т' => "T",
        'У' => "U",
        'Ф' => "F",
        'Х' => "Kh",
        'Ц' => "Ts",
        'Ч' => "Ch",
        'Ш' => "Sh",
        'Щ' => "Sch",
        'Ъ' => "",
        'Ы' => "Y",
        'Ь' => "",
        'Э' => "E",
        'Ю' => "Yu",
        'Я' => "Ya",
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' => "e",
        'ё' => "yo",
        'ж' => "zh",
        'з' => "z",
        'и' => "i",
        'й' => "y",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "kh",
        'ц' => "ts",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "sch",
        'ъ' => "",
        'ы' => "y",
        'ь' => "",
        'э' => "e",
        'ю' => "yu",
        'я' => "ya",
        _ => return None,
    };
    Some(latin)
}

// libs/doctor-cell/src/services/slug.rs

/// Transliterate one Cyrillic character to its Latin rendering. Characters
/// outside the table pass through unchanged.
fn translit_char(c: char) -> &'static str {
    match c {
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
        'щ' => "shch",
        'ъ' => "",
        'ы' => "y",
        'ь' => "",
        'э' => "e",
        'ю' => "yu",
        'я' => "ya",
        _ => "",
    }
}

/// Build a URL slug from a display name: lowercase, Cyrillic transliterated,
/// runs of anything non-alphanumeric collapsed to single hyphens.
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.to_lowercase().chars() {
        let piece: String = if c.is_ascii_alphanumeric() {
            c.to_string()
        } else if ('а'..='я').contains(&c) || c == 'ё' {
            translit_char(c).to_string()
        } else {
            if !out.is_empty() {
                pending_hyphen = true;
            }
            continue;
        };

        if piece.is_empty() {
            continue;
        }
        if pending_hyphen {
            out.push('-');
            pending_hyphen = false;
        }
        out.push_str(&piece);
    }

    out
}

/// Pick the first free slug: the base itself, then base-2, base-3, ...
pub fn dedup_slug(base: &str, taken: &[String]) -> String {
    if !taken.iter().any(|t| t == base) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !taken.iter().any(|t| t == &candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// URL slug for a group name: lowercase ASCII, accents folded, every run of
/// other characters collapsed into a single hyphen, no leading or trailing hyphen.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for ch in name.chars().flat_map(char::to_lowercase) {
        let folded = fold(ch);
        if folded.is_empty() {
            pending_hyphen = true;
            continue;
        }
        for c in folded.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_hyphen && !slug.is_empty() {
                    slug.push('-');
                }
                pending_hyphen = false;
                slug.push(c);
            } else {
                pending_hyphen = true;
            }
        }
    }

    slug
}

fn fold(ch: char) -> &'static str {
    match ch {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => "a",
        'æ' => "ae",
        'ç' => "c",
        'è' | 'é' | 'ê' | 'ë' => "e",
        'ì' | 'í' | 'î' | 'ï' => "i",
        'ñ' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => "o",
        'œ' => "oe",
        'ù' | 'ú' | 'û' | 'ü' => "u",
        'ý' | 'ÿ' => "y",
        'ß' => "ss",
        c if c.is_ascii_alphanumeric() => ascii_str(c),
        _ => "",
    }
}

fn ascii_str(c: char) -> &'static str {
    const TABLE: &str = "0123456789abcdefghijklmnopqrstuvwxyz";
    match TABLE.find(c) {
        Some(i) => &TABLE[i..i + 1],
        None => "",
    }
}

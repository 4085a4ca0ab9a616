use regex::Captures;
use unicode_normalization::UnicodeNormalization;

re!(re_era_kanji,
    r"(明治|大正|昭和|平成|令和)\s*(元|\d{1,2})\s*(年|[./-])");
re!(re_era_latin,
    r"\b([MTSHR])\s?(\d{1,2})([./])(\d{1,2})([./])(\d{1,2})\b");
re!(re_bracket_negative,
    r"\(\s*(¥?\s*(?:\d{1,3}(?:,\d{3})+|\d{3,})(?:\.\d{1,2})?)\s*(円)?\s*\)");
re!(re_backslash_yen, r"\\(\s*\d)");

/// Canonical text form used by every matcher in this crate.
///
/// Applies NFKC (full-width digits and punctuation become ASCII), folds every
/// minus-like glyph and the ▲/△ negative markers to `-`, rewrites bracketed
/// amounts as negatives, folds yen glyph variants to `¥`, and converts Japanese
/// era years to Gregorian.
pub fn normalize(text: &str) -> String {
    let nfkc: String = text.nfkc().collect();
    let glyphs = canonicalize_glyphs(&nfkc);
    let signed = re_bracket_negative().replace_all(&glyphs, "-$1$2");
    let yen = re_backslash_yen().replace_all(&signed, "¥$1");
    convert_era_years(&yen)
}

fn canonicalize_glyphs(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{2010}'..='\u{2015}' | '\u{2212}' | '\u{FE63}' | '\u{FF0D}' | '▲' | '△' => '-',
            '\u{FFE5}' => '¥',
            '\u{3000}' => ' ',
            other => other,
        })
        .collect()
}

/// First Gregorian year of each era.
fn era_base(era: &str) -> Option<i32> {
    match era {
        "明治" | "M" => Some(1868),
        "大正" | "T" => Some(1912),
        "昭和" | "S" => Some(1926),
        "平成" | "H" => Some(1989),
        "令和" | "R" => Some(2019),
        _ => None,
    }
}

fn era_year(era: &str, year: &str) -> Option<i32> {
    let n: i32 = if year == "元" { 1 } else { year.parse().ok()? };
    if n == 0 {
        return None;
    }
    Some(era_base(era)? + n - 1)
}

/// Rewrite `令和6年`, `平成元年`, `令和6.4.1` and `R6/4/1` style dates with
/// Gregorian years. Unknown or zero years are left untouched.
pub fn convert_era_years(text: &str) -> String {
    let kanji = re_era_kanji().replace_all(text, |c: &Captures| match era_year(&c[1], &c[2]) {
        Some(year) => format!("{year}{}", &c[3]),
        None => c[0].to_string(),
    });
    re_era_latin()
        .replace_all(&kanji, |c: &Captures| match era_year(&c[1], &c[2]) {
            Some(year) => format!("{year}{}{}{}{}", &c[3], &c[4], &c[5], &c[6]),
            None => c[0].to_string(),
        })
        .into_owned()
}

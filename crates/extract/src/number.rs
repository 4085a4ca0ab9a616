use ryoshu_core::Yen;

re!(re_amount,
    r"(\d{1,3}(?:,\d{3})+|\d+)(?:\.(\d{1,2}))?(?:\s*(?:円|¥|JPY))?");

/// One amount found in normalized text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberMatch {
    pub value: Yen,
    /// Byte range of the match (sign excluded) within the scanned text.
    pub start: usize,
    pub end: usize,
}

/// Scan normalized text for amounts.
///
/// Accepts thousands-grouped integers or plain digit runs, an optional one or
/// two digit decimal remainder (rounded to whole yen) and an optional currency
/// suffix. A `-` directly before the digits (one space allowed) negates the
/// value unless the `-` itself follows a digit, so `2024-04-01` stays positive.
/// Matches starting right after a digit are rejected. Values that overflow are
/// skipped.
pub fn scan_numbers(text: &str) -> Vec<NumberMatch> {
    re_amount()
        .captures_iter(text)
        .filter_map(|c| {
            let whole = c.get(0)?;
            let before = &text[..whole.start()];
            if before.chars().next_back().is_some_and(|ch| ch.is_ascii_digit()) {
                return None;
            }
            let integer = c.get(1)?.as_str().replace(',', "");
            let literal = match c.get(2) {
                Some(frac) => format!("{integer}.{}", frac.as_str()),
                None => integer,
            };
            let value = Yen::parse_loose(&literal).ok()?;
            let value = if is_negated(before) { -value } else { value };
            Some(NumberMatch { value, start: whole.start(), end: whole.end() })
        })
        .collect()
}

fn is_negated(before: &str) -> bool {
    let trimmed = before.strip_suffix(' ').unwrap_or(before);
    match trimmed.strip_suffix('-') {
        Some(rest) => !rest.chars().next_back().is_some_and(|ch| ch.is_ascii_digit()),
        None => false,
    }
}

pub fn has_digit(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
}

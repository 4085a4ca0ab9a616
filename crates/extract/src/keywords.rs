use serde::{Deserialize, Serialize};
use std::fmt;

pub const TOTAL_KEYWORDS: &[&str] = &[
    "合計",
    "総合計",
    "請求金額",
    "お支払金額",
    "お支払い金額",
    "合計金額",
    "税込",
    "請求額",
];
pub const SUBTOTAL_KEYWORDS: &[&str] = &["小計", "税抜", "税別", "小計金額"];
pub const TAX_KEYWORDS: &[&str] = &["税", "消費税", "内税", "外税", "税額", "消費税額"];

pub const COMPANY_KEYWORDS: &[&str] = &[
    "株式会社",
    "有限会社",
    "合同会社",
    "Inc",
    "Co.",
    "Company",
    "Corporation",
];
pub const ISSUE_DATE_LABELS: &[&str] = &["発行日", "発行年月日", "請求日", "Invoice Date"];
pub const DUE_DATE_LABELS: &[&str] = &["支払期日", "支払期限", "お支払期日", "Payment Due"];
pub const LINE_HEADERS: &[&str] = &["品目", "内容", "明細", "数量", "単価", "金額"];

pub const TOTAL_LINE_LABELS: &[&str] = &["合計", "Total", "請求金額"];
pub const SUBTOTAL_LINE_LABELS: &[&str] = &["小計", "Subtotal"];
pub const TAX_LINE_LABELS: &[&str] = &["消費税", "税額", "Tax"];

/// Which financial figure an amount candidate is competing for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountLabel {
    Total,
    Subtotal,
    Tax,
}

impl AmountLabel {
    /// Classification order: total keywords win over subtotal, subtotal over
    /// tax (`税込` and `税抜` both contain `税`).
    pub const ALL: [AmountLabel; 3] = [AmountLabel::Total, AmountLabel::Subtotal, AmountLabel::Tax];

    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            AmountLabel::Total => TOTAL_KEYWORDS,
            AmountLabel::Subtotal => SUBTOTAL_KEYWORDS,
            AmountLabel::Tax => TAX_KEYWORDS,
        }
    }

    pub fn matches(self, text: &str) -> bool {
        self.keywords().iter().any(|k| text.contains(k))
    }

    /// First label (in [`AmountLabel::ALL`] order) with a keyword in `text`.
    pub fn classify(text: &str) -> Option<AmountLabel> {
        AmountLabel::ALL.into_iter().find(|label| label.matches(text))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AmountLabel::Total => "total",
            AmountLabel::Subtotal => "subtotal",
            AmountLabel::Tax => "tax",
        }
    }
}

impl fmt::Display for AmountLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every amount keyword (all labels) found in `text`, deduplicated, in table order.
pub fn matched_amount_keywords(text: &str) -> Vec<&'static str> {
    let mut found: Vec<&'static str> = Vec::new();
    for kw in AmountLabel::ALL.iter().flat_map(|l| l.keywords().iter().copied()) {
        if text.contains(kw) && !found.contains(&kw) {
            found.push(kw);
        }
    }
    found
}

pub fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

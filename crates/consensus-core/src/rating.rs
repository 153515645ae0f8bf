use crate::Rating;

const BUY_KEYWORDS: &[&str] = &["buy", "매수", "strong buy", "적극매수"];
const SELL_KEYWORDS: &[&str] = &["sell", "매도", "strong sell", "적극매도"];

/// Normalize a raw analyst rating label to the canonical 3-way taxonomy.
///
/// Case-insensitive substring match. The buy family is checked before the
/// sell family, so a label containing both (e.g. "downgraded from Strong
/// Buy") normalizes to buy; this precedence is a fixed contract. Anything
/// matching neither family, including the empty string, is hold.
pub fn normalize_rating(raw: &str) -> Rating {
    let lowered = raw.to_lowercase();

    if BUY_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        Rating::Buy
    } else if SELL_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        Rating::Sell
    } else {
        Rating::Hold
    }
}

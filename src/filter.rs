//! Select the emojis to download by keyword.

use crate::api::data::EmojiRecord;

/// Check if the lowercased `name` contains any of `keywords`.
///
/// Only `name` is lowercased, `keywords` are compared as is,
/// so an uppercase keyword never matches.
#[inline]
pub fn matches_any<S: AsRef<str>>(name: &str, keywords: &[S]) -> bool {
    let name = name.to_lowercase();
    keywords.iter().any(|keyword| name.contains(keyword.as_ref()))
}

/// Keep the records whose name matches any of `keywords`, preserving order.
///
/// A record without a name is matched as the empty string.
///
/// # Example
///
/// ```
/// use misskey_emoji_dl::api::data::EmojiRecord;
/// use misskey_emoji_dl::filter::filter_by_keyword;
///
/// let records = vec![
///     EmojiRecord::new(Some("Pity_cry"), None::<String>),
///     EmojiRecord::new(Some("other"), None::<String>),
/// ];
/// let kept = filter_by_keyword(records, &["pity"]);
/// assert_eq!(kept.len(), 1);
/// ```
pub fn filter_by_keyword<S: AsRef<str>>(
    records: impl IntoIterator<Item = EmojiRecord>,
    keywords: &[S],
) -> Vec<EmojiRecord> {
    records
        .into_iter()
        .filter(|record| matches_any(record.name_or_empty(), keywords))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> EmojiRecord {
        EmojiRecord::new(Some(name), Some(format!("https://s/{name}.png")))
    }

    #[test]
    fn test_filter_lowercases_name_only() {
        let records = vec![named("Pity_cry"), named("PITY"), named("other")];
        let kept = filter_by_keyword(records, &["pity"]);
        let names: Vec<_> = kept.iter().map(EmojiRecord::name_or_empty).collect();
        assert_eq!(names, ["Pity_cry", "PITY"]);

        // keywords are not lowercased
        let kept = filter_by_keyword(vec![named("pity")], &["PITY"]);
        assert!(kept.is_empty());
    }

    #[test]
    fn test_filter_any_keyword_keeps_order() {
        let records = vec![named("b_cat"), named("a_dog"), named("c_cat_dog"), named("fish")];
        let kept = filter_by_keyword(records, &["dog", "cat"]);
        let names: Vec<_> = kept.iter().map(EmojiRecord::name_or_empty).collect();
        assert_eq!(names, ["b_cat", "a_dog", "c_cat_dog"]);
    }

    #[test]
    fn test_filter_missing_name() {
        let nameless = EmojiRecord::new(None::<String>, Some("https://s/x.png"));

        let kept = filter_by_keyword(vec![nameless.clone()], &["pity"]);
        assert!(kept.is_empty());

        // only the empty keyword matches an absent name
        let kept = filter_by_keyword(vec![nameless], &[""]);
        assert_eq!(kept.len(), 1);
    }
}

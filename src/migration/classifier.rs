//! Row-quality classification. Pure predicates, no store access: "is this
//! content usable" stays separate from "is this the canonical copy" (the
//! deduplicator's job).

/// Minimum message length for a row to be worth normalizing.
pub const MIN_MESSAGE_LEN: usize = 10;

const IMAGE_EXT_TOKENS: [&str; 4] = [".jpg", ".jpeg", ".png", ".gif"];
const PLACEHOLDER_TOKENS: [&str; 3] = ["test", "lorem", "ipsum"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Valid,
    /// Message missing or below `min_len`; invalid regardless of other flags.
    TooShort,
    /// Placeholder content ("test", lorem ipsum) in name or message.
    TestData,
    /// An image filename leaked into a category/type text field.
    Corrupted,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Valid => "valid",
            Classification::TooShort => "too-short",
            Classification::TestData => "test-data",
            Classification::Corrupted => "corrupted",
        }
    }
}

/// Category/type fields sometimes hold an uploaded image's filename instead of
/// a label. Substring match, case-insensitive.
pub fn is_corrupted_value(value: &str) -> bool {
    let lowered = value.to_lowercase();
    IMAGE_EXT_TOKENS.iter().any(|ext| lowered.contains(ext))
}

pub fn is_placeholder_text(value: &str) -> bool {
    let lowered = value.to_lowercase();
    PLACEHOLDER_TOKENS.iter().any(|tok| lowered.contains(tok))
}

/// Classify one raw row. Length is counted in chars, not bytes — the corpus
/// is Arabic and a byte count would triple-count it.
pub fn classify(
    message: Option<&str>,
    name: Option<&str>,
    category: Option<&str>,
    min_len: usize,
) -> Classification {
    let message = message.map(str::trim).unwrap_or("");
    if message.chars().count() < min_len {
        return Classification::TooShort;
    }
    if category.is_some_and(is_corrupted_value) {
        return Classification::Corrupted;
    }
    if is_placeholder_text(message) || name.is_some_and(is_placeholder_text) {
        return Classification::TestData;
    }
    Classification::Valid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_messages_are_rejected_regardless_of_other_flags() {
        assert_eq!(
            classify(Some("test"), None, Some("photo.jpg"), MIN_MESSAGE_LEN),
            Classification::TooShort
        );
        assert_eq!(classify(None, None, None, MIN_MESSAGE_LEN), Classification::TooShort);
        // 9 Arabic chars: under the threshold even though the utf-8 byte count is not
        assert_eq!(
            classify(Some("شقة للبيع"), None, None, MIN_MESSAGE_LEN),
            Classification::TooShort
        );
    }

    #[test]
    fn image_filename_in_category_flags_corrupted() {
        let msg = Some("شقة للبيع في التجمع الخامس ١٥٠ متر");
        assert_eq!(
            classify(msg, None, Some("IMG_2031.JPG"), MIN_MESSAGE_LEN),
            Classification::Corrupted
        );
        assert_eq!(
            classify(msg, None, Some("upload.png"), MIN_MESSAGE_LEN),
            Classification::Corrupted
        );
    }

    #[test]
    fn placeholder_tokens_flag_test_data() {
        assert_eq!(
            classify(Some("this is a TEST message"), None, None, MIN_MESSAGE_LEN),
            Classification::TestData
        );
        assert_eq!(
            classify(
                Some("lorem ipsum dolor sit amet"),
                Some("agent"),
                None,
                MIN_MESSAGE_LEN
            ),
            Classification::TestData
        );
        assert_eq!(
            classify(
                Some("شقة للبيع في مدينة نصر"),
                Some("Tester Ahmed"),
                None,
                MIN_MESSAGE_LEN
            ),
            Classification::TestData
        );
    }

    #[test]
    fn clean_rows_classify_valid() {
        assert_eq!(
            classify(
                Some("فيلا للبيع في الشيخ زايد ٤٠٠ متر"),
                Some("أحمد"),
                Some("فيلا"),
                MIN_MESSAGE_LEN
            ),
            Classification::Valid
        );
    }
}

use crate::error::AppError;

/// Clean user-supplied text before it is stored.
///
/// Whitelist-based: safe inline tags (<b>, <p>, ...) survive, while <script>,
/// <iframe> and event-handler attributes are stripped. Stored text is
/// sanitized HTML, so plain `&` and `<` come back escaped (`&amp;`, `&lt;`).
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

/// Trims and sanitizes an optional field, then enforces `max` characters on
/// the stored form. Blank input is allowed and stored as "".
pub fn clean_bounded(input: &str, field: &str, max: usize) -> Result<String, AppError> {
    let cleaned = clean_html(input.trim());
    let cleaned = cleaned.trim();
    if cleaned.chars().count() > max {
        return Err(AppError::BadRequest(format!(
            "{field} must be at most {max} characters once sanitized"
        )));
    }
    Ok(cleaned.to_string())
}

/// Like [`clean_bounded`], but nothing may be left empty.
pub fn clean_required(input: &str, field: &str, max: usize) -> Result<String, AppError> {
    let cleaned = clean_bounded(input, field, max)?;
    if cleaned.is_empty() {
        return Err(AppError::BadRequest(format!("{field} is required")));
    }
    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_tags() {
        let cleaned = clean_html("hello <script>alert(1)</script><b>world</b>");
        assert_eq!(cleaned, "hello <b>world</b>");
    }

    #[test]
    fn required_rejects_blank_and_script_only_input() {
        assert!(clean_required("   ", "Title", 10).is_err());
        assert!(clean_required("<script>alert(1)</script>", "Title", 10).is_err());
        assert_eq!(clean_required("  hi  ", "Title", 10).unwrap(), "hi");
    }

    #[test]
    fn length_is_checked_after_escaping() {
        assert_eq!(clean_bounded("Tom & Jerry", "Title", 20).unwrap(), "Tom &amp; Jerry");
        // 4 characters in, 20 out
        assert!(matches!(
            clean_bounded("&&&&", "Title", 10),
            Err(AppError::BadRequest(_))
        ));
        assert_eq!(clean_bounded("   ", "Bio", 10).unwrap(), "");
    }
}

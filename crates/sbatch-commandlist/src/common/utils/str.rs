use std::borrow::Cow;

/// Return the input string with an added "s" at the end if `count` is larger than one and non-zero.
pub fn pluralize(value: &str, count: usize) -> Cow<'_, str> {
    if count == 1 {
        Cow::Borrowed(value)
    } else {
        Cow::Owned(format!("{value}s"))
    }
}

#[cfg(test)]
mod tests {
    use crate::common::utils::str::pluralize;

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize("group", 0), "groups");
        assert_eq!(pluralize("group", 1), "group");
        assert_eq!(pluralize("group", 2), "groups");
    }
}

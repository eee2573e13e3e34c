/// Parses the usual human spellings of a boolean flag
pub fn parse_bool(value: &str) -> Result<bool, crate::Error> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "on" | "1" => Ok(true),
        "false" | "f" | "no" | "n" | "off" | "0" => Ok(false),
        _ => Err("value must be one of true/false/yes/no/on/off/1/0".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        for truthy in ["true", "T", "yes", "Y", "on", "1"] {
            assert_eq!(parse_bool(truthy).unwrap(), true, "{}", truthy);
        }
        for falsy in ["false", "F", "no", "N", "off", "0"] {
            assert_eq!(parse_bool(falsy).unwrap(), false, "{}", falsy);
        }
        assert!(parse_bool("maybe").is_err());
        assert!(parse_bool("").is_err());
    }
}
